//! Temporary files that hold intermediate results.

use {
    anyhow::{Context, Result},
    fs_err::{remove_file, rename},
    std::{
        fs::File,
        io::{Seek, SeekFrom, Write},
        path::Path,
    },
    tempfile::{Builder, NamedTempFile},
    tracing::warn,
};

/// File name prefix of all staging files.
pub const STAGING_PREFIX: &str = ".sealfile-";

/// Exclusively owned temporary file. Removed on drop unless committed.
#[derive(Debug)]
pub struct StagingFile {
    inner: NamedTempFile,
}

impl StagingFile {
    /// Creates an empty staging file in `dir`.
    ///
    /// Use the directory of the final output so that [`commit`](Self::commit)
    /// is a rename within one file system.
    #[inline]
    pub fn create_in(dir: &Path) -> Result<Self> {
        let inner = Builder::new()
            .prefix(STAGING_PREFIX)
            .suffix(".tmp")
            .tempfile_in(dir)
            .with_context(|| format!("failed to create staging file in {dir:?}"))?;
        Ok(Self { inner })
    }

    #[must_use]
    #[inline]
    pub fn path(&self) -> &Path {
        self.inner.path()
    }

    #[inline]
    pub fn file_mut(&mut self) -> &mut File {
        self.inner.as_file_mut()
    }

    #[inline]
    pub fn size(&self) -> Result<u64> {
        Ok(self
            .inner
            .as_file()
            .metadata()
            .with_context(|| format!("failed to get metadata of {:?}", self.path()))?
            .len())
    }

    /// Moves the cursor back to the start, so that written data can be read.
    #[inline]
    pub fn rewind(&mut self) -> Result<()> {
        self.inner
            .seek(SeekFrom::Start(0))
            .with_context(|| format!("failed to seek in {:?}", self.path()))?;
        Ok(())
    }

    #[inline]
    pub fn truncate(&mut self, len: u64) -> Result<()> {
        self.inner
            .as_file()
            .set_len(len)
            .with_context(|| format!("failed to truncate {:?}", self.path()))
    }

    /// Flushes the data to disk and atomically moves the file to `target`,
    /// replacing any existing file there.
    ///
    /// The staging file is removed if the move fails.
    #[inline]
    pub fn commit(mut self, target: &Path) -> Result<()> {
        self.inner.flush()?;
        self.inner
            .as_file()
            .sync_all()
            .with_context(|| format!("failed to sync {:?}", self.path()))?;
        let (_, staged_path) = self.inner.keep()?;
        if let Err(err) = rename(&staged_path, target) {
            if let Err(err) = remove_file(&staged_path) {
                warn!(?err, "failed to remove staging file");
            }
            return Err(err.into());
        }
        Ok(())
    }
}

#[cfg(test)]
#[expect(clippy::unwrap_used, reason = "test")]
mod tests {
    use {super::*, std::io::Read};

    fn staging_files(dir: &Path) -> Vec<String> {
        fs_err::read_dir(dir)
            .unwrap()
            .map(|entry| entry.unwrap().file_name().to_string_lossy().into_owned())
            .filter(|name| name.starts_with(STAGING_PREFIX))
            .collect()
    }

    #[test]
    fn removed_on_drop() {
        let dir = tempfile::tempdir().unwrap();
        let mut file = StagingFile::create_in(dir.path()).unwrap();
        file.file_mut().write_all(b"data").unwrap();
        assert_eq!(staging_files(dir.path()).len(), 1);
        drop(file);
        assert!(staging_files(dir.path()).is_empty());
    }

    #[test]
    fn commit_replaces_target() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("out");
        fs_err::write(&target, b"old").unwrap();

        let mut file = StagingFile::create_in(dir.path()).unwrap();
        file.file_mut().write_all(b"new contents").unwrap();
        file.commit(&target).unwrap();

        assert_eq!(fs_err::read(&target).unwrap(), b"new contents");
        assert!(staging_files(dir.path()).is_empty());
    }

    #[test]
    fn failed_commit_removes_staging_file() {
        let dir = tempfile::tempdir().unwrap();
        let file = StagingFile::create_in(dir.path()).unwrap();
        let err = file.commit(&dir.path().join("missing/out")).unwrap_err();
        assert!(format!("{err:#}").contains("missing"));
        assert!(staging_files(dir.path()).is_empty());
    }

    #[test]
    fn truncate_and_read_back() {
        let dir = tempfile::tempdir().unwrap();
        let mut file = StagingFile::create_in(dir.path()).unwrap();
        file.file_mut().write_all(b"0123456789").unwrap();
        assert_eq!(file.size().unwrap(), 10);
        file.truncate(4).unwrap();
        assert_eq!(file.size().unwrap(), 4);
        file.rewind().unwrap();
        let mut data = String::new();
        file.file_mut().read_to_string(&mut data).unwrap();
        assert_eq!(data, "0123");
    }

    #[test]
    fn missing_dir() {
        let dir = tempfile::tempdir().unwrap();
        assert!(StagingFile::create_in(&dir.path().join("missing")).is_err());
    }
}
