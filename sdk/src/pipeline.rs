//! Public encrypt and decrypt operations.
//!
//! Each operation moves through `Digesting`, `Staging`, `Ciphering`,
//! `Verifying` (decrypt only) and `Committing`. Every intermediate result
//! lives in a [`StagingFile`] next to the output, so a failure at any point
//! leaves the output path as it was.

use {
    crate::{
        appended::AppendedReader,
        cipher::{ChunkCipher, CipherError, Direction},
        container::{CHECKSUM_LEN, CHUNK_LEN, MIN_CONTAINER_LEN},
        digest::{Checksum, ChunkDigest, Md5Algorithm},
        error::{ErrorKind, FatalError},
        progress::ProgressSink,
        staging::StagingFile,
    },
    anyhow::{Context, Result, anyhow, ensure},
    fs_err::File,
    std::{
        io::{self, Read, Seek, SeekFrom},
        path::Path,
    },
    tracing::{debug, instrument},
};

type FileDigest<R = File> = ChunkDigest<Md5Algorithm, R>;

trait ResultExt<T> {
    fn fatal(self, kind: ErrorKind) -> Result<T, FatalError>;
}

impl<T> ResultExt<T> for Result<T> {
    fn fatal(self, kind: ErrorKind) -> Result<T, FatalError> {
        self.map_err(|err| FatalError::with_source(kind, err))
    }
}

/// Encrypts `input` into a new container at `output`.
///
/// `output` is replaced atomically on success and left untouched on failure.
/// `input` is never modified.
#[inline]
#[instrument(skip_all, fields(input = ?input, output = ?output))]
pub fn encrypt_file<P: ProgressSink + ?Sized>(
    input: &Path,
    output: &Path,
    password: &[u8],
    progress: &mut P,
) -> Result<(), FatalError> {
    encrypt(input, output, password, progress).inspect_err(log_failure)
}

/// Decrypts the container at `input` into `output` and verifies its checksum.
///
/// A wrong password and a modified container both result in
/// [`ErrorKind::Integrity`]. `output` is replaced atomically on success and
/// left untouched on failure.
#[inline]
#[instrument(skip_all, fields(input = ?input, output = ?output))]
pub fn decrypt_file<P: ProgressSink + ?Sized>(
    input: &Path,
    output: &Path,
    password: &[u8],
    progress: &mut P,
) -> Result<(), FatalError> {
    decrypt(input, output, password, progress).inspect_err(log_failure)
}

fn log_failure(err: &FatalError) {
    debug!(state = "Failed", kind = %err.kind(), details = ?err.details(), "operation failed");
}

fn encrypt<P: ProgressSink + ?Sized>(
    input: &Path,
    output: &Path,
    password: &[u8],
    progress: &mut P,
) -> Result<(), FatalError> {
    let staging_dir = staging_dir(output).fatal(ErrorKind::Output)?;

    debug!(state = "Digesting");
    let mut digest = FileDigest::open(input).fatal(ErrorKind::Input)?;
    let total = digest.total_chunks();
    run_phase(total, progress, || digest.digest_chunk()).fatal(ErrorKind::Input)?;
    progress.report(0, total);
    let checksum = digest.finalize();

    debug!(state = "Staging");
    let mut plaintext = StagingFile::create_in(staging_dir).fatal(ErrorKind::Staging)?;
    append_checksum(input, checksum, &mut plaintext).fatal(ErrorKind::Io)?;
    let plaintext_len = plaintext.size().fatal(ErrorKind::Staging)?;
    plaintext.rewind().fatal(ErrorKind::Staging)?;
    let mut sealed = StagingFile::create_in(staging_dir).fatal(ErrorKind::Staging)?;

    debug!(state = "Ciphering");
    let mut cipher = ChunkCipher::new(
        Direction::Encrypt,
        password,
        plaintext.file_mut(),
        plaintext_len,
        sealed.file_mut(),
    );
    let total = cipher.total_chunks();
    run_phase(total, progress, || cipher.encrypt_chunk()).fatal(ErrorKind::Io)?;
    cipher.close().fatal(ErrorKind::Io)?;
    drop(cipher);

    debug!(state = "Committing");
    sealed.commit(output).fatal(ErrorKind::Commit)?;
    drop(plaintext);
    debug!(state = "Done");
    Ok(())
}

fn decrypt<P: ProgressSink + ?Sized>(
    input: &Path,
    output: &Path,
    password: &[u8],
    progress: &mut P,
) -> Result<(), FatalError> {
    let staging_dir = staging_dir(output).fatal(ErrorKind::Output)?;
    let input_file = File::open(input)
        .context("failed to open container")
        .fatal(ErrorKind::Input)?;
    let input_len = input_file
        .metadata()
        .context("failed to get container size")
        .fatal(ErrorKind::Input)?
        .len();
    #[expect(clippy::as_conversions, reason = "usize always fits into u64")]
    let min_len = MIN_CONTAINER_LEN as u64;
    if input_len < min_len {
        return Err(FatalError::with_source(
            ErrorKind::Malformed,
            anyhow!("container is {input_len} bytes long, expected at least {min_len}"),
        ));
    }

    debug!(state = "Staging");
    let mut plaintext = StagingFile::create_in(staging_dir).fatal(ErrorKind::Staging)?;

    debug!(state = "Ciphering");
    let mut cipher = ChunkCipher::new(
        Direction::Decrypt,
        password,
        input_file,
        input_len,
        plaintext.file_mut(),
    );
    let total = cipher.total_chunks();
    run_phase(total, progress, || cipher.decrypt_chunk()).map_err(cipher_error)?;
    cipher.close().fatal(ErrorKind::Io)?;
    drop(cipher);
    progress.report(0, total);

    debug!(state = "Verifying");
    let expected = split_checksum(&mut plaintext)?;
    let plaintext_len = plaintext.size().fatal(ErrorKind::Staging)?;
    plaintext.rewind().fatal(ErrorKind::Staging)?;
    let mut digest =
        FileDigest::new(plaintext.file_mut(), plaintext_len, CHUNK_LEN).fatal(ErrorKind::Io)?;
    let total = digest.total_chunks();
    run_phase(total, progress, || digest.digest_chunk()).fatal(ErrorKind::Io)?;
    progress.report(0, total);
    let actual = digest.finalize();
    if !expected.matches(&actual) {
        return Err(FatalError::new(ErrorKind::Integrity));
    }

    debug!(state = "Committing");
    plaintext.commit(output).fatal(ErrorKind::Commit)?;
    progress.report(1, 1);
    debug!(state = "Done");
    Ok(())
}

/// Directory that receives the staging files for `output`.
fn staging_dir(output: &Path) -> Result<&Path> {
    let dir = match output.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    ensure!(dir.is_dir(), "output directory {dir:?} does not exist");
    Ok(dir)
}

/// Calls `step` until it returns `false`, reporting `(n, total)` after each
/// processed chunk.
fn run_phase<P: ProgressSink + ?Sized>(
    total: u64,
    progress: &mut P,
    mut step: impl FnMut() -> Result<bool>,
) -> Result<()> {
    let mut current = 0;
    while step()? {
        current += 1;
        progress.report(current.min(total), total);
    }
    Ok(())
}

fn append_checksum(input: &Path, checksum: Checksum, staging: &mut StagingFile) -> Result<()> {
    let input = File::open(input)?;
    let mut reader = AppendedReader::new(input, checksum.into_bytes());
    io::copy(&mut reader, staging.file_mut())
        .with_context(|| format!("failed to copy input to {:?}", staging.path()))?;
    Ok(())
}

/// Removes the trailing checksum from the decrypted staging file and returns it.
fn split_checksum(plaintext: &mut StagingFile) -> Result<Checksum, FatalError> {
    let len = plaintext.size().fatal(ErrorKind::Staging)?;
    #[expect(clippy::as_conversions, reason = "usize always fits into u64")]
    let checksum_len = CHECKSUM_LEN as u64;
    let Some(data_len) = len.checked_sub(checksum_len) else {
        return Err(FatalError::with_source(
            ErrorKind::Malformed,
            anyhow!("decrypted data is shorter than the checksum"),
        ));
    };
    let mut checksum = vec![0; CHECKSUM_LEN];
    let file = plaintext.file_mut();
    file.seek(SeekFrom::Start(data_len))
        .and_then(|_| file.read_exact(&mut checksum))
        .context("failed to read checksum")
        .fatal(ErrorKind::Staging)?;
    plaintext.truncate(data_len).fatal(ErrorKind::Staging)?;
    Ok(Checksum::from_bytes(checksum))
}

fn cipher_error(err: anyhow::Error) -> FatalError {
    let kind = match err.downcast_ref::<CipherError>() {
        Some(CipherError::InvalidPadding) => ErrorKind::Integrity,
        Some(CipherError::MissingIv | CipherError::TruncatedBlock | CipherError::EmptyCiphertext) => {
            ErrorKind::Malformed
        }
        None => ErrorKind::Io,
    };
    FatalError::with_source(kind, err)
}

#[cfg(test)]
#[expect(clippy::unwrap_used, reason = "test")]
mod tests {
    use super::*;

    #[test]
    fn staging_dir_of_bare_file_name() {
        assert_eq!(staging_dir(Path::new("out.bin")).unwrap(), Path::new("."));
    }

    #[test]
    fn staging_dir_must_exist() {
        let dir = tempfile::tempdir().unwrap();
        assert_eq!(
            staging_dir(&dir.path().join("out")).unwrap(),
            dir.path()
        );
        assert!(staging_dir(&dir.path().join("missing/out")).is_err());
    }

    #[test]
    fn phase_reports_each_step() {
        let mut reports = Vec::new();
        let mut remaining = 3;
        run_phase(3, &mut |current: u64, total: u64| reports.push((current, total)), || {
            remaining -= 1;
            Ok(remaining >= 0)
        })
        .unwrap();
        assert_eq!(reports, [(1, 3), (2, 3), (3, 3)]);
    }

    #[test]
    fn cipher_errors_are_classified() {
        let kind = |err: CipherError| cipher_error(err.into()).kind();
        assert_eq!(kind(CipherError::InvalidPadding), ErrorKind::Integrity);
        assert_eq!(kind(CipherError::MissingIv), ErrorKind::Malformed);
        assert_eq!(kind(CipherError::TruncatedBlock), ErrorKind::Malformed);
        assert_eq!(
            cipher_error(anyhow!("disk full")).kind(),
            ErrorKind::Io
        );
    }
}
