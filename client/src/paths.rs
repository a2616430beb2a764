//! Output path derivation and checks done before any work starts.

use {
    crate::cli::Action,
    anyhow::{Context, Result, ensure},
    std::{
        ffi::{OsStr, OsString},
        path::{Path, PathBuf},
    },
};

/// Derives the output path from the input path.
///
/// Encrypting appends `.extension` to the file name. Decrypting removes it
/// (ignoring ASCII case) and keeps the file name unchanged if it is absent.
#[inline]
pub fn output_path(action: Action, input: &Path, extension: &str) -> Result<PathBuf> {
    let file_name = input
        .file_name()
        .with_context(|| format!("{input:?} is not a file path"))?;
    let name = match action {
        Action::Encrypt => {
            let mut name = OsString::from(file_name);
            name.push(".");
            name.push(extension);
            name
        }
        Action::Decrypt => strip_extension(file_name, extension)
            .unwrap_or(file_name)
            .to_os_string(),
    };
    Ok(input.with_file_name(name))
}

fn strip_extension<'a>(file_name: &'a OsStr, extension: &str) -> Option<&'a OsStr> {
    let file_name = file_name.to_str()?;
    let split = file_name.len().checked_sub(extension.len() + 1)?;
    let stem = file_name.get(..split).filter(|stem| !stem.is_empty())?;
    let suffix = file_name.get(split..)?.strip_prefix('.')?;
    suffix
        .eq_ignore_ascii_case(extension)
        .then_some(OsStr::new(stem))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputState {
    Vacant,
    /// A file is already there. The user decides whether to overwrite it.
    Exists,
}

/// Checks that `input` can be read and `output` can be written.
#[inline]
pub fn preflight(input: &Path, output: &Path) -> Result<OutputState> {
    let metadata = fs_err::metadata(input).context("input file is not accessible")?;
    ensure!(metadata.is_file(), "input {input:?} is not a file");
    fs_err::File::open(input).context("input file is not readable")?;

    let dir = match output.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    let dir_metadata = fs_err::metadata(dir).context("output directory is not accessible")?;
    ensure!(dir_metadata.is_dir(), "{dir:?} is not a directory");
    ensure!(
        !dir_metadata.permissions().readonly(),
        "output directory {dir:?} is read-only"
    );

    if output.try_exists()? {
        ensure!(!output.is_dir(), "output {output:?} is a directory");
        Ok(OutputState::Exists)
    } else {
        Ok(OutputState::Vacant)
    }
}

#[cfg(test)]
#[expect(clippy::unwrap_used, reason = "test")]
mod tests {
    use super::*;

    fn output(action: Action, input: &str) -> PathBuf {
        output_path(action, Path::new(input), "sealed").unwrap()
    }

    #[test]
    fn encrypt_appends_extension() {
        assert_eq!(
            output(Action::Encrypt, "/docs/notes.txt"),
            Path::new("/docs/notes.txt.sealed")
        );
        assert_eq!(output(Action::Encrypt, "notes"), Path::new("notes.sealed"));
    }

    #[test]
    fn decrypt_strips_extension() {
        assert_eq!(
            output(Action::Decrypt, "/docs/notes.txt.sealed"),
            Path::new("/docs/notes.txt")
        );
        assert_eq!(
            output(Action::Decrypt, "/docs/notes.txt.SEALED"),
            Path::new("/docs/notes.txt")
        );
    }

    #[test]
    fn decrypt_keeps_other_names() {
        assert_eq!(output(Action::Decrypt, "notes.txt"), Path::new("notes.txt"));
        assert_eq!(output(Action::Decrypt, ".sealed"), Path::new(".sealed"));
        assert_eq!(output(Action::Decrypt, "notessealed"), Path::new("notessealed"));
    }

    #[test]
    fn rejects_paths_without_file_name() {
        assert!(output_path(Action::Encrypt, Path::new("/"), "sealed").is_err());
        assert!(output_path(Action::Decrypt, Path::new(".."), "sealed").is_err());
    }

    #[test]
    fn preflight_checks() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("input");
        let output = dir.path().join("output");

        assert!(preflight(&input, &output).is_err());
        fs_err::write(&input, b"data").unwrap();
        assert_eq!(preflight(&input, &output).unwrap(), OutputState::Vacant);
        fs_err::write(&output, b"old").unwrap();
        assert_eq!(preflight(&input, &output).unwrap(), OutputState::Exists);

        assert!(preflight(dir.path(), &output).is_err());
        assert!(preflight(&input, dir.path()).is_err());
        assert!(preflight(&input, &dir.path().join("missing/output")).is_err());
    }
}
