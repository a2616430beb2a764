use {
    anyhow::Error,
    derive_more::Display,
    std::{error::Error as StdError, fmt::Debug},
};

/// Classification of a [`FatalError`].
#[derive(Debug, Display, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// The input file is missing or unreadable.
    #[display("input")]
    Input,
    /// The output location cannot be written.
    #[display("output")]
    Output,
    /// A staging file could not be created or written.
    #[display("staging")]
    Staging,
    /// The input is not a container or is truncated.
    #[display("malformed")]
    Malformed,
    /// Checksum mismatch. Caused by a wrong password or a modified container.
    #[display("integrity")]
    Integrity,
    /// The result could not be moved to the output path.
    #[display("commit")]
    Commit,
    #[display("io")]
    Io,
}

impl ErrorKind {
    #[must_use]
    #[inline]
    pub fn message(self) -> &'static str {
        match self {
            Self::Input => "cannot read the input file",
            Self::Output => "cannot write the output file",
            Self::Staging => "cannot create a temporary file",
            Self::Malformed => "the file is not encrypted or is corrupted",
            Self::Integrity => "the encrypted file is corrupted or the given key is not valid",
            Self::Commit => "cannot move the result to the output path",
            Self::Io => "I/O error while processing the file",
        }
    }
}

/// Error that aborted an encrypt or decrypt operation.
///
/// `message` is meant for the user; `details` holds the technical cause chain.
#[derive(Display)]
#[display("{message}")]
pub struct FatalError {
    kind: ErrorKind,
    message: String,
    details: Option<String>,
    source: Option<Error>,
}

impl FatalError {
    #[must_use]
    #[inline]
    pub fn new(kind: ErrorKind) -> Self {
        Self {
            kind,
            message: kind.message().into(),
            details: None,
            source: None,
        }
    }

    #[must_use]
    #[inline]
    pub fn with_source(kind: ErrorKind, source: Error) -> Self {
        Self {
            details: Some(format!("{source:#}")),
            source: Some(source),
            ..Self::new(kind)
        }
    }

    #[must_use]
    #[inline]
    pub fn kind(&self) -> ErrorKind {
        self.kind
    }

    #[must_use]
    #[inline]
    pub fn message(&self) -> &str {
        &self.message
    }

    #[must_use]
    #[inline]
    pub fn details(&self) -> Option<&str> {
        self.details.as_deref()
    }
}

impl Debug for FatalError {
    #[inline]
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FatalError")
            .field("kind", &self.kind)
            .field("message", &self.message)
            .field("details", &self.details)
            .finish_non_exhaustive()
    }
}

impl StdError for FatalError {
    #[inline]
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        self.source
            .as_deref()
            .map(|err| err as &(dyn StdError + 'static))
    }
}
