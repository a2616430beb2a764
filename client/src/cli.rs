use {
    clap::{Args, Parser, Subcommand},
    derive_more::Display,
    std::path::PathBuf,
};

#[derive(Debug, Parser)]
#[clap(version, about)]
pub struct Cli {
    /// Path to the config file. Defaults to `sealfile.json5` in the user config directory.
    #[clap(long)]
    pub config: Option<PathBuf>,
    #[clap(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand, PartialEq, Eq)]
pub enum Command {
    /// Encrypt a file with a password.
    Encrypt(FileArgs),
    /// Decrypt a file produced by `encrypt`.
    Decrypt(FileArgs),
}

#[derive(Debug, Args, PartialEq, Eq)]
pub struct FileArgs {
    pub input: PathBuf,
    /// Output file. Derived from the input file name if not specified.
    #[arg(short, long)]
    pub output: Option<PathBuf>,
    /// Overwrite the output file without asking.
    #[arg(short, long)]
    pub force: bool,
}

#[derive(Debug, Display, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    #[display("Encrypting")]
    Encrypt,
    #[display("Decrypting")]
    Decrypt,
}

impl Command {
    #[must_use]
    #[inline]
    pub fn action(&self) -> Action {
        match self {
            Self::Encrypt(_) => Action::Encrypt,
            Self::Decrypt(_) => Action::Decrypt,
        }
    }

    #[must_use]
    #[inline]
    pub fn args(&self) -> &FileArgs {
        match self {
            Self::Encrypt(args) | Self::Decrypt(args) => args,
        }
    }
}
