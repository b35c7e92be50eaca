//! Command-line Error Types

use derive_more::{Display, Error};
use std::path::PathBuf;

/// A command error with automatic location tracking.
pub type Error = exn::Exn<ErrorKind>;
/// Result type alias for commands.
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Display, Error)]
pub enum ErrorKind {
    #[display("could not load configuration")]
    Config,
    #[display("repository operation failed")]
    Store,
    #[display("could not read {}", _0.display())]
    Read(#[error(not(source))] PathBuf),
    #[display("could not write {}", _0.display())]
    Write(#[error(not(source))] PathBuf),
    #[display("could not resolve the current directory")]
    WorkingDirectory,
    #[display("{} is outside the current directory", _0.display())]
    OutsideWorkingDirectory(#[error(not(source))] PathBuf),
    #[display("could not read standard input")]
    Stdin,
    #[display("could not write standard output")]
    Stdout,
}

