//! Path safety and the on-disk repository directory.
//!
//! Everything a user can type that ends up as a key inside a repository or
//! as a file name next to one passes through this crate first.

pub mod error;
mod name;
mod path;
mod root;

pub use crate::name::{REPOSITORY_EXTENSION, display_name, sanitize_name};
pub use crate::path::{
    DIRECTORY_MARKER, directory_marker, is_directory_marker, join, sanitize_segment, validate as validate_path,
    validate_prefix,
};
pub use crate::root::{PendingFile, RepositoryInfo, RepositoryRoot};
