//! Snapshot datastore for vellum repositories.
//!
//! Each repository is one SQLite database holding four relations:
//! - **blobs**: content-addressed file contents, keyed by SHA-256, written
//!   once and never deleted.
//! - **commits**: the append-only commit log; the highest id is head.
//! - **files**: per commit, the *complete* manifest of `path -> hash`. A
//!   commit never needs an earlier one to be read.
//! - **staging**: paths waiting for the next commit of the local client.
//!
//! Every write produces exactly one commit, built inside one transaction:
//! the unchanged rows of the previous head are carried forward and the
//! changed rows inserted next to them.

pub mod content;
mod db;
pub mod error;
mod manifest;
mod models;
mod registry;
mod repo;
mod staging;
pub mod tree;

pub use crate::content::{ContentStore, Stored, hash, is_valid_hash};
pub use crate::db::{Database, Options};
pub use crate::manifest::Change;
pub use crate::models::{
    Commit, CommitSummary, DirectoryEntry, Entry, FileContent, FileEntry, Listing, Revision, Signature, StagedEntry,
    Stats,
};
pub use crate::registry::Registry;
pub use crate::repo::Repository;
pub use crate::staging::StagingArea;
pub use vellum_storage::RepositoryInfo;
