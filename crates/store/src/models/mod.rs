mod commit;
mod entry;
mod listing;

pub use self::commit::{Commit, CommitSummary, Revision, Signature, Stats};
pub(crate) use self::commit::{CommitRow, RevisionRow, SummaryRow};
pub use self::entry::{Entry, FileContent, FileEntry, StagedEntry};
pub(crate) use self::entry::{EntryRow, StagedRow};
pub use self::listing::{DirectoryEntry, Listing};

use crate::error::{ErrorKind, Result};
use exn::ResultExt;
use time::UtcDateTime;

/// Timestamps are persisted as whole Unix seconds.
pub(crate) fn timestamp(seconds: i64) -> Result<UtcDateTime> {
    UtcDateTime::from_unix_timestamp(seconds).or_raise(|| ErrorKind::InvalidData("timestamp"))
}

pub(crate) fn unsigned(value: i64, field: &'static str) -> Result<u64> {
    u64::try_from(value).or_raise(|| ErrorKind::InvalidData(field))
}
