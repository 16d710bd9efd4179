use std::path::Path;

use skio_group::Group;

use crate::error::FileResult;

/// A file format that can fill a [`Group`] from disk and write one back.
///
/// Implementations must satisfy these invariants:
/// - `load` checks the format before modifying the group and returns
///   [`FileError::FormatMismatch`](crate::FileError::FormatMismatch) when the
///   input is not in its format, so the next driver can be tried.
/// - Other failures (I/O, malformed content of the right format) are
///   returned as-is and stop driver selection.
/// - Keys the group refuses (`no_new_key`, nested group slots) are skipped,
///   not reported.
pub trait FileDriver {
    /// Short identifier, used to pick a driver for saving.
    fn name(&self) -> &str;

    fn load(&self, path: &Path, group: &Group) -> FileResult<()>;

    fn save(&self, path: &Path, group: &Group) -> FileResult<()>;
}
