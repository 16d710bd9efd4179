use serde::{Deserialize, Serialize};
use tracing::trace;

use crate::group::Group;

/// Write restrictions of a group.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct WritePolicy {
    /// Reject every mutation.
    pub read_only: bool,
    /// Reject `set` on keys that have no default, type, child or value.
    pub no_new_key: bool,
}

/// Temporarily lifted write policy, returned by [`Group::write_enabled`].
///
/// The policy in effect before the guard was created is restored when the
/// guard is dropped, whatever happened in between.
#[must_use = "the policy is restored as soon as the guard is dropped"]
pub struct WriteGuard {
    group: Group,
    saved: WritePolicy,
}

impl WriteGuard {
    pub(crate) fn new(group: &Group, keep_no_new_key: bool) -> Self {
        let saved = group.policy();
        group.set_read_only(false);
        trace!(group = %group.name(), ?saved, keep_no_new_key, "write enabled");
        Self {
            group: group.clone(),
            saved,
        }
    }

    /// Policy that will be restored on drop.
    pub fn saved(&self) -> WritePolicy {
        self.saved
    }
}

impl Drop for WriteGuard {
    fn drop(&mut self) {
        self.group.set_policy(self.saved);
        trace!(group = %self.group.name(), policy = ?self.saved, "write policy restored");
    }
}
