//! Group grants held by a session

use crate::catalog::GroupName;
use std::collections::BTreeSet;

/// The groups a session has unlocked.
///
/// Grants only accumulate; there is no way to remove a single grant. A session
/// loses its grants as a whole when it is destroyed or expires.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GrantSet {
    groups: BTreeSet<GroupName>,
}

impl GrantSet {
    pub fn new() -> Self {
        Self {
            groups: BTreeSet::new(),
        }
    }

    /// Add a group. Returns false if it was already granted.
    pub fn add(&mut self, group: GroupName) -> bool {
        self.groups.insert(group)
    }

    /// Check if the group has been granted
    pub fn allows(&self, group: impl AsRef<str>) -> bool {
        self.groups.contains(group.as_ref())
    }

    pub fn len(&self) -> usize {
        self.groups.len()
    }

    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }
}

impl FromIterator<GroupName> for GrantSet {
    fn from_iter<T: IntoIterator<Item = GroupName>>(iter: T) -> Self {
        let mut set = GrantSet::new();
        for group in iter {
            set.add(group);
        }
        set
    }
}
