//! Groups — sectors and curated lists sharing one id space.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::str::FromStr;

/// Whether a group is a sector or a named list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GroupKind {
    Sector,
    List,
}

impl GroupKind {
    /// Storage label, matching the `groups.type` column.
    pub fn as_str(&self) -> &'static str {
        match self {
            GroupKind::Sector => "sector",
            GroupKind::List => "list",
        }
    }
}

impl fmt::Display for GroupKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for GroupKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "sector" => Ok(GroupKind::Sector),
            "list" => Ok(GroupKind::List),
            other => Err(format!("unknown group kind '{other}'")),
        }
    }
}

/// Store-assigned integer id of a group.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct GroupId(pub i64);

impl fmt::Display for GroupId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A group known to the store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Group {
    pub id: GroupId,
    pub kind: GroupKind,
    pub name: String,
}

/// In-memory mapping between `(kind, name)` and `GroupId` for one run.
///
/// Built from the store's `ensure_group` results before aggregation starts,
/// so the hot loop only ever deals in integer ids.
#[derive(Debug, Clone, Default)]
pub struct GroupRegistry {
    by_key: HashMap<(GroupKind, String), GroupId>,
    groups: BTreeMap<GroupId, Group>,
}

impl GroupRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, group: Group) {
        self.by_key
            .insert((group.kind, group.name.clone()), group.id);
        self.groups.insert(group.id, group);
    }

    pub fn id_of(&self, kind: GroupKind, name: &str) -> Option<GroupId> {
        self.by_key.get(&(kind, name.to_string())).copied()
    }

    pub fn contains(&self, id: GroupId) -> bool {
        self.groups.contains_key(&id)
    }

    pub fn len(&self) -> usize {
        self.groups.len()
    }

    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }

    /// Groups in id order.
    pub fn iter(&self) -> impl Iterator<Item = &Group> {
        self.groups.values()
    }
}
