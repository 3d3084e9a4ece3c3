use std::fmt;

use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct DeskId(pub String);

impl DeskId {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for DeskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

pub const DEFAULT_DESK_COUNT: u16 = 30;

/// The fixed, ordered collection of bookable desks.
///
/// Built once at startup and shared read-only. The enumeration order is the
/// presentation order used by every desk picker.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DeskSet {
    desks: Vec<DeskId>,
}

impl DeskSet {
    /// `Desk 1` through `Desk {count}`.
    pub fn numbered(count: u16) -> Self {
        Self { desks: (1..=count).map(|index| DeskId(format!("Desk {index}"))).collect() }
    }

    pub fn contains(&self, desk_id: &DeskId) -> bool {
        self.desks.iter().any(|desk| desk == desk_id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &DeskId> {
        self.desks.iter()
    }

    pub fn len(&self) -> usize {
        self.desks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.desks.is_empty()
    }
}

impl Default for DeskSet {
    fn default() -> Self {
        Self::numbered(DEFAULT_DESK_COUNT)
    }
}
