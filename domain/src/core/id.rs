//! Object identifiers shared by scripts, host objects and accounts.

use serde::{Deserialize, Serialize};
use std::str::FromStr;
use uuid::Uuid;

use super::error::IdParseError;

/// UUID-backed identifier for anything the region addresses by key:
/// script items, host objects, owners, accounts and directory scopes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ObjectId(Uuid);

impl ObjectId {
    /// The all-zero key, used by scripts to mean "no object".
    pub const NIL: ObjectId = ObjectId(Uuid::nil());

    pub fn new_random() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }

    pub fn is_nil(&self) -> bool {
        self.0.is_nil()
    }

    /// Parse a caller-supplied key without ever failing loudly.
    ///
    /// Surrounding whitespace is ignored. Anything that is not a UUID
    /// yields `None`.
    pub fn parse_lenient(raw: &str) -> Option<Self> {
        raw.trim().parse().ok()
    }
}

impl FromStr for ObjectId {
    type Err = IdParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s)
            .map(Self)
            .map_err(|_| IdParseError(s.to_string()))
    }
}

impl std::fmt::Display for ObjectId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0.hyphenated())
    }
}

impl From<Uuid> for ObjectId {
    fn from(uuid: Uuid) -> Self {
        Self(uuid)
    }
}
