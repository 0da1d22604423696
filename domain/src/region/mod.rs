//! Region-side records the sandbox reads through collaborator services.

use serde::{Deserialize, Serialize};

use crate::core::id::ObjectId;

/// A user account as returned by the region's account directory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Account {
    pub id: ObjectId,
    pub first_name: String,
    pub last_name: String,
    /// ISO country code or free-form locale; may be empty.
    #[serde(default)]
    pub country: String,
}

impl Account {
    pub fn display_name(&self) -> String {
        if self.last_name.is_empty() {
            self.first_name.clone()
        } else {
            format!("{} {}", self.first_name, self.last_name)
        }
    }
}
