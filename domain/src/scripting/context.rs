use serde::{Deserialize, Serialize};

use crate::core::id::ObjectId;

/// A script submitted to an engine: its identity and raw source text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScriptItem {
    pub script_id: ObjectId,
    /// Display name used in diagnostics (e.g. the inventory item name).
    pub name: String,
    pub host_object_id: ObjectId,
    pub owner_id: ObjectId,
    pub host_owner_id: ObjectId,
    pub source: String,
}

impl ScriptItem {
    /// A script owned by the owner of its host object.
    pub fn new(
        name: impl Into<String>,
        host_object_id: ObjectId,
        owner_id: ObjectId,
        source: impl Into<String>,
    ) -> Self {
        Self {
            script_id: ObjectId::new_random(),
            name: name.into(),
            host_object_id,
            owner_id,
            host_owner_id: owner_id,
            source: source.into(),
        }
    }

    pub fn with_script_id(mut self, script_id: ObjectId) -> Self {
        self.script_id = script_id;
        self
    }

    pub fn with_host_owner(mut self, host_owner_id: ObjectId) -> Self {
        self.host_owner_id = host_owner_id;
        self
    }
}

/// Identity of one running script instance.
///
/// Every host API call resolves to exactly one context. Contexts are
/// created when a script starts and dropped when it is removed or the
/// region shuts down; they are never mutated in between.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScriptExecutionContext {
    pub script_id: ObjectId,
    pub script_name: String,
    pub host_object_id: ObjectId,
    pub owner_id: ObjectId,
    /// Owner of the host object; the object-owner side of privilege checks.
    pub host_owner_id: ObjectId,
    pub engine_name: String,
    pub region: String,
}

impl ScriptExecutionContext {
    pub fn for_item(item: &ScriptItem, engine_name: &str, region: &str) -> Self {
        Self {
            script_id: item.script_id,
            script_name: item.name.clone(),
            host_object_id: item.host_object_id,
            owner_id: item.owner_id,
            host_owner_id: item.host_owner_id,
            engine_name: engine_name.to_string(),
            region: region.to_string(),
        }
    }
}
