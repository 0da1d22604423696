use std::collections::HashSet;

use sandscript_application::PermissionChecker;
use sandscript_domain::ObjectId;

/// Privilege model of a single estate: grid gods plus the estate owner and
/// its managers.
#[derive(Debug, Clone, Default)]
pub struct EstatePermissions {
    gods: HashSet<ObjectId>,
    estate_owner: Option<ObjectId>,
    managers: HashSet<ObjectId>,
}

impl EstatePermissions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_god(mut self, id: ObjectId) -> Self {
        self.gods.insert(id);
        self
    }

    pub fn with_estate_owner(mut self, id: ObjectId) -> Self {
        self.estate_owner = Some(id);
        self
    }

    pub fn with_manager(mut self, id: ObjectId) -> Self {
        self.managers.insert(id);
        self
    }

    pub fn is_god(&self, id: ObjectId) -> bool {
        self.gods.contains(&id)
    }

    pub fn is_estate_manager_or_owner(&self, id: ObjectId) -> bool {
        self.estate_owner == Some(id) || self.managers.contains(&id)
    }
}

impl PermissionChecker for EstatePermissions {
    fn is_privileged(&self, account_id: ObjectId, _object_owner_id: ObjectId) -> bool {
        self.is_god(account_id) || self.is_estate_manager_or_owner(account_id)
    }
}
