//! Region collaborator ports.
//!
//! The script subsystem never owns accounts or permissions; it reaches the
//! region's services through these narrow interfaces.

use async_trait::async_trait;
use sandscript_domain::{Account, ObjectId};
use std::sync::Arc;
use thiserror::Error;

/// Failure of the account directory service itself (not "no such user").
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DirectoryError {
    #[error("account service unavailable: {0}")]
    Unavailable(String),

    #[error("account service error: {0}")]
    Backend(String),
}

/// Account lookup service owned by the region's grid connection.
#[async_trait]
pub trait UserDirectory: Send + Sync {
    /// Look up an account. `Ok(None)` means the user does not exist.
    async fn lookup_account(
        &self,
        scope_id: ObjectId,
        user_id: ObjectId,
    ) -> Result<Option<Account>, DirectoryError>;
}

/// Region permission module.
pub trait PermissionChecker: Send + Sync {
    /// Whether `account_id` holds elevated rights over objects owned by
    /// `object_owner_id` (god mode, estate management, ...).
    fn is_privileged(&self, account_id: ObjectId, object_owner_id: ObjectId) -> bool;
}

/// Permission checker that grants nothing.
pub struct DenyAllPermissions;

impl PermissionChecker for DenyAllPermissions {
    fn is_privileged(&self, _account_id: ObjectId, _object_owner_id: ObjectId) -> bool {
        false
    }
}

/// Handles to the region a script engine is attached to.
#[derive(Clone)]
pub struct RegionContext {
    pub name: String,
    pub region_id: ObjectId,
    /// Scope used for directory lookups (grid scope).
    pub scope_id: ObjectId,
    account_service: Option<Arc<dyn UserDirectory>>,
    permissions: Arc<dyn PermissionChecker>,
}

impl RegionContext {
    pub fn new(name: impl Into<String>, region_id: ObjectId) -> Self {
        Self {
            name: name.into(),
            region_id,
            scope_id: ObjectId::NIL,
            account_service: None,
            permissions: Arc::new(DenyAllPermissions),
        }
    }

    pub fn with_scope(mut self, scope_id: ObjectId) -> Self {
        self.scope_id = scope_id;
        self
    }

    pub fn with_account_service(mut self, directory: Arc<dyn UserDirectory>) -> Self {
        self.account_service = Some(directory);
        self
    }

    pub fn with_permissions(mut self, permissions: Arc<dyn PermissionChecker>) -> Self {
        self.permissions = permissions;
        self
    }

    /// The owning account service, if the region is connected to one.
    pub fn account_service(&self) -> Option<Arc<dyn UserDirectory>> {
        self.account_service.clone()
    }

    pub fn permissions(&self) -> &Arc<dyn PermissionChecker> {
        &self.permissions
    }
}

impl std::fmt::Debug for RegionContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RegionContext")
            .field("name", &self.name)
            .field("region_id", &self.region_id)
            .field("scope_id", &self.scope_id)
            .field("has_account_service", &self.account_service.is_some())
            .finish()
    }
}
