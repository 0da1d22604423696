use std::collections::HashMap;
use std::sync::RwLock;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use sandscript_application::{DirectoryError, UserDirectory};
use sandscript_domain::{Account, ObjectId};

/// Account directory held in memory.
///
/// Can be switched offline or given an artificial latency to exercise the
/// sandbox's unavailable-service paths.
#[derive(Debug, Default)]
pub struct InMemoryUserDirectory {
    accounts: RwLock<HashMap<ObjectId, Account>>,
    offline: AtomicBool,
    latency: Option<Duration>,
}

impl InMemoryUserDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_account(self, account: Account) -> Self {
        self.insert(account);
        self
    }

    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    pub fn insert(&self, account: Account) {
        let mut accounts = self.accounts.write().unwrap_or_else(|e| e.into_inner());
        accounts.insert(account.id, account);
    }

    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    pub fn len(&self) -> usize {
        self.accounts.read().map(|a| a.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl UserDirectory for InMemoryUserDirectory {
    async fn lookup_account(
        &self,
        _scope_id: ObjectId,
        user_id: ObjectId,
    ) -> Result<Option<Account>, DirectoryError> {
        if let Some(latency) = self.latency {
            tokio::time::sleep(latency).await;
        }
        if self.offline.load(Ordering::SeqCst) {
            return Err(DirectoryError::Unavailable("directory offline".to_string()));
        }
        let accounts = self
            .accounts
            .read()
            .map_err(|e| DirectoryError::Backend(format!("account table poisoned: {}", e)))?;
        Ok(accounts.get(&user_id).cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn account() -> Account {
        Account {
            id: ObjectId::new_random(),
            first_name: "Test".into(),
            last_name: "User".into(),
            country: "DE".into(),
        }
    }

    #[tokio::test]
    async fn test_lookup_known_and_unknown() {
        let known = account();
        let directory = InMemoryUserDirectory::new().with_account(known.clone());

        let found = directory.lookup_account(ObjectId::NIL, known.id).await.unwrap();
        assert_eq!(found, Some(known));

        let missing = directory
            .lookup_account(ObjectId::NIL, ObjectId::new_random())
            .await
            .unwrap();
        assert!(missing.is_none());
    }

    #[tokio::test]
    async fn test_offline_directory_errors() {
        let known = account();
        let directory = InMemoryUserDirectory::new().with_account(known.clone());
        directory.set_offline(true);
        assert!(matches!(
            directory.lookup_account(ObjectId::NIL, known.id).await,
            Err(DirectoryError::Unavailable(_))
        ));
    }
}
