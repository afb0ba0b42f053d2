//! In-memory repository adapters.
//!
//! They enforce the same uniqueness rules as the `PostgreSQL` schema so the
//! service tests exercise the real conflict paths. The picture repository
//! also mirrors the upsert: a second save for an account replaces the row.

use std::collections::BTreeMap;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;

use userhub_core::{AccountId, Email, PictureId};

use super::{AccountRepository, PictureRepository, RepositoryError};
use crate::models::{Account, NewAccount, Picture};

fn poisoned<T>(_: T) -> RepositoryError {
    RepositoryError::Unavailable("in-memory store lock poisoned".to_string())
}

#[derive(Default)]
struct AccountTable {
    next_id: i64,
    rows: BTreeMap<AccountId, Account>,
}

/// Account repository held in process memory.
#[derive(Default)]
pub struct InMemoryAccountRepository {
    table: Mutex<AccountTable>,
    unavailable: AtomicBool,
}

impl InMemoryAccountRepository {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every call fail as if the database were down.
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    /// Number of stored accounts.
    ///
    /// # Panics
    ///
    /// Panics if the lock is poisoned.
    #[must_use]
    #[allow(clippy::unwrap_used)]
    pub fn len(&self) -> usize {
        self.table.lock().unwrap().rows.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn check_available(&self) -> Result<(), RepositoryError> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(RepositoryError::Unavailable(
                "in-memory store marked unavailable".to_string(),
            ));
        }
        Ok(())
    }
}

#[async_trait]
impl AccountRepository for InMemoryAccountRepository {
    async fn find_by_email(&self, email: &Email) -> Result<Option<Account>, RepositoryError> {
        self.check_available()?;
        let table = self.table.lock().map_err(poisoned)?;
        Ok(table.rows.values().find(|a| &a.email == email).cloned())
    }

    async fn exists_by_email(&self, email: &Email) -> Result<bool, RepositoryError> {
        Ok(self.find_by_email(email).await?.is_some())
    }

    async fn insert(&self, account: NewAccount) -> Result<Account, RepositoryError> {
        self.check_available()?;
        let mut table = self.table.lock().map_err(poisoned)?;

        if table.rows.values().any(|a| a.email == account.email) {
            return Err(RepositoryError::Conflict("email already exists".to_owned()));
        }

        table.next_id += 1;
        let id = AccountId::new(table.next_id);
        let stored = Account {
            id,
            email: account.email,
            password_hash: account.password_hash,
            first_name: account.first_name,
            last_name: account.last_name,
            email_verified: false,
            account_created: account.created_at,
            account_updated: account.created_at,
        };
        table.rows.insert(id, stored.clone());
        Ok(stored)
    }

    async fn update(&self, account: &Account) -> Result<Account, RepositoryError> {
        self.check_available()?;
        let mut table = self.table.lock().map_err(poisoned)?;

        let row = table
            .rows
            .get_mut(&account.id)
            .ok_or(RepositoryError::NotFound)?;
        row.password_hash.clone_from(&account.password_hash);
        row.first_name.clone_from(&account.first_name);
        row.last_name.clone_from(&account.last_name);
        row.email_verified = account.email_verified;
        row.account_updated = account.account_updated;
        Ok(row.clone())
    }

    async fn health_check(&self) -> Result<(), RepositoryError> {
        self.check_available()
    }
}

/// Picture metadata repository held in process memory.
#[derive(Default)]
pub struct InMemoryPictureRepository {
    rows: Mutex<BTreeMap<AccountId, Picture>>,
    fail_saves: AtomicBool,
}

impl InMemoryPictureRepository {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored picture rows.
    ///
    /// # Panics
    ///
    /// Panics if the lock is poisoned.
    #[must_use]
    #[allow(clippy::unwrap_used)]
    pub fn len(&self) -> usize {
        self.rows.lock().unwrap().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Make every `save` fail as if the database were down.
    pub fn set_failing_saves(&self, failing: bool) {
        self.fail_saves.store(failing, Ordering::SeqCst);
    }
}

#[async_trait]
impl PictureRepository for InMemoryPictureRepository {
    async fn find_by_account(
        &self,
        account_id: AccountId,
    ) -> Result<Option<Picture>, RepositoryError> {
        let rows = self.rows.lock().map_err(poisoned)?;
        Ok(rows.get(&account_id).cloned())
    }

    async fn save(&self, picture: &Picture) -> Result<Picture, RepositoryError> {
        if self.fail_saves.load(Ordering::SeqCst) {
            return Err(RepositoryError::Unavailable(
                "in-memory picture saves disabled".to_string(),
            ));
        }
        let mut rows = self.rows.lock().map_err(poisoned)?;
        if rows
            .values()
            .any(|p| p.storage_key == picture.storage_key && p.account_id != picture.account_id)
        {
            return Err(RepositoryError::Conflict(
                "storage key already in use".to_owned(),
            ));
        }
        rows.insert(picture.account_id, picture.clone());
        Ok(picture.clone())
    }

    async fn delete(&self, id: PictureId) -> Result<bool, RepositoryError> {
        let mut rows = self.rows.lock().map_err(poisoned)?;
        let before = rows.len();
        rows.retain(|_, p| p.id != id);
        Ok(rows.len() < before)
    }
}
