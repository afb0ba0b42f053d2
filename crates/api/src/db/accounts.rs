//! `PostgreSQL` account repository.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;

use userhub_core::{AccountId, Email};

use super::{AccountRepository, RepositoryError, map_unique_violation};
use crate::models::{Account, NewAccount};

const ACCOUNT_COLUMNS: &str = "id, email, password_hash, first_name, last_name, \
                               email_verified, account_created, account_updated";

#[derive(sqlx::FromRow)]
struct AccountRow {
    id: i64,
    email: String,
    password_hash: String,
    first_name: String,
    last_name: String,
    email_verified: bool,
    account_created: DateTime<Utc>,
    account_updated: DateTime<Utc>,
}

impl TryFrom<AccountRow> for Account {
    type Error = RepositoryError;

    fn try_from(row: AccountRow) -> Result<Self, Self::Error> {
        let email = Email::parse(&row.email).map_err(|e| {
            RepositoryError::DataCorruption(format!("invalid email in database: {e}"))
        })?;

        Ok(Self {
            id: AccountId::new(row.id),
            email,
            password_hash: row.password_hash,
            first_name: row.first_name,
            last_name: row.last_name,
            email_verified: row.email_verified,
            account_created: row.account_created,
            account_updated: row.account_updated,
        })
    }
}

/// Account repository backed by the `accounts` table.
#[derive(Clone)]
pub struct PgAccountRepository {
    pool: PgPool,
}

impl PgAccountRepository {
    /// Create a new account repository.
    #[must_use]
    pub const fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl AccountRepository for PgAccountRepository {
    async fn find_by_email(&self, email: &Email) -> Result<Option<Account>, RepositoryError> {
        let row = sqlx::query_as::<_, AccountRow>(&format!(
            "SELECT {ACCOUNT_COLUMNS} FROM accounts WHERE email = $1"
        ))
        .bind(email.as_str())
        .fetch_optional(&self.pool)
        .await?;

        row.map(Account::try_from).transpose()
    }

    async fn exists_by_email(&self, email: &Email) -> Result<bool, RepositoryError> {
        let exists: bool =
            sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM accounts WHERE email = $1)")
                .bind(email.as_str())
                .fetch_one(&self.pool)
                .await?;

        Ok(exists)
    }

    async fn insert(&self, account: NewAccount) -> Result<Account, RepositoryError> {
        let row = sqlx::query_as::<_, AccountRow>(&format!(
            r"
            INSERT INTO accounts
                (email, password_hash, first_name, last_name,
                 email_verified, account_created, account_updated)
            VALUES ($1, $2, $3, $4, FALSE, $5, $5)
            RETURNING {ACCOUNT_COLUMNS}
            "
        ))
        .bind(account.email.as_str())
        .bind(&account.password_hash)
        .bind(&account.first_name)
        .bind(&account.last_name)
        .bind(account.created_at)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| map_unique_violation(e, "email already exists"))?;

        Account::try_from(row)
    }

    async fn update(&self, account: &Account) -> Result<Account, RepositoryError> {
        let row = sqlx::query_as::<_, AccountRow>(&format!(
            r"
            UPDATE accounts
            SET password_hash = $2,
                first_name = $3,
                last_name = $4,
                email_verified = $5,
                account_updated = $6
            WHERE id = $1
            RETURNING {ACCOUNT_COLUMNS}
            "
        ))
        .bind(account.id)
        .bind(&account.password_hash)
        .bind(&account.first_name)
        .bind(&account.last_name)
        .bind(account.email_verified)
        .bind(account.account_updated)
        .fetch_optional(&self.pool)
        .await?
        .ok_or(RepositoryError::NotFound)?;

        Account::try_from(row)
    }

    async fn health_check(&self) -> Result<(), RepositoryError> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }
}
