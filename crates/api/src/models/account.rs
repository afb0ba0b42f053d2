//! Account domain types.

use chrono::{DateTime, TimeDelta, Utc};
use serde::{Deserialize, Serialize};

use userhub_core::{AccountId, Email};

/// A registered account (domain type).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Account {
    /// Unique account ID, assigned by the repository.
    pub id: AccountId,
    /// Login email, immutable after creation.
    pub email: Email,
    /// Argon2 PHC string.
    pub password_hash: String,
    pub first_name: String,
    pub last_name: String,
    /// Set once through the verification link.
    pub email_verified: bool,
    /// When the account was created.
    pub account_created: DateTime<Utc>,
    /// When the account was last mutated.
    pub account_updated: DateTime<Utc>,
}

impl Account {
    /// Advance `account_updated` for a mutation happening at `now`.
    ///
    /// The stored timestamp never moves backwards and always advances by at
    /// least one microsecond (the database resolution), so two writes in
    /// quick succession stay ordered.
    pub fn touch(&mut self, now: DateTime<Utc>) {
        let floor = self.account_updated + TimeDelta::microseconds(1);
        self.account_updated = now.max(floor);
    }
}

/// Fields needed to insert a new account.
#[derive(Debug, Clone)]
pub struct NewAccount {
    pub email: Email,
    pub password_hash: String,
    pub first_name: String,
    pub last_name: String,
    pub created_at: DateTime<Utc>,
}

/// Request body for `POST /v1/user`.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct CreateAccountRequest {
    pub email: String,
    pub password: String,
    pub first_name: String,
    pub last_name: String,
}

/// Request body for `PUT /v1/user/self`.
///
/// Only the self-editable fields exist here. `email`, `id`, and the two
/// timestamps are unknown fields to the deserializer, so a payload carrying
/// any of them is rejected instead of silently ignored.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct AccountPatch {
    #[serde(default)]
    pub first_name: Option<String>,
    #[serde(default)]
    pub last_name: Option<String>,
    #[serde(default)]
    pub password: Option<String>,
}

impl AccountPatch {
    /// The new password, if one was supplied and is non-empty.
    #[must_use]
    pub fn new_password(&self) -> Option<&str> {
        self.password.as_deref().filter(|p| !p.is_empty())
    }
}

/// Account JSON served to clients. The password hash is never included.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct AccountView {
    pub id: AccountId,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub account_created: DateTime<Utc>,
    pub account_updated: DateTime<Utc>,
    pub email_verified: bool,
}

impl From<&Account> for AccountView {
    fn from(account: &Account) -> Self {
        Self {
            id: account.id,
            email: account.email.to_string(),
            first_name: account.first_name.clone(),
            last_name: account.last_name.clone(),
            account_created: account.account_created,
            account_updated: account.account_updated,
            email_verified: account.email_verified,
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn account(at: DateTime<Utc>) -> Account {
        Account {
            id: AccountId::new(7),
            email: Email::parse("alice@example.com").unwrap(),
            password_hash: "$argon2id$v=19$m=19456,t=2,p=1$c2FsdA$aGFzaA".to_string(),
            first_name: "Alice".to_string(),
            last_name: "Jones".to_string(),
            email_verified: false,
            account_created: at,
            account_updated: at,
        }
    }

    #[test]
    fn test_touch_moves_forward() {
        let created = Utc::now();
        let mut acct = account(created);

        acct.touch(created + TimeDelta::seconds(5));
        assert_eq!(acct.account_updated, created + TimeDelta::seconds(5));
    }

    #[test]
    fn test_touch_never_goes_backwards() {
        let created = Utc::now();
        let mut acct = account(created);

        acct.touch(created - TimeDelta::seconds(30));
        assert!(acct.account_updated > created);

        acct.touch(created);
        assert!(acct.account_updated > created + TimeDelta::microseconds(1));
    }

    #[test]
    fn test_patch_rejects_immutable_fields() {
        for body in [
            r#"{"email":"other@example.com"}"#,
            r#"{"accountCreated":"2024-01-01T00:00:00Z"}"#,
            r#"{"accountUpdated":"2024-01-01T00:00:00Z"}"#,
            r#"{"id":3}"#,
            r#"{"emailVerified":true}"#,
            r#"{"firstName":"A","nickname":"x"}"#,
        ] {
            assert!(
                serde_json::from_str::<AccountPatch>(body).is_err(),
                "accepted {body}"
            );
        }
    }

    #[test]
    fn test_patch_partial_and_null_fields() {
        let patch: AccountPatch =
            serde_json::from_str(r#"{"lastName":"Smith","firstName":null}"#).unwrap();
        assert_eq!(patch.last_name.as_deref(), Some("Smith"));
        assert_eq!(patch.first_name, None);
        assert_eq!(patch.new_password(), None);
    }

    #[test]
    fn test_patch_empty_password_is_ignored() {
        let patch: AccountPatch = serde_json::from_str(r#"{"password":""}"#).unwrap();
        assert_eq!(patch.new_password(), None);

        let patch: AccountPatch = serde_json::from_str(r#"{"password":"n3w"}"#).unwrap();
        assert_eq!(patch.new_password(), Some("n3w"));
    }

    #[test]
    fn test_create_request_rejects_unknown_fields() {
        let body = r#"{"email":"a@b.c","password":"p","firstName":"A","lastName":"B","admin":true}"#;
        assert!(serde_json::from_str::<CreateAccountRequest>(body).is_err());
    }

    #[test]
    fn test_view_is_camel_case_without_hash() {
        let acct = account(Utc::now());
        let json = serde_json::to_value(AccountView::from(&acct)).unwrap();

        assert_eq!(json["id"], 7);
        assert_eq!(json["email"], "alice@example.com");
        assert_eq!(json["firstName"], "Alice");
        assert_eq!(json["emailVerified"], false);
        assert!(json.get("accountCreated").is_some());
        assert!(json.get("password").is_none());
        assert!(json.get("passwordHash").is_none());
    }
}
