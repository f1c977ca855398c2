use std::sync::Arc;

use async_trait::async_trait;
use certgate_common::CertgateError;
use certgate_db_entities as entities;
pub use certgate_db_entities::Account::AccountStatus;
use certgate_jose::Jwk;
use sea_orm::{DatabaseConnection, EntityTrait};
use tokio::sync::Mutex;

/// An ACME account as resolved from a JWS `kid`.
#[derive(Debug, Clone, PartialEq)]
pub struct Account {
    pub id: String,
    pub status: AccountStatus,
    /// The registered public key; JWS envelopes referencing this account by
    /// `kid` must verify against it.
    pub key: Jwk,
}

impl TryFrom<entities::Account::Model> for Account {
    type Error = CertgateError;

    fn try_from(model: entities::Account::Model) -> Result<Self, Self::Error> {
        let key = serde_json::from_value(model.key).map_err(CertgateError::other)?;
        Ok(Account {
            id: model.id,
            status: model.status,
            key,
        })
    }
}

/// Lookup seam for accounts. A `kid` is the account URL handed out at
/// registration; its trailing path segment is the account id.
#[async_trait]
pub trait AccountStore: Send + Sync {
    async fn get_account_by_key_id(&self, kid: &str) -> Result<Option<Account>, CertgateError>;
}

pub struct DatabaseAccountStore {
    db: Arc<Mutex<DatabaseConnection>>,
}

impl DatabaseAccountStore {
    pub fn new(db: &Arc<Mutex<DatabaseConnection>>) -> Self {
        Self { db: db.clone() }
    }
}

pub fn account_id_from_key_id(kid: &str) -> &str {
    kid.trim_end_matches('/').rsplit('/').next().unwrap_or(kid)
}

#[async_trait]
impl AccountStore for DatabaseAccountStore {
    async fn get_account_by_key_id(&self, kid: &str) -> Result<Option<Account>, CertgateError> {
        let id = account_id_from_key_id(kid);
        let db = self.db.lock().await;
        match entities::Account::Entity::find_by_id(id).one(&*db).await? {
            Some(model) => Ok(Some(Account::try_from(model)?)),
            None => Ok(None),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_account_id_from_key_id() {
        assert_eq!(
            account_id_from_key_id("https://ca.example.com/acme/prov/account/abc123"),
            "abc123"
        );
        assert_eq!(account_id_from_key_id("abc123"), "abc123");
        assert_eq!(
            account_id_from_key_id("https://ca.example.com/acme/prov/account/abc123/"),
            "abc123"
        );
    }
}
