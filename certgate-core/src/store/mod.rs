mod db;
mod memory;

use async_trait::async_trait;
use certgate_common::CertgateError;
use certgate_db_entities as entities;
use chrono::{DateTime, Utc};
pub use db::DatabaseRevocationStore;
pub use memory::MemoryRevocationStore;

/// An issued certificate and its account binding.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CertificateRecord {
    pub serial: String,
    /// Empty for certificates issued outside ACME.
    pub account_id: String,
    pub leaf_der: Option<Vec<u8>>,
    pub created_at: DateTime<Utc>,
}

impl CertificateRecord {
    pub fn new(serial: impl Into<String>, account_id: impl Into<String>) -> Self {
        CertificateRecord {
            serial: serial.into(),
            account_id: account_id.into(),
            leaf_der: None,
            created_at: Utc::now(),
        }
    }
}

impl From<entities::Certificate::Model> for CertificateRecord {
    fn from(model: entities::Certificate::Model) -> Self {
        CertificateRecord {
            serial: model.serial,
            account_id: model.account_id,
            leaf_der: model.leaf_der,
            created_at: model.created_at,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RevocationRecord {
    pub serial: String,
    pub reason_code: i32,
    pub reason: String,
    pub revoked_at: DateTime<Utc>,
    pub provisioner_id: String,
    pub mtls: bool,
    pub passive_only: bool,
}

impl From<entities::Revocation::Model> for RevocationRecord {
    fn from(model: entities::Revocation::Model) -> Self {
        RevocationRecord {
            serial: model.serial,
            reason_code: model.reason_code,
            reason: model.reason,
            revoked_at: model.revoked_at,
            provisioner_id: model.provisioner_id,
            mtls: model.mtls,
            passive_only: model.passive_only,
        }
    }
}

/// Persistence seam for revocation state. A serial is revoked exactly when
/// a revocation record for it exists.
#[async_trait]
pub trait RevocationStore: Send + Sync {
    async fn get_certificate_by_serial(
        &self,
        serial: &str,
    ) -> Result<Option<CertificateRecord>, CertgateError>;

    /// Atomic put-if-absent: a second writer for the same serial gets
    /// [`CertgateError::AlreadyRevoked`].
    async fn put_revocation(&self, record: RevocationRecord) -> Result<(), CertgateError>;

    async fn is_revoked(&self, serial: &str) -> Result<bool, CertgateError>;
}
