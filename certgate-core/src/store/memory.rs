use std::collections::HashMap;

use async_trait::async_trait;
use certgate_common::CertgateError;
use tokio::sync::Mutex;

use super::{CertificateRecord, RevocationRecord, RevocationStore};

/// In-memory store used by tests and embedded setups. The revocation map
/// lives under a single mutex, so put-if-absent is naturally atomic.
#[derive(Default)]
pub struct MemoryRevocationStore {
    certificates: Mutex<HashMap<String, CertificateRecord>>,
    revocations: Mutex<HashMap<String, RevocationRecord>>,
}

impl MemoryRevocationStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn add_certificate(&self, record: CertificateRecord) {
        self.certificates
            .lock()
            .await
            .insert(record.serial.clone(), record);
    }
}

#[async_trait]
impl RevocationStore for MemoryRevocationStore {
    async fn get_certificate_by_serial(
        &self,
        serial: &str,
    ) -> Result<Option<CertificateRecord>, CertgateError> {
        Ok(self.certificates.lock().await.get(serial).cloned())
    }

    async fn put_revocation(&self, record: RevocationRecord) -> Result<(), CertgateError> {
        let mut revocations = self.revocations.lock().await;
        if revocations.contains_key(&record.serial) {
            return Err(CertgateError::AlreadyRevoked(record.serial.clone()));
        }
        revocations.insert(record.serial.clone(), record);
        Ok(())
    }

    async fn is_revoked(&self, serial: &str) -> Result<bool, CertgateError> {
        Ok(self.revocations.lock().await.contains_key(serial))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(serial: &str) -> RevocationRecord {
        RevocationRecord {
            serial: serial.to_owned(),
            reason_code: 0,
            reason: "unspecified reason".to_owned(),
            revoked_at: chrono::Utc::now(),
            provisioner_id: "acme/test".to_owned(),
            mtls: false,
            passive_only: true,
        }
    }

    #[tokio::test]
    async fn test_put_revocation_is_put_if_absent() {
        let store = MemoryRevocationStore::new();
        assert!(!store.is_revoked("1234").await.unwrap());

        store.put_revocation(record("1234")).await.unwrap();
        assert!(store.is_revoked("1234").await.unwrap());

        let err = store.put_revocation(record("1234")).await.unwrap_err();
        assert!(matches!(err, CertgateError::AlreadyRevoked(serial) if serial == "1234"));
    }

    #[tokio::test]
    async fn test_distinct_serials_do_not_conflict() {
        let store = MemoryRevocationStore::new();
        store.put_revocation(record("1")).await.unwrap();
        store.put_revocation(record("2")).await.unwrap();
        assert!(store.is_revoked("1").await.unwrap());
        assert!(store.is_revoked("2").await.unwrap());
    }

    #[tokio::test]
    async fn test_certificate_lookup() {
        let store = MemoryRevocationStore::new();
        store
            .add_certificate(CertificateRecord::new("1234", "accountID"))
            .await;

        let found = store.get_certificate_by_serial("1234").await.unwrap();
        assert_eq!(found.unwrap().account_id, "accountID");
        assert!(store
            .get_certificate_by_serial("9999")
            .await
            .unwrap()
            .is_none());
    }
}
