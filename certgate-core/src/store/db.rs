use std::sync::Arc;

use async_trait::async_trait;
use certgate_common::CertgateError;
use certgate_db_entities as entities;
use sea_orm::ActiveValue::Set;
use sea_orm::{ActiveModelTrait, DatabaseConnection, DbErr, EntityTrait, SqlErr};
use tokio::sync::Mutex;

use super::{CertificateRecord, RevocationRecord, RevocationStore};

pub struct DatabaseRevocationStore {
    db: Arc<Mutex<DatabaseConnection>>,
}

impl DatabaseRevocationStore {
    pub fn new(db: &Arc<Mutex<DatabaseConnection>>) -> Self {
        Self { db: db.clone() }
    }

    /// Records an issued certificate; called by the issuance paths.
    pub async fn add_certificate(&self, record: CertificateRecord) -> Result<(), CertgateError> {
        let db = self.db.lock().await;
        entities::Certificate::ActiveModel {
            serial: Set(record.serial),
            account_id: Set(record.account_id),
            leaf_der: Set(record.leaf_der),
            created_at: Set(record.created_at),
        }
        .insert(&*db)
        .await?;
        Ok(())
    }
}

#[async_trait]
impl RevocationStore for DatabaseRevocationStore {
    async fn get_certificate_by_serial(
        &self,
        serial: &str,
    ) -> Result<Option<CertificateRecord>, CertgateError> {
        let db = self.db.lock().await;
        Ok(entities::Certificate::Entity::find_by_id(serial)
            .one(&*db)
            .await?
            .map(Into::into))
    }

    async fn put_revocation(&self, record: RevocationRecord) -> Result<(), CertgateError> {
        let serial = record.serial.clone();
        let db = self.db.lock().await;
        let result = entities::Revocation::ActiveModel {
            serial: Set(record.serial),
            reason_code: Set(record.reason_code),
            reason: Set(record.reason),
            revoked_at: Set(record.revoked_at),
            provisioner_id: Set(record.provisioner_id),
            mtls: Set(record.mtls),
            passive_only: Set(record.passive_only),
        }
        .insert(&*db)
        .await;

        match result {
            Ok(_) => Ok(()),
            // The primary key on serial turns a concurrent duplicate into a
            // constraint violation.
            Err(err)
                if matches!(err.sql_err(), Some(SqlErr::UniqueConstraintViolation(_)))
                    || matches!(err, DbErr::RecordNotInserted) =>
            {
                Err(CertgateError::AlreadyRevoked(serial))
            }
            Err(err) => Err(err.into()),
        }
    }

    async fn is_revoked(&self, serial: &str) -> Result<bool, CertgateError> {
        let db = self.db.lock().await;
        Ok(entities::Revocation::Entity::find_by_id(serial)
            .one(&*db)
            .await?
            .is_some())
    }
}
