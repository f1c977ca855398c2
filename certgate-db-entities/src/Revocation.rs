use chrono::{DateTime, Utc};
use sea_orm::entity::prelude::*;
use serde::Serialize;

/// Revocation state, keyed by serial. Existence of a row is what makes a
/// certificate revoked; the primary key keeps concurrent writers down to
/// one winner.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize)]
#[sea_orm(table_name = "revocations")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub serial: String,
    pub reason_code: i32,
    pub reason: String,
    pub revoked_at: DateTime<Utc>,
    pub provisioner_id: String,
    /// Authenticated by proving possession of the certificate key rather
    /// than an account credential.
    pub mtls: bool,
    /// Record only; CRL/OCSP publication is a downstream concern.
    pub passive_only: bool,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
