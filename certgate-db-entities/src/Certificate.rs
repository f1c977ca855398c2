use chrono::{DateTime, Utc};
use sea_orm::entity::prelude::*;
use serde::Serialize;

/// An issued leaf and its account binding. `serial` and `account_id` never
/// change after issuance.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize)]
#[sea_orm(table_name = "certificates")]
pub struct Model {
    /// Decimal string form of the X.509 serial number.
    #[sea_orm(primary_key, auto_increment = false)]
    pub serial: String,
    /// Owning ACME account; empty for non-ACME issuance.
    pub account_id: String,
    /// Original DER leaf, kept for reissuance.
    #[sea_orm(nullable)]
    pub leaf_der: Option<Vec<u8>>,
    pub created_at: DateTime<Utc>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
