use std::time::Duration;

use anyhow::Result;
use certgate_common::CertgateConfig;
use certgate_db_entities as entities;
use sea_orm::{ConnectOptions, ConnectionTrait, Database, DatabaseConnection, Schema};

pub async fn connect_to_db(config: &CertgateConfig) -> Result<DatabaseConnection> {
    let mut opt = ConnectOptions::new(config.database_url.clone());
    opt.max_connections(100)
        .min_connections(5)
        .connect_timeout(Duration::from_secs(8))
        .idle_timeout(Duration::from_secs(8))
        .sqlx_logging(true);

    let connection = Database::connect(opt).await?;
    setup_schema(&connection).await?;
    Ok(connection)
}

async fn setup_schema(db: &DatabaseConnection) -> Result<()> {
    let backend = db.get_database_backend();
    let schema = Schema::new(backend);
    let mut statements = [
        schema.create_table_from_entity(entities::Certificate::Entity),
        schema.create_table_from_entity(entities::Revocation::Entity),
        schema.create_table_from_entity(entities::Account::Entity),
    ];
    for statement in &mut statements {
        db.execute(backend.build(statement.if_not_exists())).await?;
    }
    Ok(())
}
