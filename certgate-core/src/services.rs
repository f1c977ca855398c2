use std::sync::Arc;

use anyhow::Result;
use certgate_common::CertgateConfig;
use sea_orm::DatabaseConnection;
use tokio::sync::Mutex;

use crate::db::connect_to_db;
use crate::{
    AccountStore, Authority, CertificateAuthority, DatabaseAccountStore,
    DatabaseRevocationStore, ProvisionerRegistry, RevocationStore,
};

#[derive(Clone)]
pub struct Services {
    pub db: Arc<Mutex<DatabaseConnection>>,
    pub config: Arc<Mutex<CertgateConfig>>,
    pub store: Arc<dyn RevocationStore>,
    pub accounts: Arc<dyn AccountStore>,
    pub provisioners: Arc<ProvisionerRegistry>,
    pub authority: Arc<dyn CertificateAuthority>,
}

impl Services {
    pub async fn new(config: CertgateConfig) -> Result<Self> {
        let db = connect_to_db(&config).await?;
        let db = Arc::new(Mutex::new(db));

        let store: Arc<dyn RevocationStore> = Arc::new(DatabaseRevocationStore::new(&db));
        let accounts: Arc<dyn AccountStore> = Arc::new(DatabaseAccountStore::new(&db));
        let provisioners = Arc::new(ProvisionerRegistry::from_config(&config.provisioners)?);
        let authority: Arc<dyn CertificateAuthority> =
            Arc::new(Authority::new(store.clone(), provisioners.clone()));

        Ok(Self {
            db,
            config: Arc::new(Mutex::new(config)),
            store,
            accounts,
            provisioners,
            authority,
        })
    }
}
