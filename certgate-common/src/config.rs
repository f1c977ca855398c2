use serde::{Deserialize, Serialize};

#[inline]
fn _default_database_url() -> String {
    "sqlite:data/db".to_owned()
}

#[inline]
fn _default_external_url() -> String {
    "https://localhost:8443".to_owned()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProvisionerKind {
    Acme,
    Jwk,
}

/// A named policy + credential bundle authorizing issuance and revocation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProvisionerConfig {
    pub id: String,
    pub name: String,
    pub kind: ProvisionerKind,
    /// Public JWK for token-based (`jwk`) provisioners.
    #[serde(default)]
    pub key: Option<serde_json::Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CertgateConfig {
    #[serde(default = "_default_database_url")]
    pub database_url: String,

    /// Absolute base URL clients reach the CA at; used for JWS `url` checks
    /// and the ACME directory links.
    #[serde(default = "_default_external_url")]
    pub external_url: String,

    #[serde(default)]
    pub provisioners: Vec<ProvisionerConfig>,
}

impl Default for CertgateConfig {
    fn default() -> Self {
        CertgateConfig {
            database_url: _default_database_url(),
            external_url: _default_external_url(),
            provisioners: vec![],
        }
    }
}
