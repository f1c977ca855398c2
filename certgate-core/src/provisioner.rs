use std::collections::HashSet;
use std::sync::Arc;

use async_trait::async_trait;
use certgate_common::{CertgateError, ProvisionerConfig, ProvisionerKind};
use certgate_jose::{FlattenedJws, Jwk, VerifyingKey};
use chrono::Utc;
use serde::Deserialize;
use tokio::sync::Mutex;

/// ACME provisioners have no token to check: ownership or
/// proof-of-possession is established by the revoke handler, so the policy
/// hook accepts by default.
pub struct AcmeProvisioner {
    pub id: String,
    pub name: String,
}

impl AcmeProvisioner {
    pub async fn authorize_revoke(&self, _token: Option<&str>) -> Result<(), CertgateError> {
        Ok(())
    }
}

#[derive(Debug, Deserialize)]
struct TokenClaims {
    jti: String,
    exp: i64,
}

/// Token-based provisioner: revocations carry a one-time token signed with
/// the provisioner key.
pub struct JwkProvisioner {
    pub id: String,
    pub name: String,
    key: Jwk,
    used_tokens: Mutex<HashSet<String>>,
}

impl JwkProvisioner {
    pub fn new(id: impl Into<String>, name: impl Into<String>, key: Jwk) -> Self {
        JwkProvisioner {
            id: id.into(),
            name: name.into(),
            key,
            used_tokens: Mutex::new(HashSet::new()),
        }
    }

    /// Validates and consumes the one-time token. Replays of the same `jti`
    /// are rejected for the lifetime of this instance.
    pub async fn authorize_revoke(&self, token: Option<&str>) -> Result<(), CertgateError> {
        let Some(token) = token else {
            return Err(CertgateError::Unauthorized(
                "one-time token required".to_owned(),
            ));
        };
        let claims = self.validate(token)?;
        let mut used = self.used_tokens.lock().await;
        if !used.insert(claims.jti) {
            return Err(CertgateError::Unauthorized("token already used".to_owned()));
        }
        Ok(())
    }

    fn validate(&self, token: &str) -> Result<TokenClaims, CertgateError> {
        let jws = FlattenedJws::from_compact(token)
            .map_err(|err| CertgateError::Unauthorized(format!("malformed token: {err}")))?;
        let key = VerifyingKey::from_jwk(&self.key).map_err(CertgateError::other)?;
        let payload = jws
            .verify(&key)
            .map_err(|err| CertgateError::Unauthorized(format!("invalid token: {err}")))?;
        let claims: TokenClaims = serde_json::from_slice(&payload)
            .map_err(|err| CertgateError::Unauthorized(format!("invalid token claims: {err}")))?;
        if claims.exp <= Utc::now().timestamp() {
            return Err(CertgateError::Unauthorized("token expired".to_owned()));
        }
        Ok(claims)
    }
}

pub enum Provisioner {
    Acme(AcmeProvisioner),
    Jwk(JwkProvisioner),
}

impl Provisioner {
    pub fn id(&self) -> &str {
        match self {
            Provisioner::Acme(p) => &p.id,
            Provisioner::Jwk(p) => &p.id,
        }
    }

    pub fn name(&self) -> &str {
        match self {
            Provisioner::Acme(p) => &p.name,
            Provisioner::Jwk(p) => &p.name,
        }
    }

    pub fn kind(&self) -> ProvisionerKind {
        match self {
            Provisioner::Acme(_) => ProvisionerKind::Acme,
            Provisioner::Jwk(_) => ProvisionerKind::Jwk,
        }
    }

    pub async fn authorize_revoke(&self, token: Option<&str>) -> Result<(), CertgateError> {
        match self {
            Provisioner::Acme(p) => p.authorize_revoke(token).await,
            Provisioner::Jwk(p) => p.authorize_revoke(token).await,
        }
    }
}

/// The narrow view of a provisioner the revocation flow needs; handlers are
/// wired against this so tests can substitute their own policies.
#[async_trait]
pub trait ProvisionerHook: Send + Sync {
    fn id(&self) -> &str;
    fn name(&self) -> &str;
    async fn authorize_revoke(&self, token: Option<&str>) -> Result<(), CertgateError>;
}

#[async_trait]
impl ProvisionerHook for Provisioner {
    fn id(&self) -> &str {
        Provisioner::id(self)
    }

    fn name(&self) -> &str {
        Provisioner::name(self)
    }

    async fn authorize_revoke(&self, token: Option<&str>) -> Result<(), CertgateError> {
        Provisioner::authorize_revoke(self, token).await
    }
}

#[derive(Default)]
pub struct ProvisionerRegistry {
    provisioners: Vec<Arc<Provisioner>>,
}

impl ProvisionerRegistry {
    pub fn new(provisioners: Vec<Provisioner>) -> Self {
        ProvisionerRegistry {
            provisioners: provisioners.into_iter().map(Arc::new).collect(),
        }
    }

    pub fn from_config(configs: &[ProvisionerConfig]) -> Result<Self, CertgateError> {
        let provisioners = configs
            .iter()
            .map(|config| match config.kind {
                ProvisionerKind::Acme => Ok(Provisioner::Acme(AcmeProvisioner {
                    id: config.id.clone(),
                    name: config.name.clone(),
                })),
                ProvisionerKind::Jwk => {
                    let key = config.key.clone().ok_or_else(|| {
                        CertgateError::InvalidConfiguration(format!(
                            "jwk provisioner '{}' has no key",
                            config.name
                        ))
                    })?;
                    let key: Jwk = serde_json::from_value(key).map_err(|err| {
                        CertgateError::InvalidConfiguration(format!(
                            "jwk provisioner '{}': {err}",
                            config.name
                        ))
                    })?;
                    Ok(Provisioner::Jwk(JwkProvisioner::new(
                        config.id.clone(),
                        config.name.clone(),
                        key,
                    )))
                }
            })
            .collect::<Result<Vec<_>, CertgateError>>()?;
        Ok(Self::new(provisioners))
    }

    pub fn lookup(&self, name: &str) -> Option<Arc<Provisioner>> {
        self.provisioners.iter().find(|p| p.name() == name).cloned()
    }

    /// Resolves the provisioner a one-time token was minted by, from its
    /// unverified `iss` claim. The signature is checked by the provisioner
    /// itself in `authorize_revoke`.
    pub fn lookup_by_token(&self, token: &str) -> Result<Arc<Provisioner>, CertgateError> {
        #[derive(Deserialize)]
        struct UnverifiedClaims {
            #[serde(default)]
            iss: Option<String>,
        }

        let jws = FlattenedJws::from_compact(token)
            .map_err(|err| CertgateError::Unauthorized(format!("malformed token: {err}")))?;
        let payload = jws
            .payload()
            .map_err(|err| CertgateError::Unauthorized(format!("malformed token: {err}")))?;
        let claims: UnverifiedClaims = serde_json::from_slice(&payload)
            .map_err(|err| CertgateError::Unauthorized(format!("invalid token claims: {err}")))?;
        let iss = claims
            .iss
            .ok_or_else(|| CertgateError::Unauthorized("token has no issuer".to_owned()))?;
        self.lookup(&iss)
            .ok_or(CertgateError::ProvisionerNotFound(iss))
    }
}

#[cfg(test)]
mod tests {
    use certgate_jose::{EcCurve, JwsSigner};

    use super::*;

    fn token(signer: &JwsSigner, iss: &str, jti: &str, exp: i64) -> String {
        let claims = format!(r#"{{"iss":"{iss}","jti":"{jti}","exp":{exp}}}"#);
        signer
            .encode(claims.as_bytes(), None, None, "https://ca.example.com/1.0/revoke")
            .unwrap()
            .compact()
    }

    fn provisioner(signer: &JwsSigner) -> JwkProvisioner {
        JwkProvisioner::new("jwk/ops", "ops", signer.public_jwk().unwrap())
    }

    #[tokio::test]
    async fn test_one_time_token_is_consumed() {
        let signer = JwsSigner::generate_ecdsa(EcCurve::P256).unwrap();
        let prov = provisioner(&signer);
        let exp = Utc::now().timestamp() + 300;
        let token = token(&signer, "ops", "token-1", exp);

        prov.authorize_revoke(Some(&token)).await.unwrap();

        let err = prov.authorize_revoke(Some(&token)).await.unwrap_err();
        assert!(matches!(err, CertgateError::Unauthorized(m) if m == "token already used"));
    }

    #[tokio::test]
    async fn test_expired_token_is_rejected() {
        let signer = JwsSigner::generate_ecdsa(EcCurve::P256).unwrap();
        let prov = provisioner(&signer);
        let token = token(&signer, "ops", "token-1", Utc::now().timestamp() - 1);

        let err = prov.authorize_revoke(Some(&token)).await.unwrap_err();
        assert!(matches!(err, CertgateError::Unauthorized(m) if m == "token expired"));
    }

    #[tokio::test]
    async fn test_token_signed_with_unrelated_key_is_rejected() {
        let signer = JwsSigner::generate_ecdsa(EcCurve::P256).unwrap();
        let other = JwsSigner::generate_ecdsa(EcCurve::P256).unwrap();
        let prov = provisioner(&signer);
        let token = token(&other, "ops", "token-1", Utc::now().timestamp() + 300);

        let err = prov.authorize_revoke(Some(&token)).await.unwrap_err();
        assert!(matches!(err, CertgateError::Unauthorized(_)));
    }

    #[tokio::test]
    async fn test_missing_token_is_rejected() {
        let signer = JwsSigner::generate_ecdsa(EcCurve::P256).unwrap();
        let prov = provisioner(&signer);
        let err = prov.authorize_revoke(None).await.unwrap_err();
        assert!(matches!(err, CertgateError::Unauthorized(_)));
    }

    #[tokio::test]
    async fn test_acme_provisioner_hook_is_a_no_op() {
        let prov = AcmeProvisioner {
            id: "acme/testprov".to_owned(),
            name: "testprov".to_owned(),
        };
        prov.authorize_revoke(None).await.unwrap();
        prov.authorize_revoke(Some("anything")).await.unwrap();
    }

    #[tokio::test]
    async fn test_registry_resolves_by_token_issuer() {
        let signer = JwsSigner::generate_ecdsa(EcCurve::P256).unwrap();
        let registry = ProvisionerRegistry::new(vec![
            Provisioner::Acme(AcmeProvisioner {
                id: "acme/testprov".to_owned(),
                name: "testprov".to_owned(),
            }),
            Provisioner::Jwk(provisioner(&signer)),
        ]);

        let token_str = token(&signer, "ops", "token-1", Utc::now().timestamp() + 300);
        let resolved = registry.lookup_by_token(&token_str).unwrap();
        assert_eq!(resolved.name(), "ops");

        let unknown = token(&signer, "nobody", "token-2", Utc::now().timestamp() + 300);
        assert!(matches!(
            registry.lookup_by_token(&unknown),
            Err(CertgateError::ProvisionerNotFound(name)) if name == "nobody"
        ));
    }
}
