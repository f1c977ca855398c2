use std::sync::Arc;

use async_trait::async_trait;
use certgate_common::{revocation_reason, CertgateError};
use chrono::Utc;
use tracing::*;
use x509_cert::Certificate;

use crate::{ProvisionerRegistry, RevocationRecord, RevocationStore};

/// Everything a revocation needs, collected by the calling surface. `ott`
/// and `crt` are the two authentication paths: a one-time provisioner token,
/// or possession of the certificate itself.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RevokeOptions {
    pub serial: String,
    pub reason_code: i32,
    pub reason: String,
    pub crt: Option<Certificate>,
    pub ott: Option<String>,
    pub passive_only: bool,
    pub mtls: bool,
    pub acme: bool,
    pub provisioner_id: Option<String>,
}

/// The authority-side seam the revocation surfaces call into.
#[async_trait]
pub trait CertificateAuthority: Send + Sync {
    async fn is_revoked(&self, serial: &str) -> Result<bool, CertgateError>;

    /// Commits a passive revocation. Concurrent attempts on one serial
    /// resolve to a single winner; the loser gets
    /// [`CertgateError::AlreadyRevoked`].
    async fn revoke(&self, opts: RevokeOptions) -> Result<(), CertgateError>;
}

pub struct Authority {
    store: Arc<dyn RevocationStore>,
    provisioners: Arc<ProvisionerRegistry>,
}

impl Authority {
    pub fn new(store: Arc<dyn RevocationStore>, provisioners: Arc<ProvisionerRegistry>) -> Self {
        Authority {
            store,
            provisioners,
        }
    }
}

#[async_trait]
impl CertificateAuthority for Authority {
    async fn is_revoked(&self, serial: &str) -> Result<bool, CertgateError> {
        self.store.is_revoked(serial).await
    }

    async fn revoke(&self, opts: RevokeOptions) -> Result<(), CertgateError> {
        // A token means the API is used via a provisioner; without one the
        // certificate is revoking itself, so the caller must have proven
        // possession of it.
        let provisioner_id = match &opts.ott {
            Some(ott) => {
                let provisioner = self.provisioners.lookup_by_token(ott)?;
                provisioner.authorize_revoke(Some(ott)).await?;
                provisioner.id().to_owned()
            }
            None => {
                if opts.crt.is_none() {
                    return Err(CertgateError::Unauthorized(
                        "revocation requires a one-time token or the certificate itself"
                            .to_owned(),
                    ));
                }
                opts.provisioner_id.clone().unwrap_or_default()
            }
        };

        if self.store.is_revoked(&opts.serial).await? {
            return Err(CertgateError::AlreadyRevoked(opts.serial));
        }

        let reason = if opts.reason.is_empty() {
            revocation_reason(opts.reason_code).to_owned()
        } else {
            opts.reason.clone()
        };

        self.store
            .put_revocation(RevocationRecord {
                serial: opts.serial.clone(),
                reason_code: opts.reason_code,
                reason: reason.clone(),
                revoked_at: Utc::now(),
                provisioner_id: provisioner_id.clone(),
                mtls: opts.mtls,
                passive_only: opts.passive_only,
            })
            .await?;

        info!(
            serial = %opts.serial,
            reason_code = opts.reason_code,
            reason = %reason,
            passive_only = opts.passive_only,
            mtls = opts.mtls,
            provisioner = %provisioner_id,
            "Certificate revoked"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use certgate_jose::{EcCurve, JwsSigner};
    use der::Decode;

    use super::*;
    use crate::{AcmeProvisioner, CertificateRecord, JwkProvisioner, MemoryRevocationStore, Provisioner};

    fn test_certificate() -> Certificate {
        let key_pair = rcgen::KeyPair::generate_for(&rcgen::PKCS_ECDSA_P256_SHA256).unwrap();
        let mut params = rcgen::CertificateParams::new(vec![]).unwrap();
        let mut dn = rcgen::DistinguishedName::new();
        dn.push(rcgen::DnType::CommonName, "Test Revoke Certificate");
        params.distinguished_name = dn;
        let cert = params.self_signed(&key_pair).unwrap();
        Certificate::from_der(cert.der()).unwrap()
    }

    fn authority_with(
        store: Arc<MemoryRevocationStore>,
        provisioners: Vec<Provisioner>,
    ) -> Authority {
        Authority::new(store, Arc::new(ProvisionerRegistry::new(provisioners)))
    }

    fn acme_opts(serial: &str, reason_code: i32, reason: &str) -> RevokeOptions {
        RevokeOptions {
            serial: serial.to_owned(),
            reason_code,
            reason: reason.to_owned(),
            crt: Some(test_certificate()),
            acme: true,
            provisioner_id: Some("acme/testprov".to_owned()),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_revoke_derives_reason_text() {
        let store = Arc::new(MemoryRevocationStore::new());
        store
            .add_certificate(CertificateRecord::new("1234", "accountID"))
            .await;
        let authority = authority_with(store.clone(), vec![]);

        authority.revoke(acme_opts("1234", 1, "")).await.unwrap();

        assert!(authority.is_revoked("1234").await.unwrap());
        assert!(store.is_revoked("1234").await.unwrap());
    }

    #[tokio::test]
    async fn test_revoke_twice_reports_already_revoked() {
        let store = Arc::new(MemoryRevocationStore::new());
        let authority = authority_with(store, vec![]);

        authority.revoke(acme_opts("1234", 0, "")).await.unwrap();
        let err = authority.revoke(acme_opts("1234", 0, "")).await.unwrap_err();
        assert_eq!(
            err.to_string(),
            "certificate with serial number '1234' is already revoked"
        );
    }

    #[tokio::test]
    async fn test_concurrent_revocations_have_one_winner() {
        let store = Arc::new(MemoryRevocationStore::new());
        let authority = Arc::new(authority_with(store, vec![]));

        let (a, b) = tokio::join!(
            authority.revoke(acme_opts("1234", 0, "")),
            authority.revoke(acme_opts("1234", 0, ""))
        );

        let outcomes = [a, b];
        assert_eq!(outcomes.iter().filter(|r| r.is_ok()).count(), 1);
        assert_eq!(
            outcomes
                .iter()
                .filter(|r| matches!(r, Err(CertgateError::AlreadyRevoked(_))))
                .count(),
            1
        );
    }

    #[tokio::test]
    async fn test_revoke_without_token_or_certificate_is_rejected() {
        let store = Arc::new(MemoryRevocationStore::new());
        let authority = authority_with(store, vec![]);

        let err = authority
            .revoke(RevokeOptions {
                serial: "1234".to_owned(),
                ..Default::default()
            })
            .await
            .unwrap_err();
        assert!(matches!(err, CertgateError::Unauthorized(_)));
    }

    #[tokio::test]
    async fn test_revoke_with_one_time_token() {
        let signer = JwsSigner::generate_ecdsa(EcCurve::P256).unwrap();
        let store = Arc::new(MemoryRevocationStore::new());
        let authority = authority_with(
            store.clone(),
            vec![
                Provisioner::Acme(AcmeProvisioner {
                    id: "acme/testprov".to_owned(),
                    name: "testprov".to_owned(),
                }),
                Provisioner::Jwk(JwkProvisioner::new(
                    "jwk/ops",
                    "ops",
                    signer.public_jwk().unwrap(),
                )),
            ],
        );

        let exp = Utc::now().timestamp() + 300;
        let claims = format!(r#"{{"iss":"ops","jti":"token-1","exp":{exp}}}"#);
        let token = signer
            .encode(claims.as_bytes(), None, None, "https://ca.example.com/1.0/revoke")
            .unwrap()
            .compact();

        authority
            .revoke(RevokeOptions {
                serial: "1234".to_owned(),
                ott: Some(token.clone()),
                passive_only: true,
                ..Default::default()
            })
            .await
            .unwrap();
        assert!(store.is_revoked("1234").await.unwrap());

        // The token is consumed by the successful revocation.
        let err = authority
            .revoke(RevokeOptions {
                serial: "5678".to_owned(),
                ott: Some(token),
                passive_only: true,
                ..Default::default()
            })
            .await
            .unwrap_err();
        assert!(matches!(err, CertgateError::Unauthorized(_)));
    }
}
