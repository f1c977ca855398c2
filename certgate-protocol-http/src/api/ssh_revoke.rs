use certgate_common::CertgateError;
use certgate_core::{CertificateAuthority, RevokeOptions};
use poem::web::Data;
use poem_openapi::payload::Json;
use poem_openapi::{ApiResponse, Object, OpenApi};
use tracing::*;

pub struct SshApi;

#[derive(Debug, Object)]
pub(crate) struct SshRevokeRequest {
    pub serial: String,
    /// One-time token minted by a provisioner; proves the caller may revoke
    /// this serial.
    pub ott: String,
    #[oai(rename = "reasonCode")]
    pub reason_code: i32,
    pub reason: String,
    pub passive: bool,
}

#[derive(Debug, Object)]
pub(crate) struct SshRevokeResponse {
    pub status: String,
}

#[derive(Debug, Object)]
pub(crate) struct ApiErrorBody {
    pub status: u16,
    pub message: String,
}

#[derive(ApiResponse)]
pub(crate) enum SshRevokeApiResponse {
    #[oai(status = 200)]
    Ok(Json<SshRevokeResponse>),
    #[oai(status = 400)]
    BadRequest(Json<ApiErrorBody>),
    #[oai(status = 401)]
    Unauthorized(Json<ApiErrorBody>),
    #[oai(status = 403)]
    Forbidden(Json<ApiErrorBody>),
    #[oai(status = 501)]
    NotImplemented(Json<ApiErrorBody>),
}

fn bad_request(message: &str) -> SshRevokeApiResponse {
    SshRevokeApiResponse::BadRequest(Json(ApiErrorBody {
        status: 400,
        message: message.to_owned(),
    }))
}

impl SshRevokeRequest {
    /// Only passive revocation is supported; everything else is rejected
    /// before touching the authority.
    pub(crate) fn validate(&self) -> Result<(), SshRevokeApiResponse> {
        if self.serial.is_empty() {
            return Err(bad_request("missing serial"));
        }
        if !(0..=10).contains(&self.reason_code) {
            return Err(bad_request("reasonCode out of bounds"));
        }
        if !self.passive {
            return Err(SshRevokeApiResponse::NotImplemented(Json(ApiErrorBody {
                status: 501,
                message: "non-passive revocation not implemented".to_owned(),
            })));
        }
        if self.ott.is_empty() {
            return Err(bad_request("missing ott"));
        }
        Ok(())
    }
}

pub(crate) async fn ssh_revoke(
    authority: &dyn CertificateAuthority,
    body: SshRevokeRequest,
) -> SshRevokeApiResponse {
    if let Err(response) = body.validate() {
        return response;
    }

    let opts = RevokeOptions {
        serial: body.serial.clone(),
        reason_code: body.reason_code,
        reason: body.reason.clone(),
        ott: Some(body.ott),
        passive_only: body.passive,
        ..Default::default()
    };

    match authority.revoke(opts).await {
        Ok(()) => {
            info!(
                serial = %body.serial,
                reason_code = body.reason_code,
                reason = %body.reason,
                passive_only = body.passive,
                mtls = false,
                ssh = true,
                "SSH certificate revoked"
            );
            SshRevokeApiResponse::Ok(Json(SshRevokeResponse {
                status: "ok".to_owned(),
            }))
        }
        Err(err @ (CertgateError::Unauthorized(_) | CertgateError::ProvisionerNotFound(_))) => {
            warn!(error = %err, "SSH revocation not authorized");
            SshRevokeApiResponse::Unauthorized(Json(ApiErrorBody {
                status: 401,
                message: "unauthorized".to_owned(),
            }))
        }
        Err(err) => {
            warn!(error = %err, "SSH revocation failed");
            SshRevokeApiResponse::Forbidden(Json(ApiErrorBody {
                status: 403,
                message: "error revoking ssh certificate".to_owned(),
            }))
        }
    }
}

#[OpenApi]
impl SshApi {
    #[oai(path = "/revoke", method = "post", operation_id = "sshRevoke")]
    async fn revoke(
        &self,
        services: Data<&certgate_core::Services>,
        body: Json<SshRevokeRequest>,
    ) -> SshRevokeApiResponse {
        ssh_revoke(&*services.authority, body.0).await
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use certgate_core::{
        AcmeProvisioner, Authority, JwkProvisioner, MemoryRevocationStore, Provisioner,
        ProvisionerRegistry,
    };
    use certgate_jose::{EcCurve, JwsSigner};

    use super::*;

    fn request(serial: &str, ott: &str, reason_code: i32, passive: bool) -> SshRevokeRequest {
        SshRevokeRequest {
            serial: serial.to_owned(),
            ott: ott.to_owned(),
            reason_code,
            reason: String::new(),
            passive,
        }
    }

    #[test]
    fn test_validate_missing_serial() {
        assert!(matches!(
            request("", "ott", 0, true).validate(),
            Err(SshRevokeApiResponse::BadRequest(_))
        ));
    }

    #[test]
    fn test_validate_missing_ott() {
        assert!(matches!(
            request("1234", "", 0, true).validate(),
            Err(SshRevokeApiResponse::BadRequest(_))
        ));
    }

    #[test]
    fn test_validate_reason_code_bounds() {
        assert!(matches!(
            request("1234", "ott", -1, true).validate(),
            Err(SshRevokeApiResponse::BadRequest(_))
        ));
        assert!(matches!(
            request("1234", "ott", 11, true).validate(),
            Err(SshRevokeApiResponse::BadRequest(_))
        ));
        assert!(request("1234", "ott", 10, true).validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_active_revocation() {
        assert!(matches!(
            request("1234", "ott", 0, false).validate(),
            Err(SshRevokeApiResponse::NotImplemented(_))
        ));
    }

    fn authority_with_jwk_provisioner(signer: &JwsSigner) -> Authority {
        Authority::new(
            Arc::new(MemoryRevocationStore::new()),
            Arc::new(ProvisionerRegistry::new(vec![
                Provisioner::Acme(AcmeProvisioner {
                    id: "acme/testprov".to_owned(),
                    name: "testprov".to_owned(),
                }),
                Provisioner::Jwk(JwkProvisioner::new(
                    "jwk/ops",
                    "ops",
                    signer.public_jwk().unwrap(),
                )),
            ])),
        )
    }

    fn one_time_token(signer: &JwsSigner, jti: &str) -> String {
        let exp = chrono::Utc::now().timestamp() + 300;
        let claims = format!(r#"{{"iss":"ops","jti":"{jti}","exp":{exp}}}"#);
        signer
            .encode(claims.as_bytes(), None, None, "https://ca.example.com/ssh/revoke")
            .unwrap()
            .compact()
    }

    #[tokio::test]
    async fn test_ssh_revoke_with_one_time_token() {
        let signer = JwsSigner::generate_ecdsa(EcCurve::P256).unwrap();
        let authority = authority_with_jwk_provisioner(&signer);
        let token = one_time_token(&signer, "token-1");

        let response = ssh_revoke(&authority, request("1234", &token, 1, true)).await;
        assert!(matches!(response, SshRevokeApiResponse::Ok(_)));
        assert!(authority.is_revoked("1234").await.unwrap());
    }

    #[tokio::test]
    async fn test_ssh_revoke_rejects_unknown_token() {
        let signer = JwsSigner::generate_ecdsa(EcCurve::P256).unwrap();
        let other = JwsSigner::generate_ecdsa(EcCurve::P256).unwrap();
        let authority = authority_with_jwk_provisioner(&signer);
        let token = one_time_token(&other, "token-1");

        let response = ssh_revoke(&authority, request("1234", &token, 0, true)).await;
        assert!(matches!(response, SshRevokeApiResponse::Unauthorized(_)));
        assert!(!authority.is_revoked("1234").await.unwrap());
    }

    #[tokio::test]
    async fn test_ssh_revoke_already_revoked() {
        let signer = JwsSigner::generate_ecdsa(EcCurve::P256).unwrap();
        let authority = authority_with_jwk_provisioner(&signer);

        let first = one_time_token(&signer, "token-1");
        let response = ssh_revoke(&authority, request("1234", &first, 0, true)).await;
        assert!(matches!(response, SshRevokeApiResponse::Ok(_)));

        let second = one_time_token(&signer, "token-2");
        let response = ssh_revoke(&authority, request("1234", &second, 0, true)).await;
        assert!(matches!(response, SshRevokeApiResponse::Forbidden(_)));
    }
}
