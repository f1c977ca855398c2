use anyhow::anyhow;
use certgate_common::{revocation_reason, CertgateError};
use certgate_core::{
    AccountStatus, CertificateAuthority, ProvisionerHook, RevocationStore, RevokeOptions,
};
use certgate_jose::{KeyAuthorization, VerifyingKey};
use data_encoding::BASE64URL_NOPAD;
use der::Decode;
use num_bigint::BigUint;
use percent_encoding::{utf8_percent_encode, NON_ALPHANUMERIC};
use poem::http::{header, StatusCode};
use poem::web::Data;
use poem::{handler, Request, Response};
use serde::{Deserialize, Serialize};
use x509_cert::Certificate;

use crate::error::{AcmeError, AcmeErrorKind};
use crate::RevokeRequestContext;

/// Revocation request payload (RFC 8555 §7.6): base64url DER of the leaf
/// plus an optional CRL reason code.
#[derive(Debug, Serialize, Deserialize)]
pub(crate) struct RevokePayload {
    pub certificate: String,
    #[serde(rename = "reason", skip_serializing_if = "Option::is_none")]
    pub reason_code: Option<i32>,
}

/// Decimal string form of the certificate serial, the key the stores use.
pub(crate) fn serial_number(cert: &Certificate) -> String {
    BigUint::from_bytes_be(cert.tbs_certificate.serial_number.as_bytes()).to_str_radix(10)
}

/// ACME accepts reason codes 0 through 10, except the reserved 7.
pub(crate) fn validate_reason_code(reason_code: Option<i32>) -> Result<(), AcmeError> {
    if let Some(code) = reason_code {
        if !(0..=10).contains(&code) || code == 7 {
            return Err(AcmeError::new(AcmeErrorKind::BadRevocationReason)
                .with_source(anyhow!("reasonCode out of bounds")));
        }
    }
    Ok(())
}

pub(crate) fn revoke_options(
    serial: &str,
    cert: Certificate,
    reason_code: Option<i32>,
) -> RevokeOptions {
    let mut opts = RevokeOptions {
        serial: serial.to_owned(),
        crt: Some(cert),
        acme: true,
        ..Default::default()
    };
    if let Some(code) = reason_code {
        opts.reason_code = code;
        opts.reason = revocation_reason(code).to_owned();
    }
    opts
}

fn internal(message: &'static str, err: impl std::error::Error + Send + Sync + 'static) -> AcmeError {
    AcmeError::new(AcmeErrorKind::ServerInternal)
        .with_source(anyhow::Error::new(err).context(message))
}

fn no_authorization(subject: &str) -> AcmeError {
    AcmeError::new(AcmeErrorKind::Unauthorized)
        .with_detail(format!("No authorization provided for name {subject}"))
}

fn revoked_response(base_url: &str, provisioner_name: &str) -> Response {
    let link = format!(
        "<{}/acme/{}/directory>;rel=\"index\"",
        base_url.trim_end_matches('/'),
        utf8_percent_encode(provisioner_name, NON_ALPHANUMERIC),
    );
    Response::builder()
        .status(StatusCode::OK)
        .header(header::LINK, link)
        .finish()
}

/// POST /acme/{provisioner}/revoke-cert (RFC 8555 §7.6).
///
/// The revoker authenticates through one of two mutually exclusive paths,
/// chosen by the protected header: `kid` proves ownership through the
/// account that ordered the certificate, `jwk` proves possession of the
/// certificate key itself.
pub(crate) async fn revoke_cert(
    ctx: &RevokeRequestContext,
    store: &dyn RevocationStore,
    authority: &dyn CertificateAuthority,
) -> Result<Response, AcmeError> {
    let Some(jws) = ctx.jws.as_deref() else {
        return Err(AcmeError::server_internal("jws expected in request context"));
    };
    let Some(provisioner) = ctx.provisioner.as_deref() else {
        return Err(AcmeError::server_internal("provisioner does not exist"));
    };
    let Some(payload) = ctx.payload.as_deref() else {
        return Err(AcmeError::server_internal("payload does not exist"));
    };

    let payload: RevokePayload = serde_json::from_slice(payload)
        .map_err(|err| internal("error unmarshaling payload", err))?;

    let der = BASE64URL_NOPAD
        .decode(payload.certificate.as_bytes())
        .map_err(|err| {
            AcmeError::new(AcmeErrorKind::Malformed).with_source(
                anyhow::Error::new(err).context("error base64url decoding payload certificate"),
            )
        })?;
    if der.is_empty() {
        return Err(AcmeError::new(AcmeErrorKind::Malformed)
            .with_source(anyhow!("certificate to be revoked is empty")));
    }
    let cert = Certificate::from_der(&der).map_err(|err| {
        AcmeError::new(AcmeErrorKind::Malformed)
            .with_source(anyhow::Error::new(err).context("error parsing certificate"))
    })?;
    let serial = serial_number(&cert);
    let subject = cert.tbs_certificate.subject.to_string();

    let record = store
        .get_certificate_by_serial(&serial)
        .await
        .map_err(|err| internal("error retrieving certificate by serial", err))?;
    let Some(record) = record else {
        return Err(AcmeError::new(AcmeErrorKind::Malformed)
            .with_status(StatusCode::NOT_FOUND)
            .with_detail("No such certificate")
            .with_source(anyhow!("certificate with serial {serial} not found")));
    };

    let header = jws.protected_header().map_err(|err| {
        AcmeError::new(AcmeErrorKind::Malformed)
            .with_source(anyhow::Error::new(err).context("error parsing protected header"))
    })?;

    let mut mtls = false;
    let mut token = None;
    match &header.key {
        KeyAuthorization::KeyId(kid) => {
            let Some(account) = &ctx.account else {
                return Err(AcmeError::new(AcmeErrorKind::AccountDoesNotExist)
                    .with_source(anyhow!("account not in context")));
            };
            if account.status != AccountStatus::Valid {
                return Err(no_authorization(&subject)
                    .with_source(anyhow!("account '{}' has status '{:?}'", account.id, account.status)));
            }
            if account.id != record.account_id {
                return Err(no_authorization(&subject).with_source(anyhow!(
                    "account '{}' does not own certificate with serial {serial}",
                    account.id
                )));
            }
            token = Some(kid.as_str());
        }
        KeyAuthorization::Jwk(_) => {
            // Proof of possession: the envelope must verify with the key of
            // the certificate being revoked, not the embedded one.
            let verified = VerifyingKey::from_certificate(&cert)
                .and_then(|key| jws.verify(&key))
                .is_ok();
            if !verified {
                return Err(no_authorization(&subject)
                    .with_source(anyhow!("verification of jws using certificate public key failed")));
            }
            mtls = true;
        }
    }

    validate_reason_code(payload.reason_code)?;

    match authority.is_revoked(&serial).await {
        Ok(false) => {}
        Ok(true) => return Err(AcmeError::new(AcmeErrorKind::AlreadyRevoked)),
        Err(err) => return Err(internal("error retrieving revocation status", err)),
    }

    provisioner
        .authorize_revoke(token)
        .await
        .map_err(|err| internal("error authorizing revocation on provisioner", err))?;

    let Some(base_url) = ctx.base_url.as_deref() else {
        return Err(AcmeError::server_internal("baseURL expected in request context"));
    };

    let mut opts = revoke_options(&serial, cert, payload.reason_code);
    opts.mtls = mtls;
    opts.provisioner_id = Some(provisioner.id().to_owned());

    if let Err(err) = authority.revoke(opts).await {
        return Err(match err {
            CertgateError::AlreadyRevoked(_) => {
                AcmeError::new(AcmeErrorKind::AlreadyRevoked).with_detail(err.to_string())
            }
            err => internal("error revoking certificate", err),
        });
    }

    Ok(revoked_response(base_url, provisioner.name()))
}

#[handler]
pub async fn revoke_cert_endpoint(
    req: &Request,
    services: Data<&certgate_core::Services>,
) -> Result<Response, AcmeError> {
    let ctx = req
        .data::<RevokeRequestContext>()
        .cloned()
        .unwrap_or_default();
    revoke_cert(&ctx, &*services.store, &*services.authority).await
}
