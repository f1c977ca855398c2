use std::sync::Arc;

use anyhow::anyhow;
use certgate_core::{AccountStore, ProvisionerHook, Services};
use certgate_jose::{FlattenedJws, KeyAuthorization, VerifyingKey};
use percent_encoding::percent_decode_str;
use poem::web::{Data, FromRequest};
use poem::{Endpoint, Middleware, Request};

use crate::error::{AcmeError, AcmeErrorKind};
use crate::RevokeRequestContext;

/// Parses and authenticates the JWS envelope and leaves a
/// [`RevokeRequestContext`] in the request data for the handlers
/// downstream. Nonce bookkeeping is handled before this point.
pub struct JwsMiddleware;

pub struct JwsMiddlewareEndpoint<E: Endpoint> {
    inner: E,
}

impl<E: Endpoint> Middleware<E> for JwsMiddleware {
    type Output = JwsMiddlewareEndpoint<E>;

    fn transform(&self, inner: E) -> Self::Output {
        JwsMiddlewareEndpoint { inner }
    }
}

impl<E: Endpoint> Endpoint for JwsMiddlewareEndpoint<E> {
    type Output = E::Output;

    async fn call(&self, mut req: Request) -> poem::Result<Self::Output> {
        let services = <Data<&Services>>::from_request_without_body(&req).await?.0.clone();
        let body = req.take_body().into_vec().await?;
        let context = assemble_context(&req, &body, &services).await?;
        req.set_data(context);
        self.inner.call(req).await
    }
}

fn malformed(err: certgate_jose::JoseError, message: &'static str) -> AcmeError {
    AcmeError::new(AcmeErrorKind::Malformed).with_source(anyhow::Error::new(err).context(message))
}

/// The provisioner name is the second segment of
/// `/acme/{provisioner}/revoke-cert`.
fn provisioner_name(req: &Request) -> Option<String> {
    let segment = req.uri().path().trim_start_matches('/').split('/').nth(1)?;
    Some(percent_decode_str(segment).decode_utf8_lossy().into_owned())
}

async fn assemble_context(
    req: &Request,
    body: &[u8],
    services: &Services,
) -> Result<RevokeRequestContext, AcmeError> {
    let mut context = RevokeRequestContext::default();

    let base_url = {
        let config = services.config.lock().await;
        config.external_url.trim_end_matches('/').to_owned()
    };

    if let Some(name) = provisioner_name(req) {
        if let Some(provisioner) = services.provisioners.lookup(&name) {
            let provisioner: Arc<dyn ProvisionerHook> = provisioner;
            context.provisioner = Some(provisioner);
        }
    }

    let jws = FlattenedJws::parse(body)
        .map_err(|err| malformed(err, "error parsing flattened JWS body"))?;
    let header = jws
        .protected_header()
        .map_err(|err| malformed(err, "error parsing protected header"))?;

    let expected_url = format!("{}{}", base_url, req.original_uri().path());
    if header.url != expected_url {
        return Err(AcmeError::new(AcmeErrorKind::Malformed).with_source(anyhow!(
            "url header '{}' does not match the request URL '{expected_url}'",
            header.url
        )));
    }

    match &header.key {
        KeyAuthorization::KeyId(kid) => {
            // The account's registered key must verify the envelope; the
            // ownership decision stays with the handler.
            let account = services
                .accounts
                .get_account_by_key_id(kid)
                .await
                .map_err(|err| {
                    AcmeError::new(AcmeErrorKind::ServerInternal).with_source(
                        anyhow::Error::new(err).context("error retrieving account by key id"),
                    )
                })?;
            if let Some(account) = account {
                let key = VerifyingKey::from_jwk(&account.key).map_err(|err| {
                    AcmeError::new(AcmeErrorKind::ServerInternal).with_source(
                        anyhow::Error::new(err).context("error loading account public key"),
                    )
                })?;
                jws.verify(&key).map_err(|_| {
                    AcmeError::new(AcmeErrorKind::Unauthorized)
                        .with_source(anyhow!("verification of jws using account public key failed"))
                })?;
                context.account = Some(account);
            }
        }
        KeyAuthorization::Jwk(jwk) => {
            // Envelope self-consistency; possession of the certificate key
            // is checked against the stored leaf by the handler.
            let key = VerifyingKey::from_jwk(jwk)
                .map_err(|err| malformed(err, "error loading embedded jwk"))?;
            jws.verify(&key).map_err(|_| {
                AcmeError::new(AcmeErrorKind::Unauthorized)
                    .with_source(anyhow!("verification of jws using embedded jwk failed"))
            })?;
        }
    }

    context.payload = Some(Arc::new(
        jws.payload()
            .map_err(|err| malformed(err, "error decoding payload"))?,
    ));
    context.jws = Some(Arc::new(jws));
    context.base_url = Some(base_url);
    Ok(context)
}
