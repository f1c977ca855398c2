mod api;
mod context;
mod error;
mod middleware;

use std::net::SocketAddr;

use anyhow::{Context, Result};
use certgate_core::Services;
pub use context::RevokeRequestContext;
pub use error::{AcmeError, AcmeErrorKind};
pub use middleware::JwsMiddleware;
use poem::listener::TcpListener;
use poem::{post, EndpointExt, Route, Server};
use poem_openapi::OpenApiService;
use tracing::*;

/// Assembles the revocation surface: the ACME revoke-cert endpoint behind
/// the JWS middleware, and the JSON SSH revocation API.
pub fn app(services: &Services) -> impl poem::Endpoint {
    let ssh_api = OpenApiService::new(
        api::SshApi,
        "Certgate CA API",
        env!("CARGO_PKG_VERSION"),
    );
    Route::new()
        .at(
            "/acme/:provisioner/revoke-cert",
            post(api::revoke_cert_endpoint).with(JwsMiddleware),
        )
        .nest("/ssh", ssh_api)
        .data(services.clone())
}

#[derive(Clone)]
pub struct HttpProtocolServer {
    services: Services,
}

impl HttpProtocolServer {
    pub async fn new(services: &Services) -> Result<Self> {
        Ok(HttpProtocolServer {
            services: services.clone(),
        })
    }

    pub async fn run(self, address: SocketAddr) -> Result<()> {
        info!(?address, "Listening");
        Server::new(TcpListener::bind(address))
            .run(app(&self.services))
            .await
            .context("Failed to start the CA API server")
    }
}
