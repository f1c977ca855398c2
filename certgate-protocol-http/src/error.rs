use std::fmt;

use poem::error::ResponseError;
use poem::http::StatusCode;
use poem::{Body, Response};
use serde::Serialize;
use tracing::*;

/// ACME error taxonomy (RFC 8555 §6.7). The variant maps directly to the
/// `type` member of the problem document.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AcmeErrorKind {
    AccountDoesNotExist,
    AlreadyRevoked,
    BadRevocationReason,
    Malformed,
    Unauthorized,
    ServerInternal,
}

impl AcmeErrorKind {
    pub fn urn(self) -> &'static str {
        match self {
            AcmeErrorKind::AccountDoesNotExist => "urn:ietf:params:acme:error:accountDoesNotExist",
            AcmeErrorKind::AlreadyRevoked => "urn:ietf:params:acme:error:alreadyRevoked",
            AcmeErrorKind::BadRevocationReason => "urn:ietf:params:acme:error:badRevocationReason",
            AcmeErrorKind::Malformed => "urn:ietf:params:acme:error:malformed",
            AcmeErrorKind::Unauthorized => "urn:ietf:params:acme:error:unauthorized",
            AcmeErrorKind::ServerInternal => "urn:ietf:params:acme:error:serverInternal",
        }
    }

    fn status(self) -> StatusCode {
        match self {
            AcmeErrorKind::AccountDoesNotExist
            | AcmeErrorKind::AlreadyRevoked
            | AcmeErrorKind::BadRevocationReason
            | AcmeErrorKind::Malformed => StatusCode::BAD_REQUEST,
            AcmeErrorKind::Unauthorized => StatusCode::FORBIDDEN,
            AcmeErrorKind::ServerInternal => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn default_detail(self) -> &'static str {
        match self {
            AcmeErrorKind::AccountDoesNotExist => "Account does not exist",
            AcmeErrorKind::AlreadyRevoked => "Certificate already revoked",
            AcmeErrorKind::BadRevocationReason => {
                "The revocation reason provided is not allowed by the server"
            }
            AcmeErrorKind::Malformed => "The request message was malformed",
            AcmeErrorKind::Unauthorized => "The client lacks sufficient authorization",
            AcmeErrorKind::ServerInternal => "The server experienced an internal error",
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Identifier {
    #[serde(rename = "type")]
    pub kind: String,
    pub value: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct Subproblem {
    #[serde(rename = "type")]
    pub kind: String,
    pub detail: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub identifier: Option<Identifier>,
}

/// An error destined for the client as `application/problem+json`. The
/// inner cause is kept for the log line only; clients see the taxonomy
/// detail.
#[derive(Debug)]
pub struct AcmeError {
    kind: AcmeErrorKind,
    detail: String,
    status: StatusCode,
    identifier: Option<Identifier>,
    subproblems: Vec<Subproblem>,
    source: Option<anyhow::Error>,
}

#[derive(Serialize)]
struct ProblemDocument<'a> {
    #[serde(rename = "type")]
    kind: &'a str,
    detail: &'a str,
    status: u16,
    #[serde(skip_serializing_if = "Option::is_none")]
    identifier: Option<&'a Identifier>,
    #[serde(skip_serializing_if = "Option::is_none")]
    subproblems: Option<&'a [Subproblem]>,
}

impl AcmeError {
    pub fn new(kind: AcmeErrorKind) -> Self {
        AcmeError {
            kind,
            detail: kind.default_detail().to_owned(),
            status: kind.status(),
            identifier: None,
            subproblems: vec![],
            source: None,
        }
    }

    /// 500 with the generic client-facing detail; `message` only reaches
    /// the logs.
    pub fn server_internal(message: impl Into<String>) -> Self {
        Self::new(AcmeErrorKind::ServerInternal).with_source(anyhow::anyhow!(message.into()))
    }

    pub fn kind(&self) -> AcmeErrorKind {
        self.kind
    }

    pub fn with_detail(mut self, detail: impl Into<String>) -> Self {
        self.detail = detail.into();
        self
    }

    pub fn with_status(mut self, status: StatusCode) -> Self {
        self.status = status;
        self
    }

    pub fn with_source(mut self, source: impl Into<anyhow::Error>) -> Self {
        self.source = Some(source.into());
        self
    }
}

impl fmt::Display for AcmeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.kind.urn(), self.detail)
    }
}

impl std::error::Error for AcmeError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.source.as_ref().map(|err| err.as_ref() as _)
    }
}

impl ResponseError for AcmeError {
    fn status(&self) -> StatusCode {
        self.status
    }

    fn as_response(&self) -> Response {
        if let Some(source) = &self.source {
            warn!(kind = self.kind.urn(), error = ?source, "ACME request failed");
        }
        let document = ProblemDocument {
            kind: self.kind.urn(),
            detail: &self.detail,
            status: self.status.as_u16(),
            identifier: self.identifier.as_ref(),
            subproblems: (!self.subproblems.is_empty()).then_some(&self.subproblems[..]),
        };
        let body = serde_json::to_vec(&document).unwrap_or_default();
        Response::builder()
            .status(self.status)
            .content_type("application/problem+json")
            .body(Body::from_vec(body))
    }
}
