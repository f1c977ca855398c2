use data_encoding::BASE64URL_NOPAD;
use serde::{Deserialize, Serialize};

use crate::{JoseError, Jwk, JwsAlgorithm, JwsSigner, VerifyingKey};

/// The signer identification carried in the protected header. RFC 8555
/// §6.2: `jwk` and `kid` are mutually exclusive, so this is a union rather
/// than a pair of optional fields.
#[derive(Debug, Clone, PartialEq)]
pub enum KeyAuthorization {
    Jwk(Jwk),
    KeyId(String),
}

/// JWS protected header (RFC 8555 §6.2). The serialized field order is
/// `alg`, `jwk`|`kid`, `nonce`, `url` and is relied upon by the on-wire
/// fixtures. Headers carrying both `jwk` and `kid`, or neither, are
/// rejected at deserialization.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(try_from = "RawProtectedHeader", into = "RawProtectedHeader")]
pub struct ProtectedHeader {
    pub alg: JwsAlgorithm,
    pub key: KeyAuthorization,
    pub nonce: Option<String>,
    pub url: String,
}

// On-wire form of the protected header. The enum cannot be flattened here:
// flattened enum deserialization takes the first matching tag and ignores a
// second one, so the mutual-exclusion check has to run over an Option pair.
#[derive(Serialize, Deserialize)]
struct RawProtectedHeader {
    alg: JwsAlgorithm,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    jwk: Option<Jwk>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    kid: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    nonce: Option<String>,
    url: String,
}

impl TryFrom<RawProtectedHeader> for ProtectedHeader {
    type Error = String;

    fn try_from(raw: RawProtectedHeader) -> Result<Self, Self::Error> {
        let key = match (raw.jwk, raw.kid) {
            (Some(jwk), None) => KeyAuthorization::Jwk(jwk),
            (None, Some(kid)) => KeyAuthorization::KeyId(kid),
            _ => return Err("exactly one of jwk and kid must be present".to_owned()),
        };
        Ok(ProtectedHeader {
            alg: raw.alg,
            key,
            nonce: raw.nonce,
            url: raw.url,
        })
    }
}

impl From<ProtectedHeader> for RawProtectedHeader {
    fn from(header: ProtectedHeader) -> Self {
        let (jwk, kid) = match header.key {
            KeyAuthorization::Jwk(jwk) => (Some(jwk), None),
            KeyAuthorization::KeyId(kid) => (None, Some(kid)),
        };
        RawProtectedHeader {
            alg: header.alg,
            jwk,
            kid,
            nonce: header.nonce,
            url: header.url,
        }
    }
}

/// Flattened JWS JSON serialization (RFC 7515 §7.2.2).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FlattenedJws {
    pub protected: String,
    pub payload: String,
    pub signature: String,
}

impl FlattenedJws {
    pub fn parse(raw: &[u8]) -> Result<Self, JoseError> {
        Ok(serde_json::from_slice(raw)?)
    }

    /// Reassembles a compact serialization (`header.payload.signature`),
    /// used for one-time provisioner tokens.
    pub fn from_compact(token: &str) -> Result<Self, JoseError> {
        let mut parts = token.split('.');
        match (parts.next(), parts.next(), parts.next(), parts.next()) {
            (Some(protected), Some(payload), Some(signature), None) => Ok(FlattenedJws {
                protected: protected.to_owned(),
                payload: payload.to_owned(),
                signature: signature.to_owned(),
            }),
            _ => Err(JoseError::Malformed(
                "expected three dot-separated segments".to_owned(),
            )),
        }
    }

    pub fn compact(&self) -> String {
        format!("{}.{}.{}", self.protected, self.payload, self.signature)
    }

    pub fn protected_header(&self) -> Result<ProtectedHeader, JoseError> {
        let raw = BASE64URL_NOPAD.decode(self.protected.as_bytes())?;
        Ok(serde_json::from_slice(&raw)?)
    }

    /// The exact bytes the signature covers.
    fn signing_input(&self) -> Vec<u8> {
        format!("{}.{}", self.protected, self.payload).into_bytes()
    }

    pub fn payload(&self) -> Result<Vec<u8>, JoseError> {
        Ok(BASE64URL_NOPAD.decode(self.payload.as_bytes())?)
    }

    /// Verifies the signature with `key` and returns the decoded payload.
    /// The header's `alg` must match what the key type negotiates to. Only
    /// `alg` is inspected here; full ACME header validation is up to the
    /// caller, so this also covers compact provisioner tokens.
    pub fn verify(&self, key: &VerifyingKey) -> Result<Vec<u8>, JoseError> {
        #[derive(Deserialize)]
        struct AlgHeader {
            alg: JwsAlgorithm,
        }
        let raw = BASE64URL_NOPAD.decode(self.protected.as_bytes())?;
        let header: AlgHeader = serde_json::from_slice(&raw)?;
        if header.alg != key.algorithm() {
            return Err(JoseError::Verification);
        }
        let signature = BASE64URL_NOPAD.decode(self.signature.as_bytes())?;
        key.verify(&self.signing_input(), &signature)?;
        self.payload()
    }
}

impl JwsSigner {
    /// Signs `payload` into a flattened JWS. With a `kid` the header
    /// references the registered account key; without one the public JWK is
    /// embedded, as revoke-cert requests authenticated by the certificate
    /// key do.
    pub fn encode(
        &self,
        payload: &[u8],
        kid: Option<&str>,
        nonce: Option<&str>,
        url: &str,
    ) -> Result<FlattenedJws, JoseError> {
        let key = match kid {
            Some(kid) => KeyAuthorization::KeyId(kid.to_owned()),
            None => KeyAuthorization::Jwk(self.public_jwk()?),
        };
        let header = ProtectedHeader {
            alg: self.algorithm(),
            key,
            nonce: nonce.map(str::to_owned),
            url: url.to_owned(),
        };
        let protected = BASE64URL_NOPAD.encode(serde_json::to_string(&header)?.as_bytes());
        let payload = BASE64URL_NOPAD.encode(payload);
        let signature = self.sign(format!("{protected}.{payload}").as_bytes())?;
        Ok(FlattenedJws {
            protected,
            payload,
            signature: BASE64URL_NOPAD.encode(&signature),
        })
    }
}
