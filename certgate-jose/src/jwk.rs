use aws_lc_rs::digest;
use data_encoding::BASE64URL_NOPAD;
use serde::{Deserialize, Serialize};

use crate::JoseError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EcCurve {
    #[serde(rename = "P-256")]
    P256,
    #[serde(rename = "P-384")]
    P384,
    #[serde(rename = "P-521")]
    P521,
}

impl EcCurve {
    pub fn name(self) -> &'static str {
        match self {
            EcCurve::P256 => "P-256",
            EcCurve::P384 => "P-384",
            EcCurve::P521 => "P-521",
        }
    }

    /// Field element width in bytes: ceil(curve bits / 8).
    pub fn field_len(self) -> usize {
        match self {
            EcCurve::P256 => 32,
            EcCurve::P384 => 48,
            EcCurve::P521 => 66,
        }
    }
}

/// Public JSON Web Key (RFC 7517), restricted to the key types the CA
/// accepts. `kid` and jwk are mutually exclusive in the envelope, so this
/// type only ever carries the embedded-key form.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kty")]
pub enum Jwk {
    #[serde(rename = "EC")]
    Ec { crv: EcCurve, x: String, y: String },
    #[serde(rename = "RSA")]
    Rsa { n: String, e: String },
}

// Field order matters: RFC 7638 §3.3 mandates the lexicographic member
// order used for the thumbprint digest input.
#[derive(Serialize)]
struct EcThumbprint<'a> {
    crv: &'a str,
    kty: &'a str,
    x: &'a str,
    y: &'a str,
}

#[derive(Serialize)]
struct RsaThumbprint<'a> {
    e: &'a str,
    kty: &'a str,
    n: &'a str,
}

impl Jwk {
    /// RFC 7638 JWK thumbprint: SHA-256 over the canonical JSON form,
    /// base64url without padding.
    pub fn thumbprint(&self) -> Result<String, JoseError> {
        let canonical = match self {
            Jwk::Ec { crv, x, y } => serde_json::to_string(&EcThumbprint {
                crv: crv.name(),
                kty: "EC",
                x,
                y,
            })?,
            Jwk::Rsa { n, e } => serde_json::to_string(&RsaThumbprint { e, kty: "RSA", n })?,
        };
        let digest = digest::digest(&digest::SHA256, canonical.as_bytes());
        Ok(BASE64URL_NOPAD.encode(digest.as_ref()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_thumbprint_is_field_order_independent() {
        let a: Jwk = serde_json::from_str(
            r#"{"kty":"EC","crv":"P-256","x":"MKBCTNIcKUSDii11ySs3526iDZ8AiTo7Tu6KPAqv7D4","y":"4Etl6SRW2YiLUrN5vfvVHuhp7x8PxltmWWlbbM4IFyM"}"#,
        )
        .unwrap();
        let b: Jwk = serde_json::from_str(
            r#"{"y":"4Etl6SRW2YiLUrN5vfvVHuhp7x8PxltmWWlbbM4IFyM","x":"MKBCTNIcKUSDii11ySs3526iDZ8AiTo7Tu6KPAqv7D4","crv":"P-256","kty":"EC"}"#,
        )
        .unwrap();
        assert_eq!(a, b);
        assert_eq!(a.thumbprint().unwrap(), b.thumbprint().unwrap());
    }

    #[test]
    fn test_thumbprint_ignores_extra_members() {
        let bare: Jwk = serde_json::from_str(
            r#"{"kty":"EC","crv":"P-256","x":"MKBCTNIcKUSDii11ySs3526iDZ8AiTo7Tu6KPAqv7D4","y":"4Etl6SRW2YiLUrN5vfvVHuhp7x8PxltmWWlbbM4IFyM"}"#,
        )
        .unwrap();
        let annotated: Jwk = serde_json::from_str(
            r#"{"kty":"EC","crv":"P-256","use":"sig","alg":"ES256","x":"MKBCTNIcKUSDii11ySs3526iDZ8AiTo7Tu6KPAqv7D4","y":"4Etl6SRW2YiLUrN5vfvVHuhp7x8PxltmWWlbbM4IFyM"}"#,
        )
        .unwrap();
        assert_eq!(
            bare.thumbprint().unwrap(),
            annotated.thumbprint().unwrap()
        );
    }

    #[test]
    fn test_rsa_thumbprint_canonical_order() {
        // RFC 7638 §3.1 example key; the expected thumbprint is the one from
        // the RFC.
        let jwk: Jwk = serde_json::from_str(
            r#"{"kty":"RSA","e":"AQAB","n":"0vx7agoebGcQSuuPiLJXZptN9nndrQmbXEps2aiAFbWhM78LhWx4cbbfAAtVT86zwu1RK7aPFFxuhDR1L6tSoc_BJECPebWKRXjBZCiFV4n3oknjhMstn64tZ_2W-5JsGY4Hc5n9yBXArwl93lqt7_RN5w6Cf0h4QyQ5v-65YGjQR0_FDW2QvzqY368QQMicAtaSqzs8KJZgnYb9c7d0zgdAZHzu6qMQvRL5hajrn1n91CbOpbISD08qNLyrdkt-bFTWhAI4vMQFh6WeZu0fM4lFd2NcRwr3XPksINHaQ-G_xBniIqbw0Ls1jF44-csFCur-kEgU8awapJzKnqDKgw"}"#,
        )
        .unwrap();
        assert_eq!(
            jwk.thumbprint().unwrap(),
            "NzbLsXh8uDCcd-6MNwXF4W_7noWXFZAfHkxZsRGC9Xs"
        );
    }
}
