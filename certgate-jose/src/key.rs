use aws_lc_rs::rand::SystemRandom;
use aws_lc_rs::rsa::KeySize;
use aws_lc_rs::signature::{self, EcdsaKeyPair, KeyPair, RsaKeyPair, UnparsedPublicKey};
use const_oid::db::rfc5912;
use data_encoding::BASE64URL_NOPAD;
use der::asn1::{ObjectIdentifier, UintRef};
use der::{Decode, Encode};
use serde::{Deserialize, Serialize};
use x509_cert::Certificate;

use crate::{EcCurve, JoseError, Jwk};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum JwsAlgorithm {
    #[serde(rename = "ES256")]
    Es256,
    #[serde(rename = "ES384")]
    Es384,
    #[serde(rename = "ES512")]
    Es512,
    #[serde(rename = "RS256")]
    Rs256,
}

impl JwsAlgorithm {
    pub fn name(self) -> &'static str {
        match self {
            JwsAlgorithm::Es256 => "ES256",
            JwsAlgorithm::Es384 => "ES384",
            JwsAlgorithm::Es512 => "ES512",
            JwsAlgorithm::Rs256 => "RS256",
        }
    }
}

impl EcCurve {
    fn jws_algorithm(self) -> JwsAlgorithm {
        match self {
            EcCurve::P256 => JwsAlgorithm::Es256,
            EcCurve::P384 => JwsAlgorithm::Es384,
            EcCurve::P521 => JwsAlgorithm::Es512,
        }
    }

    fn fixed_signing(self) -> &'static signature::EcdsaSigningAlgorithm {
        match self {
            EcCurve::P256 => &signature::ECDSA_P256_SHA256_FIXED_SIGNING,
            EcCurve::P384 => &signature::ECDSA_P384_SHA384_FIXED_SIGNING,
            EcCurve::P521 => &signature::ECDSA_P521_SHA512_FIXED_SIGNING,
        }
    }

    fn fixed_verification(self) -> &'static signature::EcdsaVerificationAlgorithm {
        match self {
            EcCurve::P256 => &signature::ECDSA_P256_SHA256_FIXED,
            EcCurve::P384 => &signature::ECDSA_P384_SHA384_FIXED,
            EcCurve::P521 => &signature::ECDSA_P521_SHA512_FIXED,
        }
    }
}

/// A public key usable for JWS verification, with the JWS algorithm
/// negotiated from the key type.
#[derive(Debug, Clone)]
pub enum VerifyingKey {
    /// Uncompressed SEC1 point (0x04 || X || Y).
    Ec { curve: EcCurve, point: Vec<u8> },
    /// PKCS#1 `RSAPublicKey` DER.
    Rsa { pkcs1_der: Vec<u8> },
}

// JWK coordinates are left-padded to the curve's field width.
fn fixed_width(bytes: Vec<u8>, width: usize) -> Result<Vec<u8>, JoseError> {
    if bytes.len() > width {
        return Err(JoseError::Malformed("EC coordinate too long".to_owned()));
    }
    if bytes.len() == width {
        return Ok(bytes);
    }
    let mut out = vec![0u8; width - bytes.len()];
    out.extend_from_slice(&bytes);
    Ok(out)
}

impl VerifyingKey {
    pub fn algorithm(&self) -> JwsAlgorithm {
        match self {
            VerifyingKey::Ec { curve, .. } => curve.jws_algorithm(),
            VerifyingKey::Rsa { .. } => JwsAlgorithm::Rs256,
        }
    }

    pub fn from_jwk(jwk: &Jwk) -> Result<Self, JoseError> {
        match jwk {
            Jwk::Ec { crv, x, y } => {
                let width = crv.field_len();
                let x = fixed_width(BASE64URL_NOPAD.decode(x.as_bytes())?, width)?;
                let y = fixed_width(BASE64URL_NOPAD.decode(y.as_bytes())?, width)?;
                let mut point = Vec::with_capacity(1 + 2 * width);
                point.push(0x04);
                point.extend_from_slice(&x);
                point.extend_from_slice(&y);
                Ok(VerifyingKey::Ec { curve: *crv, point })
            }
            Jwk::Rsa { n, e } => {
                let n = BASE64URL_NOPAD.decode(n.as_bytes())?;
                let e = BASE64URL_NOPAD.decode(e.as_bytes())?;
                let pkcs1_der = pkcs1::RsaPublicKey {
                    modulus: UintRef::new(&n)?,
                    public_exponent: UintRef::new(&e)?,
                }
                .to_der()?;
                Ok(VerifyingKey::Rsa { pkcs1_der })
            }
        }
    }

    /// Extracts the verification key from an X.509 leaf, e.g. for
    /// proof-of-possession checks on revocation requests.
    pub fn from_certificate(cert: &Certificate) -> Result<Self, JoseError> {
        let spki = &cert.tbs_certificate.subject_public_key_info;
        let key_bytes = spki
            .subject_public_key
            .as_bytes()
            .ok_or_else(|| JoseError::Malformed("unaligned subject public key".to_owned()))?;

        if spki.algorithm.oid == rfc5912::ID_EC_PUBLIC_KEY {
            let params = spki
                .algorithm
                .parameters
                .as_ref()
                .ok_or(JoseError::UnsupportedKey)?;
            let curve_oid = params.decode_as::<ObjectIdentifier>()?;
            let curve = if curve_oid == rfc5912::SECP_256_R_1 {
                EcCurve::P256
            } else if curve_oid == rfc5912::SECP_384_R_1 {
                EcCurve::P384
            } else if curve_oid == rfc5912::SECP_521_R_1 {
                EcCurve::P521
            } else {
                return Err(JoseError::UnsupportedKey);
            };
            Ok(VerifyingKey::Ec {
                curve,
                point: key_bytes.to_vec(),
            })
        } else if spki.algorithm.oid == rfc5912::RSA_ENCRYPTION {
            Ok(VerifyingKey::Rsa {
                pkcs1_der: key_bytes.to_vec(),
            })
        } else {
            Err(JoseError::UnsupportedKey)
        }
    }

    pub fn verify(&self, message: &[u8], signature: &[u8]) -> Result<(), JoseError> {
        let result = match self {
            VerifyingKey::Ec { curve, point } => {
                UnparsedPublicKey::new(curve.fixed_verification(), point).verify(message, signature)
            }
            VerifyingKey::Rsa { pkcs1_der } => {
                UnparsedPublicKey::new(&signature::RSA_PKCS1_2048_8192_SHA256, pkcs1_der)
                    .verify(message, signature)
            }
        };
        result.map_err(|_| JoseError::Verification)
    }
}

/// A private key that signs JWS envelopes. ECDSA signatures are emitted in
/// the fixed-width R||S form RFC 7518 requires, not DER.
pub enum JwsSigner {
    Ecdsa { curve: EcCurve, key: EcdsaKeyPair },
    Rsa { key: RsaKeyPair },
}

impl JwsSigner {
    pub fn generate_ecdsa(curve: EcCurve) -> Result<Self, JoseError> {
        let document = EcdsaKeyPair::generate_pkcs8(curve.fixed_signing(), &SystemRandom::new())?;
        Self::from_pkcs8_ecdsa(curve, document.as_ref())
    }

    pub fn from_pkcs8_ecdsa(curve: EcCurve, pkcs8: &[u8]) -> Result<Self, JoseError> {
        let key = EcdsaKeyPair::from_pkcs8(curve.fixed_signing(), pkcs8)?;
        Ok(JwsSigner::Ecdsa { curve, key })
    }

    pub fn generate_rsa() -> Result<Self, JoseError> {
        let key = RsaKeyPair::generate(KeySize::Rsa2048).map_err(|_| JoseError::Crypto)?;
        Ok(JwsSigner::Rsa { key })
    }

    pub fn algorithm(&self) -> JwsAlgorithm {
        match self {
            JwsSigner::Ecdsa { curve, .. } => curve.jws_algorithm(),
            JwsSigner::Rsa { .. } => JwsAlgorithm::Rs256,
        }
    }

    /// The public half as a JWK, suitable for embedding in a protected
    /// header or registering on an account.
    pub fn public_jwk(&self) -> Result<Jwk, JoseError> {
        match self {
            JwsSigner::Ecdsa { curve, key } => {
                let point = key.public_key().as_ref();
                let width = curve.field_len();
                if point.len() != 1 + 2 * width || point[0] != 0x04 {
                    return Err(JoseError::Malformed("unexpected public key form".to_owned()));
                }
                Ok(Jwk::Ec {
                    crv: *curve,
                    x: BASE64URL_NOPAD.encode(&point[1..1 + width]),
                    y: BASE64URL_NOPAD.encode(&point[1 + width..]),
                })
            }
            JwsSigner::Rsa { key } => {
                let public = pkcs1::RsaPublicKey::from_der(key.public_key().as_ref())?;
                Ok(Jwk::Rsa {
                    n: BASE64URL_NOPAD.encode(public.modulus.as_bytes()),
                    e: BASE64URL_NOPAD.encode(public.public_exponent.as_bytes()),
                })
            }
        }
    }

    pub(crate) fn sign(&self, message: &[u8]) -> Result<Vec<u8>, JoseError> {
        match self {
            JwsSigner::Ecdsa { key, .. } => {
                let signature = key.sign(&SystemRandom::new(), message)?;
                Ok(signature.as_ref().to_vec())
            }
            JwsSigner::Rsa { key } => {
                let mut signature = vec![0u8; key.public_modulus_len()];
                key.sign(
                    &signature::RSA_PKCS1_SHA256,
                    &SystemRandom::new(),
                    message,
                    &mut signature,
                )?;
                Ok(signature)
            }
        }
    }

    pub fn public_verifying_key(&self) -> Result<VerifyingKey, JoseError> {
        VerifyingKey::from_jwk(&self.public_jwk()?)
    }
}
