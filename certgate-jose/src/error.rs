use aws_lc_rs::error::{KeyRejected, Unspecified};

#[derive(thiserror::Error, Debug)]
pub enum JoseError {
    #[error("unknown key type; only RSA and ECDSA are supported")]
    UnsupportedKey,
    #[error("signature verification failed")]
    Verification,
    #[error("malformed JWS: {0}")]
    Malformed(String),
    #[error("base64: {0}")]
    Decode(#[from] data_encoding::DecodeError),
    #[error("JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error("DER: {0}")]
    Der(#[from] der::Error),
    #[error("PKCS#1: {0}")]
    Pkcs1(#[from] pkcs1::Error),
    #[error("key rejected: {0}")]
    KeyRejected(String),
    #[error("crypto operation failed")]
    Crypto,
}

impl From<KeyRejected> for JoseError {
    fn from(err: KeyRejected) -> Self {
        JoseError::KeyRejected(err.to_string())
    }
}

impl From<Unspecified> for JoseError {
    fn from(_: Unspecified) -> Self {
        JoseError::Crypto
    }
}
