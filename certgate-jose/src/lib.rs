//! JWS and JWK primitives for the ACME surface: flattened-serialization
//! envelopes (RFC 7515), key algorithm negotiation, and RFC 7638 thumbprints.

mod error;
mod jwk;
mod jws;
mod key;

pub use error::JoseError;
pub use jwk::{EcCurve, Jwk};
pub use jws::{FlattenedJws, KeyAuthorization, ProtectedHeader};
pub use key::{JwsAlgorithm, JwsSigner, VerifyingKey};
