mod config;
mod error;
mod revocation;

pub use config::*;
pub use error::CertgateError;
pub use revocation::*;
