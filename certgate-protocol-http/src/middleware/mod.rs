mod jws;

pub use jws::JwsMiddleware;
