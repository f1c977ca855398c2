/// CRL reason codes (RFC 5280 §5.3.1). Code 7 is reserved and unused.
pub mod reason_code {
    pub const UNSPECIFIED: i32 = 0;
    pub const KEY_COMPROMISE: i32 = 1;
    pub const CA_COMPROMISE: i32 = 2;
    pub const AFFILIATION_CHANGED: i32 = 3;
    pub const SUPERSEDED: i32 = 4;
    pub const CESSATION_OF_OPERATION: i32 = 5;
    pub const CERTIFICATE_HOLD: i32 = 6;
    pub const REMOVE_FROM_CRL: i32 = 8;
    pub const PRIVILEGE_WITHDRAWN: i32 = 9;
    pub const AA_COMPROMISE: i32 = 10;
}

/// Human-readable description for a CRL reason code. Unknown codes map to
/// "unspecified reason", same as code 0.
pub fn revocation_reason(code: i32) -> &'static str {
    match code {
        reason_code::KEY_COMPROMISE => "key compromised",
        reason_code::CA_COMPROMISE => "ca compromised",
        reason_code::AFFILIATION_CHANGED => "affiliation changed",
        reason_code::SUPERSEDED => "superseded",
        reason_code::CESSATION_OF_OPERATION => "cessation of operation",
        reason_code::CERTIFICATE_HOLD => "certificate hold",
        reason_code::REMOVE_FROM_CRL => "remove from crl",
        reason_code::PRIVILEGE_WITHDRAWN => "privilege withdrawn",
        reason_code::AA_COMPROMISE => "aa compromised",
        _ => "unspecified reason",
    }
}
