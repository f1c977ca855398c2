use std::sync::Arc;

use certgate_core::{Account, ProvisionerHook};
use certgate_jose::FlattenedJws;

/// The request environment the JWS middleware assembles for the revocation
/// handler: parsed envelope, decoded payload, resolved provisioner, the
/// account when the envelope referenced one by `kid`, and the external base
/// URL. Everything is optional so the handler can report missing values
/// itself.
#[derive(Clone, Default)]
pub struct RevokeRequestContext {
    pub jws: Option<Arc<FlattenedJws>>,
    pub payload: Option<Arc<Vec<u8>>>,
    pub provisioner: Option<Arc<dyn ProvisionerHook>>,
    pub account: Option<Account>,
    pub base_url: Option<String>,
}
