//! The provider credential a [`TelephonyBase`](crate::TelephonyBase) carries.
//!
//! The bridge treats credentials as opaque — it neither validates nor
//! persists them, it only threads them through to the places a concrete
//! streamer needs to authenticate (e.g. a signed WebSocket URL, or a SIP
//! `From` header). Lookup, rotation and storage are a vault concern out of
//! scope here.

/// An opaque per-session provider credential.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ProviderCredential {
    pub id: String,
    pub secret: String,
}

impl ProviderCredential {
    #[must_use]
    pub fn new(id: impl Into<String>, secret: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            secret: secret.into(),
        }
    }
}
