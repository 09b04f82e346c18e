//! Payload signing

use hmac::{Hmac, Mac};
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

/// Prefix naming the digest used in the signature header
const SCHEME_PREFIX: &str = "sha256=";

/// Header names sent with every delivery
pub mod headers {
    /// HMAC signature of the request body
    pub const SIGNATURE: &str = "X-Depot-Signature";

    /// Kind of the delivered event
    pub const EVENT: &str = "X-Depot-Event";

    /// ID shared by every attempt of one delivery
    pub const DELIVERY: &str = "X-Depot-Delivery";
}

/// HMAC-SHA256 signer keyed by a subscription secret
#[derive(Clone)]
pub struct WebhookSignature {
    secret: String,
}

impl std::fmt::Debug for WebhookSignature {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WebhookSignature")
            .field("secret", &"<redacted>")
            .finish()
    }
}

impl WebhookSignature {
    /// Create a signer with the given secret
    pub fn new(secret: impl Into<String>) -> Self {
        Self {
            secret: secret.into(),
        }
    }

    /// Signature header value: `sha256=<hex digest>`
    pub fn sign(&self, payload: &[u8]) -> String {
        format!("{}{}", SCHEME_PREFIX, hex::encode(self.digest(payload)))
    }

    /// Check a signature header value against the payload in constant time
    pub fn verify(&self, payload: &[u8], signature: &str) -> bool {
        let Some(hex_digest) = signature.trim().strip_prefix(SCHEME_PREFIX) else {
            return false;
        };
        let Ok(expected) = hex::decode(hex_digest) else {
            return false;
        };

        self.mac().chain_update(payload).verify_slice(&expected).is_ok()
    }

    fn digest(&self, payload: &[u8]) -> Vec<u8> {
        self.mac().chain_update(payload).finalize().into_bytes().to_vec()
    }

    fn mac(&self) -> HmacSha256 {
        match HmacSha256::new_from_slice(self.secret.as_bytes()) {
            Ok(mac) => mac,
            Err(_) => unreachable!("HMAC accepts keys of any length"),
        }
    }
}
