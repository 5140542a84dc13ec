//! Webhook signature verification
//!
//! The provider signs the raw request body with HMAC-SHA256 and sends the
//! digest as `sha256=<hex>` in the `x-hub-signature-256` header. Verification
//! must run over the bytes exactly as received.

use hmac::{Hmac, Mac};
use secrecy::{ExposeSecret, SecretString};
use sha2::Sha256;

use crate::errors::DeployerError;

type HmacSha256 = Hmac<Sha256>;

/// Header carrying the body signature
pub const SIGNATURE_HEADER: &str = "x-hub-signature-256";

const SIGNATURE_PREFIX: &str = "sha256=";

/// Verifies webhook payloads against the shared secret
#[derive(Clone)]
pub struct SignatureVerifier {
    secret: SecretString,
}

impl SignatureVerifier {
    pub fn new(secret: SecretString) -> Self {
        Self { secret }
    }

    /// Check `signature` against `body`.
    ///
    /// A missing header, a header without the `sha256=` prefix, or a
    /// non-hex digest are all rejections. The digest comparison is
    /// constant time.
    pub fn verify(&self, body: &[u8], signature: Option<&str>) -> bool {
        let Some(signature) = signature else {
            return false;
        };

        let Some(digest) = signature.trim().strip_prefix(SIGNATURE_PREFIX) else {
            return false;
        };

        let Ok(expected) = hex::decode(digest) else {
            return false;
        };

        let Ok(mut mac) = HmacSha256::new_from_slice(self.secret.expose_secret().as_bytes())
        else {
            return false;
        };

        mac.update(body);
        mac.verify_slice(&expected).is_ok()
    }

    /// Authenticate a webhook request; an empty body is never authentic
    pub fn authenticate(&self, body: &[u8], signature: Option<&str>) -> Result<(), DeployerError> {
        if body.is_empty() {
            return Err(DeployerError::AuthError("empty payload".to_string()));
        }
        if signature.is_none() {
            return Err(DeployerError::AuthError(format!(
                "missing {} header",
                SIGNATURE_HEADER
            )));
        }
        if !self.verify(body, signature) {
            return Err(DeployerError::AuthError(
                "signature does not match payload".to_string(),
            ));
        }
        Ok(())
    }
}

impl std::fmt::Debug for SignatureVerifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SignatureVerifier")
            .field("secret", &"[REDACTED]")
            .finish()
    }
}

/// Compute the `sha256=<hex>` signature header value for `body`
pub fn sign(secret: &str, body: &[u8]) -> Result<String, DeployerError> {
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
        .map_err(|e| DeployerError::Internal(format!("Failed to create HMAC: {}", e)))?;
    mac.update(body);
    Ok(format!(
        "{}{}",
        SIGNATURE_PREFIX,
        hex::encode(mac.finalize().into_bytes())
    ))
}
