use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use guardrail_application::ReceiptSigner;
use guardrail_core::{AppError, AppResult};
use guardrail_domain::{PurgeReceipt, ReceiptSignature, SignatureAlgorithm};
use hmac::{Hmac, Mac};
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

/// HMAC-SHA256 receipt signer over a shared secret.
#[derive(Clone)]
pub struct HmacSigner {
    mac: HmacSha256,
    key_id: String,
}

impl HmacSigner {
    /// Creates a signer from raw secret bytes.
    pub fn new(secret: &[u8], key_id: impl Into<String>) -> AppResult<Self> {
        if secret.is_empty() {
            return Err(AppError::Configuration(
                "purge signing secret must not be empty".to_owned(),
            ));
        }

        let mac = HmacSha256::new_from_slice(secret).map_err(|error| {
            AppError::Configuration(format!("invalid purge signing secret: {error}"))
        })?;

        Ok(Self {
            mac,
            key_id: key_id.into(),
        })
    }

    /// Creates a signer from a base64-encoded secret.
    pub fn from_base64(secret: &str, key_id: impl Into<String>) -> AppResult<Self> {
        let secret = STANDARD.decode(secret.trim()).map_err(|error| {
            AppError::Configuration(format!("purge signing secret is not valid base64: {error}"))
        })?;

        Self::new(&secret, key_id)
    }
}

impl ReceiptSigner for HmacSigner {
    fn algorithm(&self) -> SignatureAlgorithm {
        SignatureAlgorithm::HmacSha256
    }

    fn key_id(&self) -> &str {
        self.key_id.as_str()
    }

    fn sign(&self, receipt: &PurgeReceipt) -> AppResult<ReceiptSignature> {
        let mut mac = self.mac.clone();
        mac.update(&receipt.signing_input()?);

        Ok(ReceiptSignature {
            alg: SignatureAlgorithm::HmacSha256,
            kid: self.key_id.clone(),
            sig: STANDARD.encode(mac.finalize().into_bytes()),
        })
    }

    fn verify(&self, receipt: &PurgeReceipt, signature: &ReceiptSignature) -> bool {
        if signature.alg != SignatureAlgorithm::HmacSha256 || signature.kid != self.key_id {
            return false;
        }

        let Ok(expected) = STANDARD.decode(signature.sig.as_bytes()) else {
            return false;
        };
        let Ok(input) = receipt.signing_input() else {
            return false;
        };

        let mut mac = self.mac.clone();
        mac.update(&input);
        // Constant-time comparison.
        mac.verify_slice(&expected).is_ok()
    }
}
