use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use ed25519_dalek::{Signature, Signer as _, SigningKey, VerifyingKey};
use guardrail_application::ReceiptSigner;
use guardrail_core::{AppError, AppResult};
use guardrail_domain::{PurgeReceipt, ReceiptSignature, SignatureAlgorithm};

/// Ed25519 receipt signer.
pub struct Ed25519Signer {
    signing_key: SigningKey,
    verifying_key: VerifyingKey,
    key_id: String,
}

impl Ed25519Signer {
    /// Creates a signer from a 32-byte seed.
    #[must_use]
    pub fn from_seed(seed: &[u8; 32], key_id: impl Into<String>) -> Self {
        let signing_key = SigningKey::from_bytes(seed);
        let verifying_key = signing_key.verifying_key();

        Self {
            signing_key,
            verifying_key,
            key_id: key_id.into(),
        }
    }

    /// Creates a signer from a base64 private key.
    ///
    /// Accepts a 32-byte seed or a 64-byte seed-plus-public-key pair; the pair
    /// must be internally consistent.
    pub fn from_base64(private_key: &str, key_id: impl Into<String>) -> AppResult<Self> {
        let bytes = STANDARD.decode(private_key.trim()).map_err(|error| {
            AppError::Configuration(format!("ed25519 private key is not valid base64: {error}"))
        })?;

        if let Ok(seed) = <[u8; 32]>::try_from(bytes.as_slice()) {
            return Ok(Self::from_seed(&seed, key_id));
        }

        let keypair = <[u8; 64]>::try_from(bytes.as_slice()).map_err(|_| {
            AppError::Configuration(format!(
                "ed25519 private key must be 32 or 64 bytes, got {}",
                bytes.len()
            ))
        })?;
        let signing_key = SigningKey::from_keypair_bytes(&keypair).map_err(|error| {
            AppError::Configuration(format!("invalid ed25519 keypair: {error}"))
        })?;

        Ok(Self {
            verifying_key: signing_key.verifying_key(),
            signing_key,
            key_id: key_id.into(),
        })
    }

    /// Returns the base64 public key for publishing to receipt verifiers.
    #[must_use]
    pub fn public_key_base64(&self) -> String {
        STANDARD.encode(self.verifying_key.to_bytes())
    }
}

impl ReceiptSigner for Ed25519Signer {
    fn algorithm(&self) -> SignatureAlgorithm {
        SignatureAlgorithm::Ed25519
    }

    fn key_id(&self) -> &str {
        self.key_id.as_str()
    }

    fn sign(&self, receipt: &PurgeReceipt) -> AppResult<ReceiptSignature> {
        let signature = self.signing_key.sign(&receipt.signing_input()?);

        Ok(ReceiptSignature {
            alg: SignatureAlgorithm::Ed25519,
            kid: self.key_id.clone(),
            sig: STANDARD.encode(signature.to_bytes()),
        })
    }

    fn verify(&self, receipt: &PurgeReceipt, signature: &ReceiptSignature) -> bool {
        if signature.alg != SignatureAlgorithm::Ed25519 || signature.kid != self.key_id {
            return false;
        }

        let Some(bytes) = STANDARD
            .decode(signature.sig.as_bytes())
            .ok()
            .and_then(|bytes| <[u8; 64]>::try_from(bytes.as_slice()).ok())
        else {
            return false;
        };
        let Ok(input) = receipt.signing_input() else {
            return false;
        };

        self.verifying_key
            .verify_strict(&input, &Signature::from_bytes(&bytes))
            .is_ok()
    }
}
