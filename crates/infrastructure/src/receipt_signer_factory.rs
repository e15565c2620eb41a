use std::sync::Arc;

use guardrail_application::ReceiptSigner;
use guardrail_core::{AppError, AppResult};
use tracing::info;

use crate::ed25519_receipt_signer::Ed25519Signer;
use crate::hmac_receipt_signer::HmacSigner;

/// Receipt signing key material as read from configuration.
#[derive(Debug, Clone, Default)]
pub struct SigningSettings {
    /// Base64 Ed25519 private key; preferred when present.
    pub ed25519_private_key: Option<String>,
    /// Base64 HMAC secret.
    pub hmac_secret: Option<String>,
    /// Key id carried in every signature.
    pub key_id: String,
}

/// Builds the receipt signer: Ed25519 when a private key is configured, else HMAC.
///
/// Missing key material is a configuration error; there is no fallback secret.
pub fn build_receipt_signer(settings: &SigningSettings) -> AppResult<Arc<dyn ReceiptSigner>> {
    let key_id = settings.key_id.trim();
    if key_id.is_empty() {
        return Err(AppError::Configuration(
            "purge signing key id must not be empty".to_owned(),
        ));
    }

    if let Some(private_key) = non_blank(settings.ed25519_private_key.as_deref()) {
        let signer = Ed25519Signer::from_base64(private_key, key_id)?;
        info!(
            kid = key_id,
            public_key = %signer.public_key_base64(),
            "purge receipts signed with ed25519"
        );
        return Ok(Arc::new(signer));
    }

    if let Some(secret) = non_blank(settings.hmac_secret.as_deref()) {
        let signer = HmacSigner::from_base64(secret, key_id)?;
        info!(kid = key_id, "purge receipts signed with hmac-sha256");
        return Ok(Arc::new(signer));
    }

    Err(AppError::Configuration(
        "no purge signing key configured; set PURGE_ED25519_PRIV or PURGE_SIGNING_SECRET"
            .to_owned(),
    ))
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.filter(|value| !value.trim().is_empty())
}

#[cfg(test)]
mod tests {
    use base64::Engine;
    use base64::engine::general_purpose::STANDARD;
    use guardrail_core::AppError;
    use guardrail_domain::SignatureAlgorithm;

    use super::{SigningSettings, build_receipt_signer};

    fn settings(ed25519: Option<String>, hmac: Option<&str>) -> SigningSettings {
        SigningSettings {
            ed25519_private_key: ed25519,
            hmac_secret: hmac.map(ToOwned::to_owned),
            key_id: "default".to_owned(),
        }
    }

    #[test]
    fn ed25519_is_preferred_over_hmac() {
        let seed = STANDARD.encode([9_u8; 32]);
        let signer = build_receipt_signer(&settings(Some(seed), Some("c2VjcmV0")));

        assert!(signer.is_ok_and(|signer| signer.algorithm() == SignatureAlgorithm::Ed25519));
    }

    #[test]
    fn hmac_is_used_without_ed25519_key() {
        let signer = build_receipt_signer(&settings(Some("  ".to_owned()), Some("c2VjcmV0")));

        assert!(signer.is_ok_and(|signer| {
            signer.algorithm() == SignatureAlgorithm::HmacSha256 && signer.key_id() == "default"
        }));
    }

    #[test]
    fn missing_key_material_is_a_configuration_error() {
        let result = build_receipt_signer(&settings(None, None));

        assert!(matches!(result, Err(AppError::Configuration(_))));
    }

    #[test]
    fn invalid_key_material_is_a_configuration_error() {
        let result = build_receipt_signer(&settings(Some("@@@".to_owned()), None));

        assert!(matches!(result, Err(AppError::Configuration(_))));
    }
}
