//! HMAC key loading from the `push.hmacKey.secretKeyMultibase` config value.

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use hmac::{Hmac, Mac};
use sha2::Sha256;

use crate::error::DomainError;

/// Multikey header identifying an AES-256 symmetric secret. The only
/// header this crate recognizes; the key material is used as an
/// HMAC-SHA-256 key, not for encryption.
const AES_256_MULTIKEY_HEADER: [u8; 2] = [0xA2, 0x01];

const SECRET_LEN: usize = 32;

/// A process-wide symmetric secret used to sign and verify push tokens.
///
/// Loaded once at startup from a multibase-`u` (base64url) encoded
/// multikey blob and immutable afterward.
pub struct HmacKey {
    secret: [u8; SECRET_LEN],
}

impl std::fmt::Debug for HmacKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HmacKey").field("secret", &"<redacted>").finish()
    }
}

impl HmacKey {
    /// Decode a multibase-`u` multikey blob into an `HmacKey`.
    ///
    /// The blob must start with `u` (multibase base64url marker), decode
    /// to bytes whose first two bytes are the `0xA2 0x01` (AES-256)
    /// multikey header, followed by exactly 32 bytes of secret material.
    ///
    /// # Errors
    ///
    /// - [`DomainError::NotSupported`] if the multibase prefix is missing
    ///   or the multikey header is not `0xA2 0x01`.
    /// - [`DomainError::Data`] if the decoded byte length doesn't match
    ///   what the header declares.
    ///
    /// Error messages never echo the rejected bytes: a misconfigured
    /// secret must not leak its prefix.
    pub fn from_multibase(encoded: &str) -> Result<Self, DomainError> {
        let rest = encoded
            .strip_prefix('u')
            .ok_or_else(|| DomainError::NotSupported("expected multibase-u encoding".into()))?;

        let bytes = URL_SAFE_NO_PAD
            .decode(rest)
            .map_err(|_| DomainError::Data("malformed base64url".into()))?;

        if bytes.len() < 2 {
            return Err(DomainError::Data("key material too short".into()));
        }
        let (header, material) = bytes.split_at(2);
        if header != AES_256_MULTIKEY_HEADER {
            return Err(DomainError::NotSupported("unrecognized multikey header".into()));
        }
        if material.len() != SECRET_LEN {
            return Err(DomainError::Data("key length does not match declared type".into()));
        }

        let mut secret = [0u8; SECRET_LEN];
        secret.copy_from_slice(material);
        Ok(Self { secret })
    }

    /// Resolve the process-wide key from `push.hmacKey` settings.
    ///
    /// Returns `Ok(None)` (push disabled) when `settings` is absent,
    /// logging the disablement per spec §6 ("Push notification is
    /// disabled.").
    ///
    /// # Errors
    ///
    /// Propagates [`DomainError::NotSupported`] / [`DomainError::Data`]
    /// from [`Self::from_multibase`] if the configured key is malformed.
    pub fn from_settings(
        settings: Option<&crate::config::HmacKeySettings>,
    ) -> Result<Option<Self>, DomainError> {
        match settings {
            None => {
                tracing::info!("Push notification is disabled.");
                Ok(None)
            }
            Some(cfg) => Self::from_multibase(&cfg.secret_key_multibase).map(Some),
        }
    }

    pub(crate) fn mac(&self) -> Hmac<Sha256> {
        // A 32-byte key is always accepted by HMAC-SHA-256.
        #[allow(clippy::expect_used)]
        Hmac::<Sha256>::new_from_slice(&self.secret).expect("32-byte key is always valid")
    }

    /// Sign `message`, returning the raw HMAC-SHA-256 digest.
    pub(crate) fn sign(&self, message: &[u8]) -> Vec<u8> {
        let mut mac = self.mac();
        mac.update(message);
        mac.finalize().into_bytes().to_vec()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn encode_key(header: [u8; 2], secret: &[u8]) -> String {
        let mut bytes = header.to_vec();
        bytes.extend_from_slice(secret);
        format!("u{}", URL_SAFE_NO_PAD.encode(bytes))
    }

    #[test]
    fn decodes_valid_aes256_multikey() {
        let secret = [7u8; 32];
        let encoded = encode_key(AES_256_MULTIKEY_HEADER, &secret);
        let key = HmacKey::from_multibase(&encoded).expect("should decode");
        assert_eq!(key.secret, secret);
    }

    #[test]
    fn rejects_missing_multibase_prefix() {
        let secret = [7u8; 32];
        let mut bytes = AES_256_MULTIKEY_HEADER.to_vec();
        bytes.extend_from_slice(&secret);
        let encoded = URL_SAFE_NO_PAD.encode(bytes); // no leading 'u'
        assert!(matches!(
            HmacKey::from_multibase(&encoded),
            Err(DomainError::NotSupported(_))
        ));
    }

    #[test]
    fn rejects_unknown_multikey_header() {
        let encoded = encode_key([0xFF, 0xFF], &[0u8; 32]);
        assert!(matches!(
            HmacKey::from_multibase(&encoded),
            Err(DomainError::NotSupported(_))
        ));
    }

    #[test]
    fn rejects_wrong_key_length() {
        let encoded = encode_key(AES_256_MULTIKEY_HEADER, &[0u8; 16]);
        assert!(matches!(
            HmacKey::from_multibase(&encoded),
            Err(DomainError::Data(_))
        ));
    }

    #[test]
    fn from_settings_none_disables_push() {
        assert!(HmacKey::from_settings(None).unwrap().is_none());
    }

    #[test]
    fn from_settings_some_decodes_configured_key() {
        let secret = [5u8; 32];
        let encoded = encode_key(AES_256_MULTIKEY_HEADER, &secret);
        let settings = crate::config::HmacKeySettings {
            id: "key-1".into(),
            secret_key_multibase: encoded,
        };
        let key = HmacKey::from_settings(Some(&settings)).unwrap().unwrap();
        assert_eq!(key.secret, secret);
    }

    #[test]
    fn error_messages_do_not_echo_bytes() {
        let encoded = encode_key([0xFF, 0xFF], &[0u8; 32]);
        let err = HmacKey::from_multibase(&encoded).unwrap_err();
        assert!(!err.to_string().contains("255"));
        assert!(!err.to_string().contains("ff"));
    }
}
