// SPDX-License-Identifier: MIT OR Apache-2.0

//! Public keys and signature verification.
//!
//! Key type and signature method names are kept as raw strings on the wire
//! model and normalized here, so an unrecognized algorithm surfaces as a
//! security error instead of a parse failure.

use crate::error::{self, Result};
use crate::schema::spki;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use serde::Deserialize;

/// A public key entry from a root document's `keys` table.
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct Key {
    /// The key's type, e.g. `rsa` or `ed25519` (case-insensitive).
    pub keytype: String,
    /// The key material.
    pub keyval: KeyVal,
}

/// The value part of a [`Key`].
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct KeyVal {
    /// The public key: PEM text for RSA keys, a hex or base64 point for
    /// Ed25519 keys.
    pub public: String,
}

/// A signature method named by a signature's `method` field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum SignatureMethod {
    /// RSASSA-PSS with SHA-256.
    RsassaPss,
    /// Ed25519.
    Ed25519,
}

impl SignatureMethod {
    /// Parses a method name case-insensitively; `None` for anything this
    /// crate cannot verify.
    pub(crate) fn parse(method: &str) -> Option<Self> {
        match method.to_lowercase().as_str() {
            "rsassa-pss" => Some(SignatureMethod::RsassaPss),
            "ed25519" => Some(SignatureMethod::Ed25519),
            _ => None,
        }
    }

    fn name(self) -> &'static str {
        match self {
            SignatureMethod::RsassaPss => "rsassa-pss",
            SignatureMethod::Ed25519 => "ed25519",
        }
    }
}

/// A trusted public key, decoded into the form its verifier needs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum PublicKey {
    /// An RSA public key as PKCS#1 DER.
    Rsa { der: Vec<u8> },
    /// An Ed25519 point.
    Ed25519 { raw: Vec<u8> },
}

impl PublicKey {
    /// Decodes a wire [`Key`], rejecting unknown key types.
    pub(crate) fn from_key(repo: &str, keyid: &str, key: &Key) -> Result<Self> {
        match key.keytype.to_lowercase().as_str() {
            "rsa" => Ok(PublicKey::Rsa {
                der: spki::rsa_public_der(&key.keyval.public)?,
            }),
            "ed25519" => {
                let raw = hex::decode(&key.keyval.public)
                    .or_else(|_| BASE64.decode(&key.keyval.public))
                    .ok()
                    .filter(|raw| raw.len() == 32);
                match raw {
                    Some(raw) => Ok(PublicKey::Ed25519 { raw }),
                    None => error::InvalidKeyValueSnafu { repo, keyid }.fail(),
                }
            }
            _ => error::UnsupportedKeyTypeSnafu {
                repo,
                keytype: key.keytype.clone(),
                keyid,
            }
            .fail(),
        }
    }

    /// Verifies `sig` over `msg`. `Ok(false)` means the signature is
    /// cryptographically wrong; a method that cannot apply to this key
    /// type is an error, not a failed verification.
    pub(crate) fn verify(
        &self,
        repo: &str,
        method: SignatureMethod,
        msg: &[u8],
        sig: &[u8],
    ) -> Result<bool> {
        let (algorithm, key): (&'static dyn ring::signature::VerificationAlgorithm, &[u8]) =
            match (self, method) {
                (PublicKey::Rsa { der }, SignatureMethod::RsassaPss) => {
                    (&ring::signature::RSA_PSS_2048_8192_SHA256, der)
                }
                (PublicKey::Ed25519 { raw }, SignatureMethod::Ed25519) => {
                    (&ring::signature::ED25519, raw)
                }
                _ => {
                    return error::MethodMismatchSnafu {
                        repo,
                        method: method.name(),
                        keytype: self.keytype_name(),
                    }
                    .fail()
                }
            };
        Ok(ring::signature::UnparsedPublicKey::new(algorithm, key)
            .verify(msg, sig)
            .is_ok())
    }

    fn keytype_name(&self) -> &'static str {
        match self {
            PublicKey::Rsa { .. } => "rsa",
            PublicKey::Ed25519 { .. } => "ed25519",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{Key, KeyVal, PublicKey, SignatureMethod};
    use crate::error::ErrorKind;

    fn key(keytype: &str, public: &str) -> Key {
        Key {
            keytype: keytype.to_owned(),
            keyval: KeyVal {
                public: public.to_owned(),
            },
        }
    }

    #[test]
    fn method_names_are_case_insensitive() {
        assert_eq!(
            SignatureMethod::parse("ED25519"),
            Some(SignatureMethod::Ed25519)
        );
        assert_eq!(
            SignatureMethod::parse("RSASSA-PSS"),
            Some(SignatureMethod::RsassaPss)
        );
        assert_eq!(SignatureMethod::parse("ecdsa-sha2-nistp256"), None);
    }

    #[test]
    fn ed25519_values_decode_as_hex_or_base64() {
        let hex_key = key("ed25519", &"ab".repeat(32));
        assert!(PublicKey::from_key("image", "k1", &hex_key).is_ok());

        let base64_key = key("ED25519", "q6urq6urq6urq6urq6urq6urq6urq6urq6urq6urq6s=");
        assert!(PublicKey::from_key("image", "k1", &base64_key).is_ok());

        let bad = key("ed25519", "zz not a key zz");
        let error = PublicKey::from_key("image", "k1", &bad).unwrap_err();
        assert_eq!(error.kind(), ErrorKind::Security);
    }

    #[test]
    fn unknown_key_types_are_rejected() {
        let error = PublicKey::from_key("image", "k1", &key("ecdsa", "whatever")).unwrap_err();
        assert_eq!(error.kind(), ErrorKind::Security);
        assert!(error.to_string().contains("ecdsa"));
    }

    #[test]
    fn mismatched_method_is_an_error_not_a_failed_verification() {
        let ed = PublicKey::Ed25519 { raw: vec![0; 32] };
        let error = ed
            .verify("image", SignatureMethod::RsassaPss, b"msg", &[0; 64])
            .unwrap_err();
        assert_eq!(error.kind(), ErrorKind::Security);
    }

    #[test]
    fn garbage_signature_fails_closed() {
        let ed = PublicKey::Ed25519 { raw: vec![0; 32] };
        let verified = ed
            .verify("image", SignatureMethod::Ed25519, b"msg", &[0; 64])
            .unwrap();
        assert!(!verified);
    }
}
