// Copyright (c) Hetu Project
// SPDX-License-Identifier: Apache-2.0

//! KEM and signature boundary.
//!
//! Generation needs two things from the outside world: a fresh shared
//! secret (KEM encapsulation) and a signature over the published root.
//! Both sit behind [`KemSignatureService`] so a post-quantum provider can be
//! plugged in. [`LocalEd25519Kem`] is the in-process stand-in used by hosts
//! and tests; it signs with Ed25519 and derives its "shared secret" from the
//! signing key, which satisfies the encapsulate/decapsulate contract but
//! offers no key-encapsulation security.

use ed25519_dalek::{Signature, Signer, SigningKey, Verifier};
use hkdf::Hkdf;
use rand::rngs::OsRng;
use rand::RngCore;
use sha2::Sha256;
use std::fmt;
use zeroize::{Zeroize, Zeroizing};

use crate::error::{KeyError, KeyResult};

const KEM_INFO: &[u8] = b"squid-kem-v1";
const CIPHERTEXT_LENGTH: usize = 32;
const SHARED_SECRET_LENGTH: usize = 32;

/// Result of one encapsulation.
pub struct KemOutput {
    pub ciphertext: Vec<u8>,
    pub shared_secret: Zeroizing<Vec<u8>>,
}

impl fmt::Debug for KemOutput {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KemOutput")
            .field("ciphertext", &hex::encode(&self.ciphertext))
            .field("shared_secret", &"<redacted>")
            .finish()
    }
}

/// Key encapsulation plus detached signatures.
///
/// Signatures cross this boundary hex encoded.
pub trait KemSignatureService: Send + Sync {
    /// Scheme label recorded alongside issued roots.
    fn scheme(&self) -> &str;

    fn encapsulate(&self) -> KeyResult<KemOutput>;

    fn decapsulate(&self, ciphertext: &[u8]) -> KeyResult<Zeroizing<Vec<u8>>>;

    fn sign(&self, message: &[u8]) -> KeyResult<String>;

    /// `Ok(false)` for a well-formed but wrong signature.
    fn verify(&self, message: &[u8], signature: &str) -> KeyResult<bool>;
}

/// Ed25519 signer with an HKDF-based stand-in KEM.
///
/// The private key is zeroized on drop.
#[derive(Zeroize)]
#[zeroize(drop)]
pub struct LocalEd25519Kem {
    secret_bytes: [u8; 32],
}

impl LocalEd25519Kem {
    pub fn generate() -> Self {
        let signing_key = SigningKey::generate(&mut OsRng);
        Self::from_bytes(&signing_key.to_bytes())
    }

    pub fn from_bytes(secret: &[u8; 32]) -> Self {
        Self {
            secret_bytes: *secret,
        }
    }

    /// Hex encoded Ed25519 verifying key.
    pub fn public_key_hex(&self) -> String {
        hex::encode(self.signing_key().verifying_key().to_bytes())
    }

    fn signing_key(&self) -> SigningKey {
        SigningKey::from_bytes(&self.secret_bytes)
    }

    fn shared_secret_for(&self, ciphertext: &[u8]) -> KeyResult<Zeroizing<Vec<u8>>> {
        let mut okm = Zeroizing::new(vec![0u8; SHARED_SECRET_LENGTH]);
        Hkdf::<Sha256>::new(Some(ciphertext), &self.secret_bytes)
            .expand(KEM_INFO, &mut okm)
            .map_err(|e| KeyError::Structural(format!("KEM expand failed: {}", e)))?;
        Ok(okm)
    }
}

impl fmt::Debug for LocalEd25519Kem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LocalEd25519Kem")
            .field("public_key", &self.public_key_hex())
            .finish()
    }
}

impl KemSignatureService for LocalEd25519Kem {
    fn scheme(&self) -> &str {
        "ed25519+hkdf-kem"
    }

    fn encapsulate(&self) -> KeyResult<KemOutput> {
        let mut ciphertext = vec![0u8; CIPHERTEXT_LENGTH];
        OsRng.fill_bytes(&mut ciphertext);
        let shared_secret = self.shared_secret_for(&ciphertext)?;
        Ok(KemOutput {
            ciphertext,
            shared_secret,
        })
    }

    fn decapsulate(&self, ciphertext: &[u8]) -> KeyResult<Zeroizing<Vec<u8>>> {
        if ciphertext.len() != CIPHERTEXT_LENGTH {
            return Err(KeyError::Decoding(format!(
                "ciphertext must be {} bytes, got {}",
                CIPHERTEXT_LENGTH,
                ciphertext.len()
            )));
        }
        self.shared_secret_for(ciphertext)
    }

    fn sign(&self, message: &[u8]) -> KeyResult<String> {
        let signature: Signature = self.signing_key().sign(message);
        Ok(hex::encode(signature.to_bytes()))
    }

    fn verify(&self, message: &[u8], signature: &str) -> KeyResult<bool> {
        let bytes = hex::decode(signature)
            .map_err(|e| KeyError::Decoding(format!("signature is not hex: {}", e)))?;
        let signature = match Signature::from_slice(&bytes) {
            Ok(sig) => sig,
            Err(_) => {
                tracing::debug!(len = bytes.len(), "Rejected malformed signature");
                return Ok(false);
            }
        };
        Ok(self
            .signing_key()
            .verifying_key()
            .verify(message, &signature)
            .is_ok())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encapsulate_decapsulate() {
        let kem = LocalEd25519Kem::generate();
        let out = kem.encapsulate().unwrap();

        assert_eq!(out.ciphertext.len(), CIPHERTEXT_LENGTH);
        assert_eq!(out.shared_secret.len(), SHARED_SECRET_LENGTH);
        assert_eq!(*kem.decapsulate(&out.ciphertext).unwrap(), *out.shared_secret);

        let second = kem.encapsulate().unwrap();
        assert_ne!(out.ciphertext, second.ciphertext);
        assert_ne!(*out.shared_secret, *second.shared_secret);

        assert!(matches!(kem.decapsulate(&[1, 2, 3]), Err(KeyError::Decoding(_))));
    }

    #[test]
    fn test_sign_verify() {
        let kem = LocalEd25519Kem::from_bytes(&[7u8; 32]);
        let sig = kem.sign(b"root||seed||model").unwrap();

        assert_eq!(sig.len(), 128);
        assert!(kem.verify(b"root||seed||model", &sig).unwrap());
        assert!(!kem.verify(b"root||seed||other", &sig).unwrap());
        assert!(!kem.verify(b"root||seed||model", "abcd").unwrap());
        assert!(kem.verify(b"root||seed||model", "not hex").is_err());

        let other = LocalEd25519Kem::from_bytes(&[8u8; 32]);
        assert!(!other.verify(b"root||seed||model", &sig).unwrap());
    }

    #[test]
    fn test_debug_redacts_secret() {
        let kem = LocalEd25519Kem::generate();
        let out = kem.encapsulate().unwrap();
        let rendered = format!("{:?} {:?}", kem, out);
        assert!(rendered.contains("<redacted>"));
        assert!(!rendered.contains(&hex::encode(&*out.shared_secret)));
    }
}
