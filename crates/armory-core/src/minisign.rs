//! Minisign public keys and signatures.
//!
//! Only verification is implemented. A public key is the base64 of
//! `"Ed" || key_id[8] || ed25519_pk[32]`. A signature file has four lines:
//!
//! ```text
//! untrusted comment: <free text>
//! base64("Ed"|"ED" || key_id[8] || sig[64])
//! trusted comment: <free text>
//! base64(global_sig[64])
//! ```
//!
//! The global signature covers `sig || trusted_comment`, which is what makes
//! the trusted comment safe to use as package metadata. With the `ED`
//! algorithm the message is BLAKE2b-512 prehashed before signing.

use std::fmt;
use std::str::FromStr;

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use blake2::{Blake2b512, Digest};
use ed25519_dalek::{Verifier, VerifyingKey};

use crate::error::FetchError;

const UNTRUSTED_PREFIX: &str = "untrusted comment:";
const TRUSTED_PREFIX: &str = "trusted comment:";

/// Signature algorithm tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Algorithm {
    /// `Ed`: the message itself is signed.
    PureEd25519,
    /// `ED`: the BLAKE2b-512 digest of the message is signed.
    HashedEd25519,
}

/// A minisign public key.
#[derive(Clone, PartialEq, Eq)]
pub struct PublicKey {
    key_id: [u8; 8],
    key: VerifyingKey,
}

impl fmt::Debug for PublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PublicKey")
            .field("key_id", &key_id_hex(self.key_id))
            .finish_non_exhaustive()
    }
}

impl PublicKey {
    /// Parse a key from its text form, with or without the comment line.
    ///
    /// # Errors
    ///
    /// Returns [`FetchError::InvalidPublicKey`] for bad base64, wrong length,
    /// an unknown algorithm tag, or an invalid curve point.
    pub fn parse(text: &str) -> Result<Self, FetchError> {
        let encoded = text
            .lines()
            .map(str::trim)
            .rfind(|l| !l.is_empty() && !l.starts_with(UNTRUSTED_PREFIX))
            .ok_or_else(|| FetchError::InvalidPublicKey("empty key".to_string()))?;

        let raw = STANDARD
            .decode(encoded)
            .map_err(|e| FetchError::InvalidPublicKey(e.to_string()))?;
        if raw.len() != 42 {
            return Err(FetchError::InvalidPublicKey(format!(
                "expected 42 bytes, got {}",
                raw.len()
            )));
        }
        if &raw[..2] != b"Ed" {
            return Err(FetchError::InvalidPublicKey(
                "unsupported key algorithm".to_string(),
            ));
        }

        let mut key_id = [0u8; 8];
        key_id.copy_from_slice(&raw[2..10]);
        let mut key_bytes = [0u8; 32];
        key_bytes.copy_from_slice(&raw[10..42]);
        let key = VerifyingKey::from_bytes(&key_bytes)
            .map_err(|e| FetchError::InvalidPublicKey(e.to_string()))?;

        Ok(Self { key_id, key })
    }

    /// Key ID as minisign prints it.
    pub fn key_id(&self) -> String {
        key_id_hex(self.key_id)
    }
}

impl FromStr for PublicKey {
    type Err = FetchError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

/// A parsed minisign signature.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Signature {
    /// Unauthenticated comment line
    pub untrusted_comment: String,
    algorithm: Algorithm,
    key_id: [u8; 8],
    signature: [u8; 64],
    trusted_comment: String,
    global_signature: [u8; 64],
}

impl Signature {
    /// Parse a signature file. Trailing NUL padding and CRLF line endings
    /// are tolerated.
    ///
    /// # Errors
    ///
    /// Returns [`FetchError::Signature`] if the file is not a well-formed
    /// minisign signature.
    pub fn parse(raw: &[u8]) -> Result<Self, FetchError> {
        let end = raw.iter().rposition(|b| *b != 0).map_or(0, |i| i + 1);
        let text = std::str::from_utf8(&raw[..end])
            .map_err(|_| malformed("signature is not valid UTF-8"))?;

        let mut lines = text.lines().map(|l| l.trim_end_matches('\r'));
        let untrusted = lines.next().unwrap_or_default();
        let sig_line = lines.next().unwrap_or_default().trim();
        let trusted = lines.next().unwrap_or_default();
        let global_line = lines.next().unwrap_or_default().trim();

        let untrusted_comment = untrusted
            .strip_prefix(UNTRUSTED_PREFIX)
            .ok_or_else(|| malformed("missing untrusted comment"))?
            .trim()
            .to_string();
        let trusted_comment = trusted
            .strip_prefix(TRUSTED_PREFIX)
            .ok_or_else(|| malformed("missing trusted comment"))?
            .trim_start()
            .to_string();

        let sig_raw = STANDARD
            .decode(sig_line)
            .map_err(|e| malformed(&e.to_string()))?;
        if sig_raw.len() != 74 {
            return Err(malformed("signature has the wrong length"));
        }
        let algorithm = match &sig_raw[..2] {
            b"Ed" => Algorithm::PureEd25519,
            b"ED" => Algorithm::HashedEd25519,
            _ => return Err(malformed("unsupported signature algorithm")),
        };
        let mut key_id = [0u8; 8];
        key_id.copy_from_slice(&sig_raw[2..10]);
        let mut signature = [0u8; 64];
        signature.copy_from_slice(&sig_raw[10..74]);

        let global_raw = STANDARD
            .decode(global_line)
            .map_err(|e| malformed(&e.to_string()))?;
        let global_signature: [u8; 64] = global_raw
            .as_slice()
            .try_into()
            .map_err(|_| malformed("global signature has the wrong length"))?;

        Ok(Self {
            untrusted_comment,
            algorithm,
            key_id,
            signature,
            trusted_comment,
            global_signature,
        })
    }

    /// Authenticated comment text. Only meaningful after [`Self::verify_comment`].
    pub fn trusted_comment(&self) -> &str {
        &self.trusted_comment
    }

    /// The signature file text, in the layout [`Self::parse`] reads.
    pub fn to_text(&self) -> String {
        let tag: &[u8; 2] = match self.algorithm {
            Algorithm::PureEd25519 => b"Ed",
            Algorithm::HashedEd25519 => b"ED",
        };
        let mut sig_raw = Vec::with_capacity(74);
        sig_raw.extend_from_slice(tag);
        sig_raw.extend_from_slice(&self.key_id);
        sig_raw.extend_from_slice(&self.signature);
        format!(
            "{UNTRUSTED_PREFIX} {}\n{}\n{TRUSTED_PREFIX} {}\n{}\n",
            self.untrusted_comment,
            STANDARD.encode(sig_raw),
            self.trusted_comment,
            STANDARD.encode(self.global_signature)
        )
    }

    /// Signature algorithm.
    pub fn algorithm(&self) -> Algorithm {
        self.algorithm
    }

    /// Key ID of the signer as minisign prints it.
    pub fn key_id(&self) -> String {
        key_id_hex(self.key_id)
    }

    /// Check the global signature over the trusted comment.
    ///
    /// # Errors
    ///
    /// Returns [`FetchError::Signature`] on key mismatch or a bad signature.
    pub fn verify_comment(&self, key: &PublicKey) -> Result<(), FetchError> {
        self.check_key(key)?;
        let mut global_message = Vec::with_capacity(64 + self.trusted_comment.len());
        global_message.extend_from_slice(&self.signature);
        global_message.extend_from_slice(self.trusted_comment.as_bytes());
        let global = ed25519_dalek::Signature::from_bytes(&self.global_signature);
        key.key
            .verify(&global_message, &global)
            .map_err(|_| FetchError::Signature("invalid trusted comment signature".to_string()))
    }

    /// Verify `message` and the trusted comment.
    ///
    /// # Errors
    ///
    /// Returns [`FetchError::Signature`] on key mismatch or a bad signature.
    pub fn verify(&self, key: &PublicKey, message: &[u8]) -> Result<(), FetchError> {
        self.check_key(key)?;
        let sig = ed25519_dalek::Signature::from_bytes(&self.signature);
        let outcome = match self.algorithm {
            Algorithm::PureEd25519 => key.key.verify(message, &sig),
            Algorithm::HashedEd25519 => key.key.verify(&Blake2b512::digest(message), &sig),
        };
        outcome.map_err(|_| FetchError::Signature("invalid signature".to_string()))?;
        self.verify_comment(key)
    }

    fn check_key(&self, key: &PublicKey) -> Result<(), FetchError> {
        if self.key_id == key.key_id {
            Ok(())
        } else {
            Err(FetchError::Signature(format!(
                "signed by key {} but expected key {}",
                self.key_id(),
                key.key_id()
            )))
        }
    }
}

fn malformed(msg: &str) -> FetchError {
    FetchError::Signature(format!("malformed signature: {msg}"))
}

fn key_id_hex(key_id: [u8; 8]) -> String {
    format!("{:016X}", u64::from_le_bytes(key_id))
}


#[cfg(test)]
mod tests {
    use super::testing::{public_key_text, sign, signing_key};
    use super::*;

    #[test]
    fn test_verify_roundtrip() {
        let key = signing_key(7);
        let pk = PublicKey::parse(&public_key_text(&key)).unwrap();
        let text = sign(&key, b"payload", "timestamp:1 file:payload");

        let sig = Signature::parse(text.as_bytes()).unwrap();
        assert_eq!(sig.algorithm(), Algorithm::HashedEd25519);
        assert_eq!(sig.trusted_comment(), "timestamp:1 file:payload");
        sig.verify(&pk, b"payload").unwrap();
    }

    #[test]
    fn test_tampered_message_fails() {
        let key = signing_key(7);
        let pk = PublicKey::parse(&public_key_text(&key)).unwrap();
        let sig = Signature::parse(sign(&key, b"payload", "c").as_bytes()).unwrap();

        let err = sig.verify(&pk, b"payl0ad").unwrap_err();
        assert!(err.is_signature());
    }

    #[test]
    fn test_tampered_trusted_comment_fails() {
        let key = signing_key(7);
        let pk = PublicKey::parse(&public_key_text(&key)).unwrap();
        let text = sign(&key, b"payload", "original").replace("original", "forged");

        let sig = Signature::parse(text.as_bytes()).unwrap();
        assert!(sig.verify_comment(&pk).is_err());
    }

    #[test]
    fn test_wrong_key_fails() {
        let signer = signing_key(7);
        let other = PublicKey::parse(&public_key_text(&signing_key(9))).unwrap();
        let sig = Signature::parse(sign(&signer, b"payload", "c").as_bytes()).unwrap();
        assert!(sig.verify(&other, b"payload").is_err());
    }

    #[test]
    fn test_nul_padding_and_crlf_tolerated() {
        let key = signing_key(7);
        let mut raw = sign(&key, b"payload", "c").replace('\n', "\r\n").into_bytes();
        raw.extend_from_slice(&[0, 0, 0]);

        let sig = Signature::parse(&raw).unwrap();
        assert_eq!(sig.trusted_comment(), "c");
    }

    #[test]
    fn test_written_signature_still_verifies() {
        let key = signing_key(7);
        let pk = PublicKey::parse(&public_key_text(&key)).unwrap();
        let sig = Signature::parse(sign(&key, b"payload", "c").as_bytes()).unwrap();

        let reread = Signature::parse(sig.to_text().as_bytes()).unwrap();
        assert_eq!(reread, sig);
        reread.verify(&pk, b"payload").unwrap();
    }

    #[test]
    fn test_missing_trusted_comment_rejected() {
        let raw = b"untrusted comment: x\nAAAA\n\n";
        assert!(Signature::parse(raw).is_err());
    }

    #[test]
    fn test_public_key_with_comment_line() {
        let key = signing_key(7);
        let text = format!(
            "untrusted comment: minisign public key\n{}\n",
            public_key_text(&key)
        );
        let pk: PublicKey = text.parse().unwrap();
        assert_eq!(pk.key_id(), "0807060504030201");
    }

    #[test]
    fn test_bad_public_key() {
        assert!(PublicKey::parse("not base64!").is_err());
        assert!(PublicKey::parse("").is_err());
        assert!(PublicKey::parse("AAAA").is_err());
    }
}
