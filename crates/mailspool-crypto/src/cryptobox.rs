//! Authenticated encryption between two keypairs.
//!
//! A [`CryptoBox`] binds a local secret key to a peer's public key. The X25519
//! shared secret is the same on both sides, so a record sealed with
//! `(sender-secret, receiver-public)` opens with `(receiver-secret, sender-public)`.
//!
//! ## Wire format
//!
//! ```text
//! +----------------+------------------------------+
//! | nonce (24)     | XChaCha20-Poly1305 output    |
//! | prefix | rand  | ciphertext || tag (16)       |
//! +----------------+------------------------------+
//! ```
//!
//! The nonce travels with the record, so opening needs no side channel.

use std::fmt;

use chacha20poly1305::{
    aead::{Aead, KeyInit},
    Key, XChaCha20Poly1305, XNonce,
};
use rand::RngCore;

use crate::error::{CryptoError, Result};
use crate::keys::{PublicKey, SecretKey};

/// Full nonce width for XChaCha20-Poly1305.
pub const NONCE_LEN: usize = 24;

/// Bytes of the nonce taken from the channel identifier.
pub const NONCE_PREFIX_LEN: usize = 8;

/// Poly1305 tag length.
pub const TAG_LEN: usize = 16;

/// Smallest valid ciphertext (empty plaintext).
pub const MIN_CIPHERTEXT_LEN: usize = NONCE_LEN + TAG_LEN;

const KEY_CONTEXT: &str = "mailspool 2024-01 box key v1";
const PREFIX_CONTEXT: &str = "mailspool 2024-01 nonce prefix v1";

/// A sealed channel between one local keypair and one peer public key.
pub struct CryptoBox {
    cipher: XChaCha20Poly1305,
    prefix: [u8; NONCE_PREFIX_LEN],
}

impl CryptoBox {
    /// Create a box for `channel` (usually the user name).
    ///
    /// The channel only feeds the nonce prefix; the key depends solely on the
    /// two keypairs.
    pub fn new(channel: &str, secret: &SecretKey, peer: &PublicKey) -> Self {
        let shared = secret.diffie_hellman(peer);
        let key = blake3::derive_key(KEY_CONTEXT, &shared);
        let cipher = XChaCha20Poly1305::new(Key::from_slice(&key));

        Self {
            cipher,
            prefix: nonce_prefix(channel),
        }
    }

    /// Seal `plaintext` under a fresh nonce.
    pub fn encrypt(&self, plaintext: &[u8]) -> Result<Vec<u8>> {
        let mut nonce = [0u8; NONCE_LEN];
        nonce[..NONCE_PREFIX_LEN].copy_from_slice(&self.prefix);
        rand::thread_rng().fill_bytes(&mut nonce[NONCE_PREFIX_LEN..]);

        let sealed = self
            .cipher
            .encrypt(XNonce::from_slice(&nonce), plaintext)
            .map_err(|_| CryptoError::Encryption)?;

        let mut out = Vec::with_capacity(NONCE_LEN + sealed.len());
        out.extend_from_slice(&nonce);
        out.extend_from_slice(&sealed);
        Ok(out)
    }

    /// Open a record produced by [`CryptoBox::encrypt`] on either end of the channel.
    pub fn decrypt(&self, ciphertext: &[u8]) -> Result<Vec<u8>> {
        if ciphertext.len() < MIN_CIPHERTEXT_LEN {
            return Err(CryptoError::Truncated {
                len: ciphertext.len(),
                min: MIN_CIPHERTEXT_LEN,
            });
        }

        let (nonce, sealed) = ciphertext.split_at(NONCE_LEN);
        self.cipher
            .decrypt(XNonce::from_slice(nonce), sealed)
            .map_err(|_| CryptoError::Authentication)
    }

    /// The nonce prefix used by this box.
    pub fn nonce_prefix(&self) -> &[u8; NONCE_PREFIX_LEN] {
        &self.prefix
    }
}

impl fmt::Debug for CryptoBox {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CryptoBox")
            .field("prefix", &hex::encode(self.prefix))
            .finish_non_exhaustive()
    }
}

fn nonce_prefix(channel: &str) -> [u8; NONCE_PREFIX_LEN] {
    let digest = blake3::derive_key(PREFIX_CONTEXT, channel.as_bytes());
    let mut prefix = [0u8; NONCE_PREFIX_LEN];
    prefix.copy_from_slice(&digest[..NONCE_PREFIX_LEN]);
    prefix
}
