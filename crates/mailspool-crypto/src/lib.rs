//! # Mailspool Crypto
//!
//! Authenticated public-key encryption for spool records.
//!
//! ## Overview
//!
//! Every command written to a user's spool is sealed in a [`CryptoBox`]
//! between the client keypair and the server keypair, so the storage service
//! only ever sees ciphertext.
//!
//! ## Encryption Model
//!
//! 1. **Key agreement**: X25519 between the local secret and the peer public key
//! 2. **Key derivation**: BLAKE3 `derive_key` over the shared secret
//! 3. **Sealing**: XChaCha20-Poly1305 with a 24-byte nonce built from an
//!    8-byte channel prefix and 16 random bytes
//!
//! ## Usage
//!
//! ```rust
//! use mailspool_crypto::{CryptoBox, KeyPair};
//!
//! let client = KeyPair::generate();
//! let server = KeyPair::generate();
//!
//! let outbound = CryptoBox::new("alice", server.secret(), &client.public_key());
//! let inbound = CryptoBox::new("alice", client.secret(), &server.public_key());
//!
//! let sealed = outbound.encrypt(b"command bytes").unwrap();
//! assert_eq!(inbound.decrypt(&sealed).unwrap(), b"command bytes");
//! ```

pub mod cryptobox;
pub mod error;
pub mod keys;

pub use cryptobox::{CryptoBox, MIN_CIPHERTEXT_LEN, NONCE_LEN, NONCE_PREFIX_LEN, TAG_LEN};
pub use error::{CryptoError, Result};
pub use keys::{KeyPair, PublicKey, SecretKey, KEY_LEN};
