//! X25519 key material.
//!
//! Keys are raw 32-byte strings with no envelope. A keypair is generated once
//! per identity and distributed out of band as two files: the secret key and
//! the public key.

use std::fmt;
use std::fs;
use std::io::Write;
use std::path::Path;

use rand::RngCore;
use serde::{Deserialize, Serialize};
use x25519_dalek::{PublicKey as DalekPublicKey, StaticSecret};

use crate::error::{CryptoError, Result};

/// Length of both secret and public keys.
pub const KEY_LEN: usize = 32;

/// An X25519 public key (32 bytes).
#[derive(Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PublicKey(pub [u8; KEY_LEN]);

impl PublicKey {
    /// Create from raw bytes.
    pub const fn from_bytes(bytes: [u8; KEY_LEN]) -> Self {
        Self(bytes)
    }

    /// Create from a byte slice, checking the length.
    pub fn from_slice(bytes: &[u8]) -> Result<Self> {
        let arr: [u8; KEY_LEN] = bytes.try_into().map_err(|_| {
            CryptoError::InvalidKey(format!("public key must be {KEY_LEN} bytes, got {}", bytes.len()))
        })?;
        Ok(Self(arr))
    }

    /// Get the raw bytes.
    pub const fn as_bytes(&self) -> &[u8; KEY_LEN] {
        &self.0
    }

    /// Convert to hex string.
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    pub(crate) fn to_dalek(self) -> DalekPublicKey {
        DalekPublicKey::from(self.0)
    }
}

impl fmt::Debug for PublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PublicKey({})", &self.to_hex()[..16])
    }
}

impl From<DalekPublicKey> for PublicKey {
    fn from(pk: DalekPublicKey) -> Self {
        Self(*pk.as_bytes())
    }
}

/// An X25519 static secret key. Zeroized on drop.
#[derive(Clone)]
pub struct SecretKey(StaticSecret);

impl SecretKey {
    /// Generate a new random secret.
    pub fn generate() -> Self {
        let mut bytes = [0u8; KEY_LEN];
        rand::thread_rng().fill_bytes(&mut bytes);
        Self(StaticSecret::from(bytes))
    }

    /// Create from raw bytes.
    pub fn from_bytes(bytes: [u8; KEY_LEN]) -> Self {
        Self(StaticSecret::from(bytes))
    }

    /// Create from a byte slice, checking the length.
    pub fn from_slice(bytes: &[u8]) -> Result<Self> {
        let arr: [u8; KEY_LEN] = bytes.try_into().map_err(|_| {
            CryptoError::InvalidKey(format!("secret key must be {KEY_LEN} bytes, got {}", bytes.len()))
        })?;
        Ok(Self::from_bytes(arr))
    }

    /// Export the raw bytes.
    pub fn to_bytes(&self) -> [u8; KEY_LEN] {
        self.0.to_bytes()
    }

    /// Derive the public key.
    pub fn public_key(&self) -> PublicKey {
        PublicKey::from(DalekPublicKey::from(&self.0))
    }

    /// Perform key agreement with a peer's public key.
    pub(crate) fn diffie_hellman(&self, peer: &PublicKey) -> [u8; KEY_LEN] {
        *self.0.diffie_hellman(&peer.to_dalek()).as_bytes()
    }
}

impl fmt::Debug for SecretKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("SecretKey(..)")
    }
}

/// A secret key together with its public key.
#[derive(Clone)]
pub struct KeyPair {
    secret: SecretKey,
    public: PublicKey,
}

impl KeyPair {
    /// Generate a new random keypair.
    pub fn generate() -> Self {
        Self::from_secret(SecretKey::generate())
    }

    /// Build a keypair from an existing secret.
    pub fn from_secret(secret: SecretKey) -> Self {
        let public = secret.public_key();
        Self { secret, public }
    }

    /// Deterministic keypair from seed bytes.
    pub fn from_seed(seed: [u8; KEY_LEN]) -> Self {
        Self::from_secret(SecretKey::from_bytes(seed))
    }

    pub fn secret(&self) -> &SecretKey {
        &self.secret
    }

    pub fn public_key(&self) -> PublicKey {
        self.public
    }

    /// Write the raw secret and public keys to two files.
    ///
    /// The secret key file is created with mode 0600 on Unix.
    pub fn write_to(&self, secret_path: impl AsRef<Path>, public_path: impl AsRef<Path>) -> Result<()> {
        let mut options = fs::OpenOptions::new();
        options.write(true).create(true).truncate(true);
        #[cfg(unix)]
        {
            use std::os::unix::fs::OpenOptionsExt;
            options.mode(0o600);
        }
        let mut secret_file = options.open(secret_path)?;
        secret_file.write_all(&self.secret.to_bytes())?;
        secret_file.sync_all()?;

        fs::write(public_path, self.public.as_bytes())?;
        Ok(())
    }

    /// Read a keypair previously written by [`KeyPair::write_to`].
    ///
    /// Fails if the public key on disk does not belong to the secret key.
    pub fn read_from(secret_path: impl AsRef<Path>, public_path: impl AsRef<Path>) -> Result<Self> {
        let secret = SecretKey::from_slice(&fs::read(secret_path)?)?;
        let public = PublicKey::from_slice(&fs::read(public_path)?)?;
        if secret.public_key() != public {
            return Err(CryptoError::InvalidKey(
                "public key file does not match secret key".into(),
            ));
        }
        Ok(Self { secret, public })
    }
}

impl fmt::Debug for KeyPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeyPair")
            .field("public", &self.public)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_agreement_is_symmetric() {
        let alice = KeyPair::generate();
        let bob = KeyPair::generate();

        let a = alice.secret().diffie_hellman(&bob.public_key());
        let b = bob.secret().diffie_hellman(&alice.public_key());

        assert_eq!(a, b);
    }

    // RFC 7748 section 6.1.
    #[test]
    fn test_rfc7748_vector() {
        let decode = |s: &str| -> [u8; KEY_LEN] { hex::decode(s).unwrap().try_into().unwrap() };

        let alice = KeyPair::from_seed(decode(
            "77076d0a7318a57d3c16c17251b26645df4c2f87ebc0992ab177fba51db92c2a",
        ));
        let bob = KeyPair::from_seed(decode(
            "5dab087e624a8a4b79e17f8b83800ee66f3bb1292618b6fd1c2f8b27ff88e0eb",
        ));

        assert_eq!(
            alice.public_key().to_hex(),
            "8520f0098930a754748b7ddcb43ef75a0dbf3a0d26381af4eba4a98eaa9b4e6a"
        );
        assert_eq!(
            bob.public_key().to_hex(),
            "de9edb7d7b7dc1b4d35b61c2ece435373f8343c85b78674dadfc7e146f882b4f"
        );
        assert_eq!(
            hex::encode(alice.secret().diffie_hellman(&bob.public_key())),
            "4a5d9d5ba4ce2de1728e3bf480350f25e07e21c947d19e3376f09b3c1e161742"
        );
    }

    #[test]
    fn test_from_seed_deterministic() {
        let k1 = KeyPair::from_seed([7; 32]);
        let k2 = KeyPair::from_seed([7; 32]);
        assert_eq!(k1.public_key(), k2.public_key());
        assert_eq!(k1.secret().to_bytes(), k2.secret().to_bytes());
    }

    #[test]
    fn test_from_slice_rejects_wrong_length() {
        assert!(matches!(
            PublicKey::from_slice(&[0u8; 31]),
            Err(CryptoError::InvalidKey(_))
        ));
        assert!(matches!(
            SecretKey::from_slice(&[0u8; 33]),
            Err(CryptoError::InvalidKey(_))
        ));
    }

    #[test]
    fn test_key_files_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let secret_path = dir.path().join("secret.key");
        let public_path = dir.path().join("public.key");

        let keys = KeyPair::generate();
        keys.write_to(&secret_path, &public_path).unwrap();

        assert_eq!(std::fs::read(&public_path).unwrap().len(), KEY_LEN);

        let loaded = KeyPair::read_from(&secret_path, &public_path).unwrap();
        assert_eq!(loaded.public_key(), keys.public_key());
        assert_eq!(loaded.secret().to_bytes(), keys.secret().to_bytes());
    }

    #[test]
    fn test_key_files_mismatch_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let secret_path = dir.path().join("secret.key");
        let public_path = dir.path().join("public.key");

        KeyPair::generate().write_to(&secret_path, &public_path).unwrap();
        std::fs::write(&public_path, KeyPair::generate().public_key().as_bytes()).unwrap();

        assert!(matches!(
            KeyPair::read_from(&secret_path, &public_path),
            Err(CryptoError::InvalidKey(_))
        ));
    }

    #[test]
    fn test_debug_hides_secret() {
        let keys = KeyPair::from_seed([0xab; 32]);
        let debug = format!("{:?}", keys.secret());
        assert_eq!(debug, "SecretKey(..)");
    }
}
