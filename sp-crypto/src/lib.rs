//! Signature primitives backing the handshake (§4.2, §6): a fresh nonce per
//! connection attempt, ed25519 keypairs, and signature verification against
//! a declared identity's trusted public key.

use ed25519_dalek::{Signature, Signer, SigningKey, Verifier, VerifyingKey};
use rand::RngCore;
use sp_base::{err, Error};
use std::fmt;

pub const NONCE_LEN: usize = 32;

#[derive(Clone, Copy, PartialEq, Eq)]
pub struct Nonce(pub [u8; NONCE_LEN]);

impl Nonce {
    /// A fresh, uniformly random 32-byte nonce (§6).
    pub fn generate() -> Self {
        let mut bytes = [0u8; NONCE_LEN];
        rand::thread_rng().fill_bytes(&mut bytes);
        Nonce(bytes)
    }
}

impl fmt::Debug for Nonce {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Nonce(0x{})", hex::encode(self.0))
    }
}

/// A compressed ed25519 public key, as carried in the trust list
/// (`auth.trustList[].publicKeyHex`, §6).
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct PublicKey(pub [u8; 32]);

impl PublicKey {
    pub fn from_hex(s: &str) -> Result<Self, Error> {
        let bytes = hex::decode(s)?;
        let arr: [u8; 32] = bytes.as_slice().try_into().map_err(|_| err("public key must be 32 bytes"))?;
        Ok(PublicKey(arr))
    }

    pub fn to_hex(self) -> String {
        hex::encode(self.0)
    }

    fn to_dalek(self) -> Result<VerifyingKey, Error> {
        VerifyingKey::from_bytes(&self.0).map_err(Error::from)
    }
}

impl fmt::Debug for PublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PublicKey(0x{})", self.to_hex())
    }
}

pub struct Keypair(SigningKey);

impl Keypair {
    pub fn generate() -> Self {
        Keypair(SigningKey::generate(&mut rand::thread_rng()))
    }

    pub fn public_key(&self) -> PublicKey {
        PublicKey(self.0.verifying_key().to_bytes())
    }

    /// Signs `nonce || declared_id`, the payload the handshake client sends
    /// back to the server (§6).
    pub fn sign_challenge(&self, nonce: Nonce, declared_id: &str) -> [u8; 64] {
        let signed = self.0.sign(&challenge_bytes(nonce, declared_id));
        signed.to_bytes()
    }
}

fn challenge_bytes(nonce: Nonce, declared_id: &str) -> Vec<u8> {
    let mut buf = Vec::with_capacity(NONCE_LEN + declared_id.len());
    buf.extend_from_slice(&nonce.0);
    buf.extend_from_slice(declared_id.as_bytes());
    buf
}

/// Verifies a challenge signature against a trusted public key. Returns
/// `Ok(())` on success, or an error that maps to `AuthBadSignature` (§4.2).
pub fn verify_challenge(
    public_key: PublicKey,
    nonce: Nonce,
    declared_id: &str,
    signature_bytes: &[u8; 64],
) -> Result<(), Error> {
    let vk = public_key.to_dalek()?;
    let sig = Signature::from_bytes(signature_bytes);
    vk.verify(&challenge_bytes(nonce, declared_id), &sig).map_err(Error::from)
}
