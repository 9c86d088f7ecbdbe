//! C2: handshake & identity (§4.2). The server issues a nonce; the client
//! returns `(declaredId, signature-over-nonce-and-id, publicKey)`; the
//! server checks the signature against the trust list entry for
//! `declaredId` and tags the connection with the verified id on success.

use serde::{Deserialize, Serialize};
use sp_crypto::{verify_challenge, Nonce, PublicKey};
use sp_wire::{read_message, write_message};
use std::collections::HashMap;
use std::fmt;
use std::io::{Read, Write};
use std::time::{Duration, Instant};

/// One entry of `auth.trustList` (§6): a declared id mapped to the public
/// key it must sign challenges with.
#[derive(Clone, Debug)]
pub struct TrustListEntry {
    pub id: String,
    pub public_key: PublicKey,
}

#[derive(Clone, Debug, Default)]
pub struct TrustList(HashMap<String, PublicKey>);

impl TrustList {
    pub fn from_entries(entries: impl IntoIterator<Item = TrustListEntry>) -> Self {
        TrustList(entries.into_iter().map(|e| (e.id, e.public_key)).collect())
    }

    pub fn get(&self, id: &str) -> Option<PublicKey> {
        self.0.get(id).copied()
    }
}

#[derive(Clone, Debug)]
pub struct HandshakeConfig {
    pub enabled: bool,
    pub trust_list: TrustList,
    pub handshake_timeout: Duration,
}

impl HandshakeConfig {
    pub fn disabled() -> Self {
        HandshakeConfig {
            enabled: false,
            trust_list: TrustList::default(),
            handshake_timeout: Duration::from_secs(5),
        }
    }
}

/// The result of a successful handshake: the connection is tagged with
/// either a trust-list-verified id, or — when auth is disabled — a
/// synthetic `unknown:<peer>` id (§4.2).
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum VerifiedIdentity {
    Known(String),
    Unknown(String),
}

impl VerifiedIdentity {
    pub fn as_str(&self) -> &str {
        match self {
            VerifiedIdentity::Known(id) => id,
            VerifiedIdentity::Unknown(id) => id,
        }
    }

    pub fn is_known(&self) -> bool {
        matches!(self, VerifiedIdentity::Known(_))
    }
}

impl fmt::Display for VerifiedIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AuthError {
    UnknownIdentity,
    BadSignature,
    Timeout,
    Transport,
}

impl fmt::Display for AuthError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AuthError::UnknownIdentity => write!(f, "AuthUnknownIdentity"),
            AuthError::BadSignature => write!(f, "AuthBadSignature"),
            AuthError::Timeout => write!(f, "AuthTimeout"),
            AuthError::Transport => write!(f, "handshake transport error"),
        }
    }
}

impl std::error::Error for AuthError {}

#[derive(Clone, Debug, Serialize, Deserialize)]
struct Challenge {
    nonce: [u8; sp_crypto::NONCE_LEN],
}

#[derive(Clone, Debug, Serialize, Deserialize)]
struct ChallengeResponse {
    declared_id: String,
    public_key: [u8; 32],
    signature: [u8; 64],
}

const MAX_HANDSHAKE_FRAME: u32 = 4096;

/// Runs the server side of the handshake over an already-connected,
/// duplex byte stream. The caller is responsible for bounding the overall
/// wall-clock time spent here (e.g. via a socket read timeout derived from
/// `config.handshake_timeout`); this function additionally checks an
/// explicit deadline so slow-but-not-blocked peers are still rejected.
pub fn server_handshake<S: Read + Write>(
    stream: &mut S,
    config: &HandshakeConfig,
    peer_label: &str,
) -> Result<VerifiedIdentity, AuthError> {
    let deadline = Instant::now() + config.handshake_timeout;
    let nonce = Nonce::generate();

    write_message(stream, &Challenge { nonce: nonce.0 }).map_err(|_| AuthError::Transport)?;

    if Instant::now() > deadline {
        return Err(AuthError::Timeout);
    }

    let response: ChallengeResponse =
        read_message(stream, MAX_HANDSHAKE_FRAME).map_err(|_| AuthError::Timeout)?;

    if Instant::now() > deadline {
        return Err(AuthError::Timeout);
    }

    if !config.enabled {
        return Ok(VerifiedIdentity::Unknown(format!("unknown:{peer_label}")));
    }

    let trusted_key = config.trust_list.get(&response.declared_id).ok_or_else(|| {
        tracing::warn!(declared_id = %response.declared_id, peer = peer_label, "handshake: unknown identity");
        AuthError::UnknownIdentity
    })?;

    let bad_signature = || {
        tracing::warn!(declared_id = %response.declared_id, peer = peer_label, "handshake: bad signature");
        AuthError::BadSignature
    };

    if trusted_key.0 != response.public_key {
        return Err(bad_signature());
    }

    verify_challenge(trusted_key, nonce, &response.declared_id, &response.signature)
        .map_err(|_| bad_signature())?;

    tracing::info!(declared_id = %response.declared_id, peer = peer_label, "handshake succeeded");
    Ok(VerifiedIdentity::Known(response.declared_id))
}

/// Runs the client side of the handshake: receive the nonce, sign it
/// together with our declared id, and send the response.
pub fn client_handshake<S: Read + Write>(
    stream: &mut S,
    declared_id: &str,
    keypair: &sp_crypto::Keypair,
) -> Result<(), AuthError> {
    let challenge: Challenge =
        read_message(stream, MAX_HANDSHAKE_FRAME).map_err(|_| AuthError::Transport)?;
    let nonce = Nonce(challenge.nonce);
    let signature = keypair.sign_challenge(nonce, declared_id);
    let response = ChallengeResponse {
        declared_id: declared_id.to_string(),
        public_key: keypair.public_key().0,
        signature,
    };
    write_message(stream, &response).map_err(|_| AuthError::Transport)?;
    Ok(())
}
