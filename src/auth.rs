//! Pluggable authenticity checks for incoming updates.
//!
//! The core never assumes a cryptographic scheme. It calls an
//! [`Authenticator`] once per update with `(participant_id, round_number, tag)`
//! and treats the answer as a plain boolean.

use constant_time_eq::constant_time_eq;

/// Authenticity capability consulted during validation.
///
/// Implementations must be safe to call from several threads at once; the
/// validator checks updates in parallel.
pub trait Authenticator: Send + Sync {
    /// Return `true` if `tag` authenticates `participant_id` for `round_number`.
    fn verify(&self, participant_id: &str, round_number: u64, tag: &[u8]) -> bool;
}

impl<F> Authenticator for F
where
    F: Fn(&str, u64, &[u8]) -> bool + Send + Sync,
{
    fn verify(&self, participant_id: &str, round_number: u64, tag: &[u8]) -> bool {
        self(participant_id, round_number, tag)
    }
}

/// Accepts every tag. For deployments where the transport already
/// authenticated the sender, and for tests.
#[derive(Clone, Copy, Debug, Default)]
pub struct AcceptAll;

impl Authenticator for AcceptAll {
    fn verify(&self, _participant_id: &str, _round_number: u64, _tag: &[u8]) -> bool {
        true
    }
}

/// Length in bytes of tags produced by [`DigestAuthenticator`].
pub const DIGEST_TAG_LEN: usize = 16;

/// Keyed BLAKE3 tag over `(participant_id, round_number)`, truncated to
/// [`DIGEST_TAG_LEN`] bytes.
///
/// A shared-secret reference scheme, not a signature: anyone holding the key
/// can mint tags for any participant.
///
/// ```rust
/// use bastion_fl::auth::{Authenticator, DigestAuthenticator};
///
/// let auth = DigestAuthenticator::new([7u8; 32]);
/// let tag = auth.tag("node-1", 12);
/// assert!(auth.verify("node-1", 12, &tag));
/// assert!(!auth.verify("node-1", 13, &tag));
/// ```
#[derive(Clone)]
pub struct DigestAuthenticator {
    key: [u8; 32],
}

impl DigestAuthenticator {
    /// Create an authenticator for a shared 32-byte key.
    pub fn new(key: [u8; 32]) -> Self {
        Self { key }
    }

    /// Produce the tag a participant attaches to its update.
    pub fn tag(&self, participant_id: &str, round_number: u64) -> Vec<u8> {
        let mut hasher = blake3::Hasher::new_keyed(&self.key);
        hasher.update(&(participant_id.len() as u64).to_le_bytes());
        hasher.update(participant_id.as_bytes());
        hasher.update(&round_number.to_le_bytes());
        hasher.finalize().as_bytes()[..DIGEST_TAG_LEN].to_vec()
    }
}

impl std::fmt::Debug for DigestAuthenticator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DigestAuthenticator").finish_non_exhaustive()
    }
}

impl Authenticator for DigestAuthenticator {
    fn verify(&self, participant_id: &str, round_number: u64, tag: &[u8]) -> bool {
        constant_time_eq(tag, &self.tag(participant_id, round_number))
    }
}
