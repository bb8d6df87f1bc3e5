//! Oracle boundary: request ids, random words and deliveries.
//!
//! An oracle hands out a [`RequestId`] synchronously and later produces a
//! [`Delivery`] carrying the random word for that id. Deliveries are consumed
//! by a [`FulfillmentConsumer`] (the mint workflow), either directly (mock
//! oracle) or through a channel (the backend service).

use sha2::{Digest, Sha256};
use std::fmt;

use crate::errors::MintResult;
use crate::state::RequestId;

/// A 256-bit random value, big-endian.
///
/// Treated as an opaque high-entropy integer. Only its residue modulo the
/// rarity table size is ever interpreted.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct RandomWord([u8; 32]);

impl RandomWord {
    pub const fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// `self mod modulus`, computed over the full 256-bit value.
    ///
    /// Panics if `modulus` is zero.
    pub fn residue(&self, modulus: u64) -> u64 {
        assert!(modulus != 0, "residue modulo zero");
        let m = u128::from(modulus);
        let r = self
            .0
            .iter()
            .fold(0u128, |acc, &byte| ((acc << 8) | u128::from(byte)) % m);
        // r < modulus, so it fits back into u64.
        r as u64
    }
}

impl From<u64> for RandomWord {
    fn from(value: u64) -> Self {
        let mut bytes = [0u8; 32];
        bytes[24..].copy_from_slice(&value.to_be_bytes());
        Self(bytes)
    }
}

impl fmt::Debug for RandomWord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "RandomWord(0x")?;
        for byte in &self.0 {
            write!(f, "{byte:02x}")?;
        }
        write!(f, ")")
    }
}

/// Expand a base word into `num_words` values: `word[i] = SHA256(base || i_le)`.
pub fn expand_random_word(base: &RandomWord, num_words: u32) -> Vec<RandomWord> {
    (0..num_words)
        .map(|i| {
            let mut hasher = Sha256::new();
            hasher.update(base.as_bytes());
            hasher.update(i.to_le_bytes());
            let mut word = [0u8; 32];
            word.copy_from_slice(&hasher.finalize());
            RandomWord(word)
        })
        .collect()
}

/// One oracle callback: the random word for a previously issued request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Delivery {
    pub request_id: RequestId,
    pub random_word: RandomWord,
}

/// An asynchronous randomness source.
///
/// `request` assigns a fresh id (or fails with `FeeRejected` when the oracle
/// subscription cannot pay for it). `fulfill` produces the delivery for an
/// issued id exactly once; a second call, or a call for an id the oracle never
/// issued, fails with `UnknownRequest`.
pub trait RandomnessOracle: Send + Sync {
    fn request(&self) -> MintResult<RequestId>;

    fn fulfill(&self, request_id: RequestId) -> MintResult<Delivery>;

    /// Number of issued requests not yet fulfilled on the oracle side.
    fn outstanding(&self) -> usize;
}

/// Receiver of oracle deliveries.
pub trait FulfillmentConsumer {
    type Output;

    fn on_delivery(&self, delivery: Delivery) -> MintResult<Self::Output>;
}
