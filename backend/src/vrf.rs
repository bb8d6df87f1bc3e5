//! HMAC-derived random words for the in-process coordinator.
//!
//! A word depends on the coordinator secret, the key lane, the request's
//! sequence number and the request id. Replaying a request reproduces its word; nobody without
//! the secret can predict it.

use hmac::{Hmac, Mac};
use random_mint::{RandomWord, RequestId};
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

/// ```text
/// word = HMAC-SHA256(secret, key_hash || sequence_le || request_id_le)
/// ```
pub fn compute_randomness(
    hmac_secret: &[u8],
    key_hash: &[u8; 32],
    sequence: u64,
    request_id: RequestId,
) -> RandomWord {
    let mut mac =
        HmacSha256::new_from_slice(hmac_secret).expect("HMAC accepts keys of any size");
    mac.update(key_hash);
    mac.update(&sequence.to_le_bytes());
    mac.update(&request_id.0.to_le_bytes());

    let mut word = [0u8; 32];
    word.copy_from_slice(&mac.finalize().into_bytes());
    RandomWord::from_bytes(word)
}
