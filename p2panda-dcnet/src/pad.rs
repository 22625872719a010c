// SPDX-License-Identifier: MIT OR Apache-2.0

//! Pairwise shared secrets and the pad streams derived from them.
//!
//! Every client shares one secret with every trustee. Both ends of a pair seed the same
//! deterministic ChaCha20 keystream from that secret and draw exactly one payload-sized pad block
//! from it per round. As long as both ends consumed the same number of blocks, the pads they
//! XOR into their cells are identical and cancel out when the relay combines all cells.
use hkdf::Hkdf;
use rand_chacha::ChaCha20Rng;
use rand_chacha::rand_core::{RngCore, SeedableRng};
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use zeroize::Zeroize;

use crate::crypto::Secret;
use crate::crypto::x25519::{PublicKey, SecretKey, X25519Error};

/// 256-bit shared secret size.
pub const SHARED_SECRET_SIZE: usize = 32;

/// Domain separation for deriving the pad stream seed from a shared secret.
const PAD_STREAM_INFO: &[u8] = b"p2panda-dcnet pad v1";

/// Secret shared between a client and a trustee, established by an external key exchange.
///
/// Immutable for the lifetime of a session.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SharedSecret(Secret<SHARED_SECRET_SIZE>);

impl SharedSecret {
    pub fn from_bytes(bytes: [u8; SHARED_SECRET_SIZE]) -> Self {
        Self(Secret::from_bytes(bytes))
    }

    /// Derives the shared secret with the other party from an X25519 key agreement.
    pub fn agree(
        our_secret_key: &SecretKey,
        their_public_key: &PublicKey,
    ) -> Result<Self, X25519Error> {
        let mut agreement = our_secret_key.calculate_agreement(their_public_key)?;
        let secret = Self::from_bytes(agreement);
        agreement.zeroize();
        Ok(secret)
    }

    pub(crate) fn as_bytes(&self) -> &[u8; SHARED_SECRET_SIZE] {
        self.0.as_bytes()
    }
}

/// Forward-only keystream shared with one peer.
///
/// There is no way to seek backwards. Re-reading a past block means deriving a fresh stream from
/// the shared secret and discarding up to the wanted position.
pub struct PadStream {
    rng: ChaCha20Rng,
    // Unused tail of the last keystream word drawn, at most three bytes.
    leftover: Vec<u8>,
    bytes_consumed: u64,
}

impl PadStream {
    /// Seeds a new stream from the shared secret, positioned at the very first byte.
    pub fn derive(shared_secret: &SharedSecret) -> Self {
        let hk = Hkdf::<Sha256>::new(None, shared_secret.as_bytes());
        let mut seed = [0u8; 32];
        hk.expand(PAD_STREAM_INFO, &mut seed)
            .expect("32 bytes is a valid hkdf-sha256 output length");
        let rng = ChaCha20Rng::from_seed(seed);
        seed.zeroize();

        Self {
            rng,
            leftover: Vec::with_capacity(4),
            bytes_consumed: 0,
        }
    }

    /// Returns the next `len` bytes of the keystream.
    ///
    /// The stream is byte-exact: drawing 5 and then 5 bytes yields the same bytes as drawing 10.
    pub fn next(&mut self, len: usize) -> Vec<u8> {
        let mut block = Vec::with_capacity(len);

        let from_leftover = len.min(self.leftover.len());
        block.extend(self.leftover.drain(..from_leftover));

        // ChaCha20Rng hands out whole 32-bit words and drops the rest of a partially used one,
        // so only aligned lengths go through `fill_bytes` and the last word is split by hand.
        let remaining = len - from_leftover;
        let aligned = remaining - remaining % 4;
        let start = block.len();
        block.resize(start + aligned, 0);
        self.rng.fill_bytes(&mut block[start..]);

        let tail = remaining % 4;
        if tail > 0 {
            let mut word = self.rng.next_u32().to_le_bytes();
            block.extend_from_slice(&word[..tail]);
            self.leftover.extend_from_slice(&word[tail..]);
            word.zeroize();
        }

        self.bytes_consumed += len as u64;
        block
    }

    /// Consumes the next `len` bytes of the keystream without handing them out.
    pub fn discard(&mut self, len: usize) {
        let mut block = self.next(len);
        block.zeroize();
    }

    /// Number of bytes drawn from this stream so far.
    pub fn bytes_consumed(&self) -> u64 {
        self.bytes_consumed
    }
}

impl std::fmt::Debug for PadStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PadStream")
            .field("bytes_consumed", &self.bytes_consumed)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use crate::crypto::Rng;
    use crate::crypto::x25519::SecretKey;

    use super::{PadStream, SharedSecret};

    #[test]
    fn both_ends_draw_same_pads() {
        let secret = SharedSecret::from_bytes([7; 32]);
        let mut client = PadStream::derive(&secret);
        let mut trustee = PadStream::derive(&secret);

        for _ in 0..10 {
            assert_eq!(client.next(50), trustee.next(50));
        }
        assert_eq!(client.bytes_consumed(), 500);
    }

    #[test]
    fn stream_never_repeats_blocks() {
        let mut stream = PadStream::derive(&SharedSecret::from_bytes([7; 32]));
        let block_1 = stream.next(32);
        let block_2 = stream.next(32);
        assert_ne!(block_1, block_2);
    }

    #[test]
    fn discard_advances_like_next() {
        let secret = SharedSecret::from_bytes([3; 32]);
        let mut skipping = PadStream::derive(&secret);
        let mut reading = PadStream::derive(&secret);

        skipping.discard(16);
        skipping.discard(16);
        reading.next(16);
        reading.next(16);

        assert_eq!(skipping.bytes_consumed(), reading.bytes_consumed());
        assert_eq!(skipping.next(16), reading.next(16));
    }

    #[test]
    fn byte_exact_across_odd_lengths() {
        let secret = SharedSecret::from_bytes([5; 32]);

        let mut chunked = PadStream::derive(&secret);
        let mut bytes = chunked.next(5);
        bytes.extend(chunked.next(5));
        assert_eq!(bytes, PadStream::derive(&secret).next(10));
        assert_eq!(chunked.bytes_consumed(), 10);

        // Chunks smaller than the buffered word tail and zero-length draws.
        let mut chunked = PadStream::derive(&secret);
        let mut bytes = Vec::new();
        for len in [3, 1, 0, 2, 7, 1, 13, 4] {
            bytes.extend(chunked.next(len));
        }
        assert_eq!(bytes, PadStream::derive(&secret).next(31));
        assert_eq!(chunked.bytes_consumed(), 31);

        let mut skipping = PadStream::derive(&secret);
        skipping.discard(7);
        assert_eq!(skipping.next(9), PadStream::derive(&secret).next(16)[7..]);
    }

    #[test]
    fn different_secrets_different_pads() {
        let mut stream_1 = PadStream::derive(&SharedSecret::from_bytes([1; 32]));
        let mut stream_2 = PadStream::derive(&SharedSecret::from_bytes([2; 32]));
        assert_ne!(stream_1.next(32), stream_2.next(32));
    }

    #[test]
    fn agreed_secret_matches_on_both_sides() {
        let rng = Rng::from_seed([1; 32]);
        let client = SecretKey::from_rng(&rng).unwrap();
        let trustee = SecretKey::from_rng(&rng).unwrap();

        let secret_1 = SharedSecret::agree(&client, &trustee.public_key()).unwrap();
        let secret_2 = SharedSecret::agree(&trustee, &client.public_key()).unwrap();
        assert_eq!(secret_1, secret_2);

        let mut stream_1 = PadStream::derive(&secret_1);
        let mut stream_2 = PadStream::derive(&secret_2);
        assert_eq!(stream_1.next(64), stream_2.next(64));
    }
}
