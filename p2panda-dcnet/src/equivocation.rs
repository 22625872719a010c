// SPDX-License-Identifier: MIT OR Apache-2.0

//! Protection against a relay which equivocates, that is, shows different downstream history to
//! different clients to bias who learns what.
//!
//! Every participant keeps a history scalar `h` which is updated with the downstream data the
//! relay broadcasts. Each pad `p` is hashed to a scalar `s(p)` and contributes `s(p) * h` to the
//! sender's commitment tag. Clients add their contributions, trustees subtract theirs, so over
//! all cells of a round the pad terms cancel out if, and only if, everyone used the same history.
//!
//! The client owning the slot (the one with a payload) additionally encrypts its plaintext `x`
//! with a key `k = H(h || x)` and adds `k` to its tag. Summing all tags yields `k` for the relay,
//! which decrypts and checks that the recovered plaintext hashes back to `k`. A relay which
//! equivocated ends up with a wrong key and fails that check.
use curve25519_dalek::Scalar;
use rand_chacha::ChaCha20Rng;
use rand_chacha::rand_core::{RngCore, SeedableRng};
use thiserror::Error;
use zeroize::Zeroize;

use crate::cipher::EquivocationTag;
use crate::crypto::sha2::{sha2_256, sha2_512};

const HISTORY_DOMAIN: &[u8] = b"p2panda-dcnet equivocation history";

const PAD_DOMAIN: &[u8] = b"p2panda-dcnet equivocation pad";

const KEY_DOMAIN: &[u8] = b"p2panda-dcnet equivocation key";

const MASK_DOMAIN: &[u8] = b"p2panda-dcnet equivocation mask";

/// Equivocation protection state of one participant.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EquivocationProtection {
    history: Scalar,
}

impl Default for EquivocationProtection {
    /// All participants start from the same history.
    fn default() -> Self {
        Self {
            history: Scalar::from_bytes_mod_order_wide(&sha2_512(&[HISTORY_DOMAIN])),
        }
    }
}

impl EquivocationProtection {
    /// Folds downstream data broadcast by the relay into the history.
    pub fn update_history(&mut self, downstream: &[u8]) {
        self.history = Scalar::from_bytes_mod_order_wide(&sha2_512(&[
            HISTORY_DOMAIN,
            self.history.as_bytes(),
            downstream,
        ]));
    }

    /// Client side: encrypts the plaintext when we own the slot and commits to the pads used.
    ///
    /// Without a payload the client does not own the slot, nothing gets encrypted and only the
    /// pad commitment is returned.
    pub fn client_encrypt_payload(
        &self,
        payload: Option<&[u8]>,
        pads: &[Vec<u8>],
    ) -> (Option<Vec<u8>>, EquivocationTag) {
        let commitment = self.commit_pads(pads);
        match payload {
            None => (None, to_tag(&commitment)),
            Some(plaintext) => {
                let key = self.payload_key(plaintext);
                let mut encrypted = plaintext.to_vec();
                apply_mask(&mut encrypted, &key);
                (Some(encrypted), to_tag(&(key + commitment)))
            }
        }
    }

    /// Trustee side: negated commitment to the pads used.
    pub fn trustee_get_contribution(&self, pads: &[Vec<u8>]) -> EquivocationTag {
        to_tag(&-self.commit_pads(pads))
    }

    /// Relay side: decrypts the combined payload in place after checking all contributions.
    pub fn relay_decode(
        &self,
        combined: &mut [u8],
        contributions: &[EquivocationTag],
    ) -> Result<(), EquivocationError> {
        let mut key = Scalar::ZERO;
        for tag in contributions {
            key += from_tag(tag)?;
        }

        // Nobody owned the slot this round, the payload was never encrypted.
        if key == Scalar::ZERO {
            return Ok(());
        }

        apply_mask(combined, &key);
        if self.payload_key(combined) != key {
            return Err(EquivocationError::Detected);
        }
        Ok(())
    }

    fn commit_pads(&self, pads: &[Vec<u8>]) -> Scalar {
        pads.iter().map(|pad| pad_scalar(pad) * self.history).sum()
    }

    fn payload_key(&self, plaintext: &[u8]) -> Scalar {
        Scalar::from_bytes_mod_order_wide(&sha2_512(&[
            KEY_DOMAIN,
            self.history.as_bytes(),
            plaintext,
        ]))
    }
}

fn pad_scalar(pad: &[u8]) -> Scalar {
    Scalar::from_bytes_mod_order_wide(&sha2_512(&[PAD_DOMAIN, pad]))
}

fn apply_mask(data: &mut [u8], key: &Scalar) {
    let mut rng = ChaCha20Rng::from_seed(sha2_256(&[MASK_DOMAIN, key.as_bytes()]));
    let mut mask = vec![0u8; data.len()];
    rng.fill_bytes(&mut mask);
    for (byte, mask_byte) in data.iter_mut().zip(mask.iter()) {
        *byte ^= mask_byte;
    }
    mask.zeroize();
}

fn to_tag(scalar: &Scalar) -> EquivocationTag {
    EquivocationTag::from_bytes(scalar.to_bytes())
}

fn from_tag(tag: &EquivocationTag) -> Result<Scalar, EquivocationError> {
    Option::<Scalar>::from(Scalar::from_canonical_bytes(*tag.as_bytes()))
        .ok_or(EquivocationError::NonCanonicalTag)
}

#[derive(Debug, Error)]
pub enum EquivocationError {
    #[error("equivocation tag is not a canonical scalar")]
    NonCanonicalTag,

    #[error("contributions do not match the recovered payload, relay equivocated")]
    Detected,
}
