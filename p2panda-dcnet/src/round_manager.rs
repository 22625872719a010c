// SPDX-License-Identifier: MIT OR Apache-2.0

//! Round-addressed encoding and forensic reveal of single pad bits.
//!
//! When a round got disrupted, participants can be asked which bit each of their pads contributed
//! at a given position. Comparing these bits with the cells on record allows tracing the
//! disruptor without revealing whole pads or shared secrets.
use std::collections::BTreeMap;

use thiserror::Error;
use tracing::debug;

use crate::cipher::DcNetCipher;
use crate::config::{ConfigError, DcNetConfig};
use crate::entity::{DcNetEntity, EncodeError, EntityId, PeerIndex, Role, RoundId};
use crate::pad::{PadStream, SharedSecret};

/// Façade over one [`DcNetEntity`] which keeps the shared secrets around for forensic reveals.
#[derive(Debug)]
pub struct RoundManager {
    entity: DcNetEntity,
    shared_secrets: Vec<SharedSecret>,
}

impl RoundManager {
    pub fn new(
        id: EntityId,
        role: Role,
        config: &DcNetConfig,
        shared_secrets: Vec<SharedSecret>,
    ) -> Result<Self, ConfigError> {
        let entity = DcNetEntity::new(id, role, config, &shared_secrets)?;
        Ok(Self {
            entity,
            shared_secrets,
        })
    }

    pub fn entity(&self) -> &DcNetEntity {
        &self.entity
    }

    pub fn current_round(&self) -> RoundId {
        self.entity.current_round()
    }

    /// See [`DcNetEntity::update_history`].
    pub fn update_history(&mut self, downstream: &[u8]) {
        self.entity.update_history(downstream);
    }

    /// See [`DcNetEntity::encode_for_round`].
    pub fn encode_for_round(
        &mut self,
        round_id: RoundId,
        payload: Option<&[u8]>,
    ) -> Result<DcNetCipher, EncodeError> {
        self.entity.encode_for_round(round_id, payload)
    }

    /// Reveals, for every peer, the bit at `bit_position` of the pad block used in `round_id`.
    ///
    /// Bits are numbered from the least significant bit of the first payload byte. Pad streams are
    /// forward-only, so every reveal derives fresh streams from the shared secrets and discards all
    /// blocks before `round_id`. The cost is linear in the round number.
    pub fn reveal_bit(
        &self,
        round_id: RoundId,
        bit_position: usize,
    ) -> Result<BTreeMap<PeerIndex, bool>, RevealError> {
        if round_id < 0 {
            return Err(RevealError::NegativeRound(round_id));
        }

        if round_id > self.current_round() {
            return Err(RevealError::FutureRound {
                requested: round_id,
                current: self.current_round(),
            });
        }

        let payload_len = self.entity.payload_len();
        if bit_position >= payload_len * 8 {
            return Err(RevealError::BitOutOfRange {
                bit_position,
                payload_bits: payload_len * 8,
            });
        }

        let byte_index = bit_position / 8;
        let mask = 1u8 << (bit_position % 8);

        let mut bits = BTreeMap::new();
        for (peer, shared_secret) in self.shared_secrets.iter().enumerate() {
            let mut stream = PadStream::derive(shared_secret);
            for _ in 0..round_id {
                stream.discard(payload_len);
            }
            let pad = stream.next(payload_len);
            bits.insert(peer, pad[byte_index] & mask != 0);
        }

        debug!(
            "revealed bit {} of round {} for {} peers",
            bit_position,
            round_id,
            bits.len()
        );

        Ok(bits)
    }
}

#[derive(Debug, Error)]
pub enum RevealError {
    #[error("cannot reveal round {requested}, only at round {current}")]
    FutureRound { requested: RoundId, current: RoundId },

    #[error("round {0} does not exist")]
    NegativeRound(RoundId),

    #[error("bit {bit_position} is outside of the {payload_bits} payload bits")]
    BitOutOfRange {
        bit_position: usize,
        payload_bits: usize,
    },
}
