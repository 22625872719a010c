// SPDX-License-Identifier: MIT OR Apache-2.0

//! Per-participant DC-net encoding engine.
//!
//! An entity owns one [`PadStream`] per peer and a round counter. Encoding for a round first
//! discards the pads of every round which was skipped, then draws exactly one pad block per peer
//! for the requested round. This keeps every participant's pad position aligned with its peers,
//! even when it had nothing to send for a while.
//!
//! Entities are single-writer. Concurrent encode calls on the same entity need to be serialized
//! by the caller, pad consumption is position-dependent and can not be undone.
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, trace};
use zeroize::Zeroize;

use crate::cipher::{DcNetCipher, DisruptionTag, WireLayout};
use crate::config::{ConfigError, DcNetConfig};
use crate::decoder::RelayDecoder;
use crate::equivocation::EquivocationProtection;
use crate::pad::{PadStream, SharedSecret};

/// Identifier of a client, trustee or relay within a session.
pub type EntityId = u32;

/// Round number. All entities of a session start at round 0.
pub type RoundId = i32;

/// Position of a peer in the ordered list of shared secrets of an entity.
pub type PeerIndex = usize;

/// Part an entity plays in the DC-net.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Role {
    /// Sends anonymous payloads, shares a secret with every trustee.
    Client,

    /// Never sends payload, only contributes pads matching those of the clients.
    Trustee,

    /// Combines all cells of a round, holds no pads.
    Relay,
}

#[derive(Debug)]
enum EntityKind {
    Client(Participant),
    Trustee(Participant),
    Relay(RelayDecoder),
}

/// Pad material of a client or trustee.
#[derive(Debug)]
struct Participant {
    pad_streams: Vec<PadStream>,
    equivocation: Option<EquivocationProtection>,
}

impl Participant {
    fn new(shared_secrets: &[SharedSecret], config: &DcNetConfig) -> Result<Self, ConfigError> {
        if shared_secrets.is_empty() {
            return Err(ConfigError::MissingSharedSecrets);
        }

        Ok(Self {
            pad_streams: shared_secrets.iter().map(PadStream::derive).collect(),
            equivocation: config
                .equivocation_protection
                .then(EquivocationProtection::default),
        })
    }

    fn skip_rounds(&mut self, from: RoundId, to: RoundId, payload_len: usize) {
        for round in from..to {
            trace!("discarding pads of round {}", round);
            for stream in self.pad_streams.iter_mut() {
                stream.discard(payload_len);
            }
        }
    }

    fn next_pads(&mut self, payload_len: usize) -> Vec<Vec<u8>> {
        self.pad_streams
            .iter_mut()
            .map(|stream| stream.next(payload_len))
            .collect()
    }

    fn client_encode(
        &mut self,
        client_id: EntityId,
        layout: &WireLayout,
        payload: Option<&[u8]>,
    ) -> DcNetCipher {
        let payload_len = layout.payload_len();

        // Zero-pad the plaintext to the full payload length.
        let plaintext = payload.map(|payload| {
            let mut padded = vec![0u8; payload_len];
            padded[..payload.len()].copy_from_slice(payload);
            padded
        });

        let mut pads = self.next_pads(payload_len);

        let (mut cell, equivocation_tag) = match &self.equivocation {
            Some(equivocation) => {
                let (encrypted, tag) =
                    equivocation.client_encrypt_payload(plaintext.as_deref(), &pads);
                (encrypted.unwrap_or_else(|| vec![0u8; payload_len]), Some(tag))
            }
            None => (plaintext.unwrap_or_else(|| vec![0u8; payload_len]), None),
        };

        xor_pads(&mut cell, &pads);
        pads.zeroize();

        // The tag covers the bytes as they go on the wire.
        let disruption_tag = layout
            .disruption_protection()
            .then(|| DisruptionTag::compute(client_id, &cell));

        DcNetCipher::new(cell, equivocation_tag, disruption_tag)
    }

    fn trustee_encode(&mut self, layout: &WireLayout) -> DcNetCipher {
        let mut pads = self.next_pads(layout.payload_len());

        let mut cell = vec![0u8; layout.payload_len()];
        xor_pads(&mut cell, &pads);

        let equivocation_tag = self
            .equivocation
            .as_ref()
            .map(|equivocation| equivocation.trustee_get_contribution(&pads));
        pads.zeroize();

        DcNetCipher::new(cell, equivocation_tag, None)
    }
}

fn xor_pads(cell: &mut [u8], pads: &[Vec<u8>]) {
    for pad in pads {
        for (byte, pad_byte) in cell.iter_mut().zip(pad.iter()) {
            *byte ^= pad_byte;
        }
    }
}

/// DC-net encoding engine of one participant in one session.
#[derive(Debug)]
pub struct DcNetEntity {
    id: EntityId,
    layout: WireLayout,
    current_round: RoundId,
    kind: EntityKind,
}

impl DcNetEntity {
    /// Sets up a new entity at round 0.
    ///
    /// Clients and trustees need one shared secret per DC-net peer, in a stable order. The relay
    /// takes none and owns a [`RelayDecoder`] instead.
    pub fn new(
        id: EntityId,
        role: Role,
        config: &DcNetConfig,
        shared_secrets: &[SharedSecret],
    ) -> Result<Self, ConfigError> {
        let layout = WireLayout::new(config)?;

        let kind = match role {
            Role::Client => EntityKind::Client(Participant::new(shared_secrets, config)?),
            Role::Trustee => EntityKind::Trustee(Participant::new(shared_secrets, config)?),
            Role::Relay => {
                if !shared_secrets.is_empty() {
                    return Err(ConfigError::UnexpectedSharedSecrets);
                }
                EntityKind::Relay(RelayDecoder::new(layout.clone()))
            }
        };

        debug!(
            "set up dc-net {:?} {} with {} peers, payload length {}",
            role,
            id,
            shared_secrets.len(),
            layout.payload_len()
        );

        Ok(Self {
            id,
            layout,
            current_round: 0,
            kind,
        })
    }

    pub fn id(&self) -> EntityId {
        self.id
    }

    pub fn role(&self) -> Role {
        match self.kind {
            EntityKind::Client(_) => Role::Client,
            EntityKind::Trustee(_) => Role::Trustee,
            EntityKind::Relay(_) => Role::Relay,
        }
    }

    pub fn layout(&self) -> &WireLayout {
        &self.layout
    }

    /// Bytes of payload one cell can carry.
    pub fn payload_len(&self) -> usize {
        self.layout.payload_len()
    }

    /// Next round this entity can encode for. All earlier rounds have been consumed.
    pub fn current_round(&self) -> RoundId {
        self.current_round
    }

    /// Number of DC-net peers this entity shares pads with.
    pub fn peers(&self) -> usize {
        match &self.kind {
            EntityKind::Client(participant) | EntityKind::Trustee(participant) => {
                participant.pad_streams.len()
            }
            EntityKind::Relay(_) => 0,
        }
    }

    /// Decoder of the relay, `None` for clients and trustees.
    pub fn relay_decoder(&self) -> Option<&RelayDecoder> {
        match &self.kind {
            EntityKind::Relay(decoder) => Some(decoder),
            _ => None,
        }
    }

    /// Folds downstream data into the equivocation history. Does nothing when equivocation
    /// protection is disabled.
    pub fn update_history(&mut self, downstream: &[u8]) {
        match &mut self.kind {
            EntityKind::Client(participant) | EntityKind::Trustee(participant) => {
                if let Some(equivocation) = participant.equivocation.as_mut() {
                    equivocation.update_history(downstream);
                }
            }
            EntityKind::Relay(decoder) => decoder.update_history(downstream),
        }
    }

    /// Produces the cell for `round_id`, skipping pads of all rounds in between.
    ///
    /// Clients pass `None` when they have nothing to send but still take part in the round.
    /// Trustees never carry payload and always pass `None`.
    ///
    /// Encoding for a round which was already consumed or with a payload longer than
    /// [`payload_len`](Self::payload_len) is a protocol violation of the caller. Nothing is
    /// consumed in that case, but the session should be aborted.
    pub fn encode_for_round(
        &mut self,
        round_id: RoundId,
        payload: Option<&[u8]>,
    ) -> Result<DcNetCipher, EncodeError> {
        if round_id < self.current_round {
            return Err(EncodeError::StaleRound {
                requested: round_id,
                current: self.current_round,
            });
        }

        let next_round = round_id.checked_add(1).ok_or(EncodeError::RoundOverflow)?;

        if let Some(payload) = payload {
            if payload.len() > self.layout.payload_len() {
                return Err(EncodeError::PayloadTooLarge {
                    len: payload.len(),
                    max: self.layout.payload_len(),
                });
            }
        }

        let payload_len = self.layout.payload_len();
        let cipher = match &mut self.kind {
            EntityKind::Relay(_) => return Err(EncodeError::RelayCannotEncode),
            EntityKind::Trustee(_) if payload.is_some() => {
                return Err(EncodeError::TrusteePayload);
            }
            EntityKind::Client(participant) => {
                participant.skip_rounds(self.current_round, round_id, payload_len);
                participant.client_encode(self.id, &self.layout, payload)
            }
            EntityKind::Trustee(participant) => {
                participant.skip_rounds(self.current_round, round_id, payload_len);
                participant.trustee_encode(&self.layout)
            }
        };

        debug!("{:?} {} produced cell for round {}", self.role(), self.id, round_id);
        self.current_round = next_round;

        Ok(cipher)
    }
}

#[derive(Debug, Error)]
pub enum EncodeError {
    #[error("asked to encode for round {requested} but already at round {current}")]
    StaleRound { requested: RoundId, current: RoundId },

    #[error("cannot encode payload of {len} bytes, max length is {max}")]
    PayloadTooLarge { len: usize, max: usize },

    #[error("round counter would overflow")]
    RoundOverflow,

    #[error("relay holds no pads and can not encode cells")]
    RelayCannotEncode,

    #[error("trustees do not carry payload")]
    TrusteePayload,
}
