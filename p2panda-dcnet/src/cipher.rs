// SPDX-License-Identifier: MIT OR Apache-2.0

//! DC-net cells and their fixed-length wire format.
//!
//! A cell is laid out as an ordered list of segments, each present or absent depending on the
//! protections enabled for the session:
//!
//! ```text
//! [ payload            : payload_len bytes ]
//! [ equivocation tag   : 32 bytes          ]  only with equivocation protection
//! [ disruption tag     : 32 bytes          ]  only with disruption protection
//! ```
//!
//! The total length always equals the configured message size.
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::config::{ConfigError, DcNetConfig};
use crate::crypto::hmac::{HMAC_SHA256_SIZE, hmac_sha256, hmac_sha256_verify};
use crate::crypto::sha2::sha2_256;
use crate::entity::EntityId;

/// Size of an equivocation commitment tag (one curve25519 scalar).
pub const EQUIVOCATION_TAG_SIZE: usize = 32;

/// Size of a disruption tag (HMAC-SHA256 output).
pub const DISRUPTION_TAG_SIZE: usize = HMAC_SHA256_SIZE;

const DISRUPTION_KEY_DOMAIN: &[u8] = b"p2panda-dcnet disruption";

/// Commitment binding a participant's cell to the pads it used.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct EquivocationTag(#[serde(with = "serde_bytes")] [u8; EQUIVOCATION_TAG_SIZE]);

impl EquivocationTag {
    pub fn from_bytes(bytes: [u8; EQUIVOCATION_TAG_SIZE]) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; EQUIVOCATION_TAG_SIZE] {
        &self.0
    }
}

/// Keyed integrity tag over a client's transmitted payload.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DisruptionTag(#[serde(with = "serde_bytes")] [u8; DISRUPTION_TAG_SIZE]);

impl DisruptionTag {
    pub fn from_bytes(bytes: [u8; DISRUPTION_TAG_SIZE]) -> Self {
        Self(bytes)
    }

    /// HMAC-SHA256 over the payload, keyed with the client's disruption key.
    ///
    /// Clients tag the payload as transmitted, after the pads and the equivocation encryption
    /// were applied, not the plaintext. The relay verifies the tag against the bytes it received
    /// without knowing any pads.
    pub fn compute(client_id: EntityId, payload: &[u8]) -> Self {
        Self(hmac_sha256(&disruption_key(client_id), payload))
    }

    /// Returns true if this tag was computed by `client_id` over exactly this payload.
    pub fn verify(&self, client_id: EntityId, payload: &[u8]) -> bool {
        hmac_sha256_verify(&disruption_key(client_id), payload, &self.0)
    }

    pub fn as_bytes(&self) -> &[u8; DISRUPTION_TAG_SIZE] {
        &self.0
    }
}

// Both tags are 32 bytes and the layout fixes their segments to exactly that length.
fn tag_bytes(chunk: &[u8]) -> [u8; 32] {
    let mut bytes = [0u8; 32];
    bytes.copy_from_slice(chunk);
    bytes
}

fn disruption_key(client_id: EntityId) -> [u8; 32] {
    sha2_256(&[DISRUPTION_KEY_DOMAIN, &client_id.to_be_bytes()])
}

/// One segment of a cell on the wire.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Segment {
    Payload,
    EquivocationTag,
    DisruptionTag,
}

/// Ordered wire segments of a session, resolved once from the configuration.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct WireLayout {
    segments: Vec<(Segment, usize)>,
}

impl WireLayout {
    pub fn new(config: &DcNetConfig) -> Result<Self, ConfigError> {
        let mut segments = vec![(Segment::Payload, config.payload_len()?)];
        if config.equivocation_protection {
            segments.push((Segment::EquivocationTag, EQUIVOCATION_TAG_SIZE));
        }
        if config.disruption_protection {
            segments.push((Segment::DisruptionTag, DISRUPTION_TAG_SIZE));
        }
        Ok(Self { segments })
    }

    /// Present segments in wire order, with their lengths.
    pub fn segments(&self) -> &[(Segment, usize)] {
        &self.segments
    }

    pub fn payload_len(&self) -> usize {
        // The payload segment is always present and always first.
        self.segments[0].1
    }

    pub fn message_size(&self) -> usize {
        self.segments.iter().map(|(_, len)| len).sum()
    }

    pub fn has(&self, segment: Segment) -> bool {
        self.segments.iter().any(|(present, _)| *present == segment)
    }

    pub fn equivocation_protection(&self) -> bool {
        self.has(Segment::EquivocationTag)
    }

    pub fn disruption_protection(&self) -> bool {
        self.has(Segment::DisruptionTag)
    }
}

/// Cell produced by a client or trustee for exactly one round.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DcNetCipher {
    payload: Vec<u8>,
    equivocation_tag: Option<EquivocationTag>,
    disruption_tag: Option<DisruptionTag>,
}

impl DcNetCipher {
    pub(crate) fn new(
        payload: Vec<u8>,
        equivocation_tag: Option<EquivocationTag>,
        disruption_tag: Option<DisruptionTag>,
    ) -> Self {
        Self {
            payload,
            equivocation_tag,
            disruption_tag,
        }
    }

    pub fn payload(&self) -> &[u8] {
        &self.payload
    }

    pub fn equivocation_tag(&self) -> Option<&EquivocationTag> {
        self.equivocation_tag.as_ref()
    }

    pub fn disruption_tag(&self) -> Option<&DisruptionTag> {
        self.disruption_tag.as_ref()
    }

    /// Checks the disruption tag of a client cell against the payload it carries.
    pub fn verify_disruption_tag(&self, client_id: EntityId) -> Result<(), CipherError> {
        let tag = self
            .disruption_tag
            .as_ref()
            .ok_or(CipherError::MissingDisruptionTag)?;
        if !tag.verify(client_id, &self.payload) {
            return Err(CipherError::InvalidDisruptionTag(client_id));
        }
        Ok(())
    }

    /// Encodes the cell into its flat wire representation.
    ///
    /// Segments the cell has no value for are zero-filled, as trustees never attach a
    /// disruption tag. The result is always exactly [`WireLayout::message_size`] bytes long.
    pub fn to_bytes(&self, layout: &WireLayout) -> Vec<u8> {
        let mut bytes = Vec::with_capacity(layout.message_size());
        for (segment, len) in layout.segments() {
            let value: Option<&[u8]> = match segment {
                Segment::Payload => Some(self.payload.as_slice()),
                Segment::EquivocationTag => self.equivocation_tag.as_ref().map(|tag| &tag.0[..]),
                Segment::DisruptionTag => self.disruption_tag.as_ref().map(|tag| &tag.0[..]),
            };
            match value {
                Some(value) => bytes.extend_from_slice(value),
                None => bytes.resize(bytes.len() + len, 0),
            }
        }
        bytes
    }

    /// Decodes a cell from the wire, following the session's layout.
    pub fn from_bytes(bytes: &[u8], layout: &WireLayout) -> Result<Self, CipherError> {
        if bytes.len() != layout.message_size() {
            return Err(CipherError::InvalidLength {
                expected: layout.message_size(),
                actual: bytes.len(),
            });
        }

        let mut cipher = Self::new(Vec::new(), None, None);
        let mut offset = 0;
        for (segment, len) in layout.segments() {
            let chunk = &bytes[offset..offset + len];
            match segment {
                Segment::Payload => cipher.payload = chunk.to_vec(),
                Segment::EquivocationTag => {
                    cipher.equivocation_tag = Some(EquivocationTag::from_bytes(tag_bytes(chunk)))
                }
                Segment::DisruptionTag => {
                    // An all-zero segment stands for "no tag", as written by trustees.
                    if chunk.iter().any(|byte| *byte != 0) {
                        cipher.disruption_tag = Some(DisruptionTag::from_bytes(tag_bytes(chunk)))
                    }
                }
            }
            offset += len;
        }

        Ok(cipher)
    }
}

#[derive(Debug, Error)]
pub enum CipherError {
    #[error("cell has {actual} bytes, expected {expected}")]
    InvalidLength { expected: usize, actual: usize },

    #[error("cell is missing its equivocation tag")]
    MissingEquivocationTag,

    #[error("equivocation tag is not a canonical scalar")]
    InvalidEquivocationTag,

    #[error("cell is missing its disruption tag")]
    MissingDisruptionTag,

    #[error("disruption tag of client {0} does not match the payload")]
    InvalidDisruptionTag(EntityId),
}
