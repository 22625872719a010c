// SPDX-License-Identifier: MIT OR Apache-2.0

//! `p2panda-dcnet` implements the cell encoding of a dining-cryptographers network (DC-net), a
//! protocol where a group of clients can publish messages without anyone learning which client
//! sent them.
//!
//! Every client shares a secret with every trustee of the session. From each shared secret both
//! ends derive the same deterministic pad stream. In each round every client XORs one pad block per
//! trustee into its cell, and every trustee does the same with one block per client. When a relay
//! XORs all cells of a round together, every pad appears exactly twice and cancels out. What is
//! left is the payload of the client which owned the slot this round, while no single cell reveals
//! anything about it.
//!
//! ## Roles
//!
//! - **Clients** send anonymous payloads. A client without anything to send still takes part in
//!   every round it is scheduled for, otherwise the pads would not cancel out.
//! - **Trustees** never send payload. They only contribute their pads. As long as at least one
//!   trustee is honest, the relay can not link payloads to clients.
//! - The **relay** holds no pads. It collects the cells of a round and combines them.
//!
//! All roles are represented by a [`DcNetEntity`] which is created from a [`DcNetConfig`] and the
//! [shared secrets](SharedSecret) with its peers. Shared secrets are usually agreed with X25519,
//! see [`SharedSecret::agree`].
//!
//! ## Rounds
//!
//! Rounds are numbered from 0 and only ever move forward. Encoding for a round later than the
//! next one discards the pads of every round in between, so an entity which missed rounds stays
//! aligned with its peers. Encoding a round twice is rejected, reusing pads would leak the XOR of
//! two payloads.
//!
//! ## Protections
//!
//! Two optional protections attach a tag to each cell and reduce the payload capacity of the fixed
//! message size accordingly:
//!
//! - **Equivocation protection** detects a relay which broadcast different downstream data to
//!   different participants. Each cell carries a commitment to the pads and the history it was
//!   built with, the owner of the slot additionally encrypts its payload with a key derived from
//!   that history. The relay can only recover the payload when everyone agreed on the history.
//! - **Disruption protection** attaches an HMAC over the transmitted cell of every client. A
//!   client jamming the round can be identified afterwards with the help of
//!   [`RoundManager::reveal_bit`], which discloses single bits of past pads.
//!
//! Transport, scheduling of slots, membership and the decision when a round is complete are left
//! to the application.
mod cipher;
mod config;
mod crypto;
mod decoder;
mod entity;
mod equivocation;
mod pad;
mod round_manager;
#[cfg(any(test, feature = "test_utils"))]
pub mod test_utils;
#[cfg(test)]
mod tests;

pub use cipher::{
    CipherError, DISRUPTION_TAG_SIZE, DcNetCipher, DisruptionTag, EQUIVOCATION_TAG_SIZE,
    EquivocationTag, Segment, WireLayout,
};
pub use config::{ConfigError, DEFAULT_MESSAGE_SIZE, DcNetConfig};
pub use crypto::x25519::{PublicKey, SecretKey, X25519Error};
pub use crypto::{Rng, RngError};
pub use decoder::{RelayDecodeError, RelayDecoder, RoundBuffer};
pub use entity::{DcNetEntity, EncodeError, EntityId, PeerIndex, Role, RoundId};
pub use equivocation::{EquivocationError, EquivocationProtection};
pub use pad::{PadStream, SHARED_SECRET_SIZE, SharedSecret};
pub use round_manager::{RevealError, RoundManager};
