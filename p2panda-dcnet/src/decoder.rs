// SPDX-License-Identifier: MIT OR Apache-2.0

//! Relay-side combination of all cells of a round.
//!
//! XOR-ing every client and trustee cell of one round cancels out all pads, since each pad was
//! used exactly twice: once by a client and once by the trustee it shares the secret with. What
//! remains is the XOR of all client plaintexts, in practice the payload of the slot owner.
//!
//! Deciding when all cells of a round arrived is up to the caller.
use thiserror::Error;
use tracing::{debug, warn};

use crate::cipher::{CipherError, DcNetCipher, EquivocationTag, WireLayout};
use crate::entity::EntityId;
use crate::equivocation::{EquivocationError, EquivocationProtection};

/// Combines the cells of a round into the anonymous payload.
#[derive(Clone, Debug)]
pub struct RelayDecoder {
    layout: WireLayout,
    equivocation: Option<EquivocationProtection>,
}

impl RelayDecoder {
    pub fn new(layout: WireLayout) -> Self {
        let equivocation = layout
            .equivocation_protection()
            .then(EquivocationProtection::default);
        Self {
            layout,
            equivocation,
        }
    }

    pub fn layout(&self) -> &WireLayout {
        &self.layout
    }

    /// Folds the downstream data we broadcast into the equivocation history.
    pub fn update_history(&mut self, downstream: &[u8]) {
        if let Some(equivocation) = self.equivocation.as_mut() {
            equivocation.update_history(downstream);
        }
    }

    /// Returns an empty buffer to collect the cells of one round as they arrive.
    pub fn round_buffer(&self) -> RoundBuffer {
        RoundBuffer {
            xor_buffer: vec![0u8; self.layout.payload_len()],
            equivocation_contributions: Vec::new(),
            equivocation_protection: self.layout.equivocation_protection(),
            ciphers: 0,
        }
    }

    /// Combines all client and trustee cells of one round.
    pub fn combine(&self, ciphers: &[DcNetCipher]) -> Result<Vec<u8>, RelayDecodeError> {
        let mut buffer = self.round_buffer();
        for cipher in ciphers {
            buffer.add_cipher(cipher)?;
        }
        self.decode(buffer)
    }

    /// Combines cells as received from the wire.
    pub fn combine_bytes(&self, cells: &[&[u8]]) -> Result<Vec<u8>, RelayDecodeError> {
        let mut buffer = self.round_buffer();
        for cell in cells {
            let cipher = DcNetCipher::from_bytes(cell, &self.layout)?;
            buffer.add_cipher(&cipher)?;
        }
        self.decode(buffer)
    }

    /// Recovers the payload from a filled buffer, checking equivocation contributions when
    /// enabled.
    pub fn decode(&self, buffer: RoundBuffer) -> Result<Vec<u8>, RelayDecodeError> {
        if buffer.ciphers == 0 {
            return Err(RelayDecodeError::NoCiphers);
        }

        let RoundBuffer {
            mut xor_buffer,
            equivocation_contributions,
            ciphers,
            ..
        } = buffer;

        if let Some(equivocation) = &self.equivocation {
            equivocation
                .relay_decode(&mut xor_buffer, &equivocation_contributions)
                .map_err(|err| match err {
                    EquivocationError::NonCanonicalTag => {
                        RelayDecodeError::Cipher(CipherError::InvalidEquivocationTag)
                    }
                    EquivocationError::Detected => {
                        warn!("equivocation detected after combining {} cells", ciphers);
                        RelayDecodeError::EquivocationDetected
                    }
                })?;
        }

        debug!("decoded round from {} cells", ciphers);
        Ok(xor_buffer)
    }

    /// Checks the disruption tag of a client cell. Always succeeds when disruption protection is
    /// disabled.
    pub fn verify_disruption(
        &self,
        client_id: EntityId,
        cipher: &DcNetCipher,
    ) -> Result<(), RelayDecodeError> {
        if !self.layout.disruption_protection() {
            return Ok(());
        }

        cipher.verify_disruption_tag(client_id).map_err(|err| {
            warn!("disruption tag of client {} failed: {}", client_id, err);
            RelayDecodeError::Cipher(err)
        })
    }
}

/// Cells of one round collected so far.
#[derive(Clone, Debug)]
pub struct RoundBuffer {
    xor_buffer: Vec<u8>,
    equivocation_contributions: Vec<EquivocationTag>,
    equivocation_protection: bool,
    ciphers: usize,
}

impl RoundBuffer {
    /// XORs the cell into the buffer and keeps its equivocation tag.
    pub fn add_cipher(&mut self, cipher: &DcNetCipher) -> Result<(), RelayDecodeError> {
        if cipher.payload().len() != self.xor_buffer.len() {
            return Err(RelayDecodeError::PayloadLengthMismatch {
                expected: self.xor_buffer.len(),
                actual: cipher.payload().len(),
            });
        }

        if self.equivocation_protection {
            let tag = cipher
                .equivocation_tag()
                .ok_or(CipherError::MissingEquivocationTag)?;
            self.equivocation_contributions.push(*tag);
        }

        for (byte, cell_byte) in self.xor_buffer.iter_mut().zip(cipher.payload()) {
            *byte ^= cell_byte;
        }
        self.ciphers += 1;

        Ok(())
    }

    /// Number of cells added.
    pub fn len(&self) -> usize {
        self.ciphers
    }

    pub fn is_empty(&self) -> bool {
        self.ciphers == 0
    }
}

#[derive(Debug, Error)]
pub enum RelayDecodeError {
    #[error("no cells to combine")]
    NoCiphers,

    #[error("cell payload has {actual} bytes, expected {expected}")]
    PayloadLengthMismatch { expected: usize, actual: usize },

    #[error("equivocation detected, combined cells do not match their commitments")]
    EquivocationDetected,

    #[error(transparent)]
    Cipher(#[from] CipherError),
}
