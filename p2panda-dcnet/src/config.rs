// SPDX-License-Identifier: MIT OR Apache-2.0

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::cipher::{DISRUPTION_TAG_SIZE, EQUIVOCATION_TAG_SIZE};

/// Default size of one DC-net cell on the wire, in bytes.
pub const DEFAULT_MESSAGE_SIZE: usize = 1000;

/// Session-wide DC-net parameters.
///
/// All clients, trustees and the relay of one session need to use the same configuration,
/// otherwise cells will have different lengths and pads will not cancel out.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DcNetConfig {
    /// Total size of one cell on the wire, including the space reserved for tags.
    pub message_size: usize,

    /// Attach a commitment tag to each cell so that relay equivocation gets detected.
    pub equivocation_protection: bool,

    /// Attach a keyed integrity tag to each client cell so that jamming can be attributed.
    pub disruption_protection: bool,
}

impl Default for DcNetConfig {
    fn default() -> Self {
        Self {
            message_size: DEFAULT_MESSAGE_SIZE,
            equivocation_protection: false,
            disruption_protection: false,
        }
    }
}

impl DcNetConfig {
    /// Bytes of each cell reserved for tags.
    pub fn overhead(&self) -> usize {
        let mut overhead = 0;
        if self.equivocation_protection {
            overhead += EQUIVOCATION_TAG_SIZE;
        }
        if self.disruption_protection {
            overhead += DISRUPTION_TAG_SIZE;
        }
        overhead
    }

    /// Bytes of each cell left for the payload.
    pub fn payload_len(&self) -> Result<usize, ConfigError> {
        match self.message_size.checked_sub(self.overhead()) {
            Some(len) if len > 0 => Ok(len),
            _ => Err(ConfigError::NoPayloadCapacity {
                message_size: self.message_size,
                overhead: self.overhead(),
            }),
        }
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("message size of {message_size} bytes leaves no room for payload after {overhead} bytes of tags")]
    NoPayloadCapacity { message_size: usize, overhead: usize },

    #[error("relay does not take part in the dc-net and can not hold shared secrets")]
    UnexpectedSharedSecrets,

    #[error("clients and trustees need at least one shared secret")]
    MissingSharedSecrets,
}
