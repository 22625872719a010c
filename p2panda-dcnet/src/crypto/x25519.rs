// SPDX-License-Identifier: MIT OR Apache-2.0

//! X25519 Diffie-Hellman used to agree on the pairwise secrets between clients and trustees.
use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::crypto::{Rng, RngError, Secret};

/// 256-bit X25519 key size.
pub const X25519_KEY_SIZE: usize = 32;

/// X25519 secret key.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SecretKey(Secret<X25519_KEY_SIZE>);

impl SecretKey {
    pub fn from_bytes(bytes: [u8; X25519_KEY_SIZE]) -> Self {
        Self(Secret::from_bytes(bytes))
    }

    pub fn from_rng(rng: &Rng) -> Result<Self, X25519Error> {
        let bytes: [u8; X25519_KEY_SIZE] = rng.random_array()?;
        Ok(Self::from_bytes(bytes))
    }

    pub fn public_key(&self) -> PublicKey {
        let static_secret = x25519_dalek::StaticSecret::from(*self.0.as_bytes());
        PublicKey(x25519_dalek::PublicKey::from(&static_secret).to_bytes())
    }

    /// Diffie-Hellman between our secret key and the other party's public key.
    ///
    /// Fails when the result is all-zero which happens with low-order public keys.
    pub fn calculate_agreement(
        &self,
        their_public_key: &PublicKey,
    ) -> Result<[u8; X25519_KEY_SIZE], X25519Error> {
        let static_secret = x25519_dalek::StaticSecret::from(*self.0.as_bytes());
        let their_public_key = x25519_dalek::PublicKey::from(their_public_key.0);
        let shared = static_secret.diffie_hellman(&their_public_key);
        if !shared.was_contributory() {
            return Err(X25519Error::NonContributory);
        }
        Ok(shared.to_bytes())
    }
}

/// X25519 public key.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PublicKey(#[serde(with = "serde_bytes")] [u8; X25519_KEY_SIZE]);

impl PublicKey {
    pub fn from_bytes(bytes: [u8; X25519_KEY_SIZE]) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; X25519_KEY_SIZE] {
        &self.0
    }

    pub fn to_hex(self) -> String {
        hex::encode(self.as_bytes())
    }
}

impl fmt::Display for PublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}

#[derive(Debug, Error)]
pub enum X25519Error {
    #[error("diffie-hellman with a low-order public key")]
    NonContributory,

    #[error(transparent)]
    Rng(#[from] RngError),
}
