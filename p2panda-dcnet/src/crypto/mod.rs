// SPDX-License-Identifier: MIT OR Apache-2.0

//! Cryptographic primitives used by the DC-net cipher engine.
pub mod hmac;
mod rng;
mod secret;
pub mod sha2;
pub mod x25519;

pub use rng::{Rng, RngError};
pub use secret::Secret;
