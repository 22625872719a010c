// SPDX-License-Identifier: MIT OR Apache-2.0

//! Fixtures for setting up a complete DC-net session in tests.
use crate::cipher::DcNetCipher;
use crate::config::DcNetConfig;
use crate::crypto::Rng;
use crate::crypto::x25519::SecretKey;
use crate::decoder::RelayDecoder;
use crate::entity::{DcNetEntity, EntityId, Role, RoundId};
use crate::pad::SharedSecret;
use crate::round_manager::RoundManager;

pub fn setup_logging() {
    if std::env::var("RUST_LOG").is_ok() {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .try_init();
    }
}

/// Clients, trustees and a relay of one session, with pairwise secrets agreed over X25519.
///
/// Clients get the ids `0..clients`, trustees follow and the relay gets the last id. Every client
/// orders its secrets by trustee and every trustee orders its secrets by client.
#[derive(Debug)]
pub struct TestNetwork {
    pub clients: Vec<RoundManager>,
    pub trustees: Vec<RoundManager>,
    pub relay: DcNetEntity,
}

impl TestNetwork {
    pub fn from_seed(
        seed: [u8; 32],
        clients: usize,
        trustees: usize,
        config: &DcNetConfig,
    ) -> Self {
        let rng = Rng::from_seed(seed);

        let client_keys: Vec<SecretKey> = (0..clients)
            .map(|_| SecretKey::from_rng(&rng).unwrap())
            .collect();
        let trustee_keys: Vec<SecretKey> = (0..trustees)
            .map(|_| SecretKey::from_rng(&rng).unwrap())
            .collect();

        let client_managers = client_keys
            .iter()
            .enumerate()
            .map(|(index, client_key)| {
                let secrets = trustee_keys
                    .iter()
                    .map(|trustee_key| {
                        SharedSecret::agree(client_key, &trustee_key.public_key()).unwrap()
                    })
                    .collect();
                RoundManager::new(index as EntityId, Role::Client, config, secrets).unwrap()
            })
            .collect();

        let trustee_managers = trustee_keys
            .iter()
            .enumerate()
            .map(|(index, trustee_key)| {
                let secrets = client_keys
                    .iter()
                    .map(|client_key| {
                        SharedSecret::agree(trustee_key, &client_key.public_key()).unwrap()
                    })
                    .collect();
                RoundManager::new(
                    (clients + index) as EntityId,
                    Role::Trustee,
                    config,
                    secrets,
                )
                .unwrap()
            })
            .collect();

        let relay =
            DcNetEntity::new((clients + trustees) as EntityId, Role::Relay, config, &[]).unwrap();

        Self {
            clients: client_managers,
            trustees: trustee_managers,
            relay,
        }
    }

    /// Encodes one round for everyone. `payloads` holds one entry per client.
    ///
    /// Returns the client cells followed by the trustee cells.
    pub fn encode_round(
        &mut self,
        round_id: RoundId,
        payloads: &[Option<&[u8]>],
    ) -> Vec<DcNetCipher> {
        assert_eq!(payloads.len(), self.clients.len());

        let mut ciphers = Vec::with_capacity(self.clients.len() + self.trustees.len());
        for (client, payload) in self.clients.iter_mut().zip(payloads) {
            ciphers.push(client.encode_for_round(round_id, *payload).unwrap());
        }
        for trustee in self.trustees.iter_mut() {
            ciphers.push(trustee.encode_for_round(round_id, None).unwrap());
        }
        ciphers
    }

    /// Folds the same downstream data into the history of everyone.
    pub fn update_history(&mut self, downstream: &[u8]) {
        for manager in self.clients.iter_mut().chain(self.trustees.iter_mut()) {
            manager.update_history(downstream);
        }
        self.relay.update_history(downstream);
    }

    pub fn decoder(&self) -> &RelayDecoder {
        self.relay
            .relay_decoder()
            .expect("relay entity holds a decoder")
    }
}
