// SPDX-License-Identifier: MIT OR Apache-2.0

use assert_matches::assert_matches;

use crate::cipher::{DcNetCipher, DisruptionTag};
use crate::config::DcNetConfig;
use crate::decoder::RelayDecodeError;
use crate::test_utils::{TestNetwork, setup_logging};

fn config(
    message_size: usize,
    equivocation_protection: bool,
    disruption_protection: bool,
) -> DcNetConfig {
    DcNetConfig {
        message_size,
        equivocation_protection,
        disruption_protection,
    }
}

fn padded(payload: &[u8], len: usize) -> Vec<u8> {
    let mut padded = payload.to_vec();
    padded.resize(len, 0);
    padded
}

fn bit(bytes: &[u8], bit_position: usize) -> bool {
    bytes[bit_position / 8] & (1 << (bit_position % 8)) != 0
}

#[test]
fn anonymous_hello() {
    setup_logging();

    // Two clients and one trustee.
    let mut network = TestNetwork::from_seed([1; 32], 2, 1, &config(16, false, false));
    let ciphers = network.encode_round(0, &[Some(b"HELLO"), None]);
    assert_eq!(ciphers.len(), 3);

    // No single cell carries the plaintext.
    for cipher in &ciphers {
        assert_ne!(cipher.payload(), &padded(b"HELLO", 16)[..]);
    }

    let decoded = network.decoder().combine(&ciphers).unwrap();
    assert_eq!(decoded, padded(b"HELLO", 16));
}

#[test]
fn idle_round_decodes_to_zeros() {
    setup_logging();

    let mut network = TestNetwork::from_seed([2; 32], 2, 3, &config(24, false, false));
    for round in 0..3 {
        let ciphers = network.encode_round(round, &[None, None]);
        assert_eq!(network.decoder().combine(&ciphers).unwrap(), vec![0; 24]);
    }
}

#[test]
fn skipped_rounds_stay_aligned() {
    setup_logging();

    let mut network = TestNetwork::from_seed([3; 32], 2, 2, &config(16, false, false));

    // Only the first client takes part in the early rounds, everyone else jumps to round 5.
    for round in 0..5 {
        network.clients[0].encode_for_round(round, None).unwrap();
    }
    assert_eq!(network.clients[0].current_round(), 5);
    assert_eq!(network.clients[1].current_round(), 0);

    let ciphers = network.encode_round(5, &[None, Some(b"late")]);
    for client in &network.clients {
        assert_eq!(client.current_round(), 6);
    }
    assert_eq!(
        network.decoder().combine(&ciphers).unwrap(),
        padded(b"late", 16)
    );
}

#[test]
fn stale_rounds_leave_session_intact() {
    setup_logging();

    let mut network = TestNetwork::from_seed([4; 32], 2, 1, &config(8, false, false));
    network.encode_round(0, &[None, None]);
    assert!(network.clients[0].encode_for_round(0, Some(b"again")).is_err());

    let ciphers = network.encode_round(1, &[Some(b"next"), None]);
    assert_eq!(
        network.decoder().combine(&ciphers).unwrap(),
        padded(b"next", 8)
    );
}

#[test]
fn wire_cells_with_disruption_protection() {
    setup_logging();

    let config = config(64, false, true);
    let mut network = TestNetwork::from_seed([5; 32], 3, 2, &config);
    let ciphers = network.encode_round(0, &[None, None, Some(b"signed cells")]);

    for (client_id, cipher) in ciphers.iter().take(3).enumerate() {
        assert!(cipher.disruption_tag().is_some());
        network
            .decoder()
            .verify_disruption(client_id as u32, cipher)
            .unwrap();
    }
    for cipher in ciphers.iter().skip(3) {
        assert!(cipher.disruption_tag().is_none());
    }

    let layout = network.decoder().layout().clone();
    let cells: Vec<Vec<u8>> = ciphers.iter().map(|cipher| cipher.to_bytes(&layout)).collect();
    for cell in &cells {
        assert_eq!(cell.len(), 64);
    }
    let cells: Vec<&[u8]> = cells.iter().map(Vec::as_slice).collect();

    let decoded = network.decoder().combine_bytes(&cells).unwrap();
    assert_eq!(decoded, padded(b"signed cells", 32));
}

#[test]
fn equivocation_protected_rounds() {
    setup_logging();

    let mut network = TestNetwork::from_seed([6; 32], 3, 2, &config(64, true, false));

    network.update_history(b"downstream of round 0");
    let ciphers = network.encode_round(0, &[None, None, Some(b"protected")]);
    for cipher in &ciphers {
        assert!(cipher.equivocation_tag().is_some());
    }
    assert_eq!(
        network.decoder().combine(&ciphers).unwrap(),
        padded(b"protected", 32)
    );

    network.update_history(&padded(b"protected", 32));
    let ciphers = network.encode_round(1, &[None, None, None]);
    assert_eq!(network.decoder().combine(&ciphers).unwrap(), vec![0; 32]);
}

#[test]
fn equivocating_relay_is_detected() {
    setup_logging();

    let mut network = TestNetwork::from_seed([7; 32], 2, 2, &config(64, true, false));
    network.update_history(b"what everybody saw");

    // The relay shows one trustee different downstream data.
    network.trustees[1].update_history(b"what only this trustee saw");

    let ciphers = network.encode_round(0, &[Some(b"secret"), None]);
    assert_matches!(
        network.decoder().combine(&ciphers),
        Err(RelayDecodeError::EquivocationDetected)
    );
}

#[test]
fn all_protections() {
    setup_logging();

    let config = config(100, true, true);
    let mut network = TestNetwork::from_seed([8; 32], 2, 3, &config);
    assert_eq!(network.clients[0].entity().payload_len(), 36);

    network.update_history(b"session start");
    let ciphers = network.encode_round(0, &[Some(b"both tags"), None]);

    let layout = network.decoder().layout().clone();
    let cells: Vec<Vec<u8>> = ciphers.iter().map(|cipher| cipher.to_bytes(&layout)).collect();
    let decoded_ciphers: Vec<DcNetCipher> = cells
        .iter()
        .map(|cell| DcNetCipher::from_bytes(cell, &layout).unwrap())
        .collect();
    assert_eq!(decoded_ciphers, ciphers);

    network
        .decoder()
        .verify_disruption(0, &decoded_ciphers[0])
        .unwrap();
    assert_eq!(
        network.decoder().combine(&decoded_ciphers).unwrap(),
        padded(b"both tags", 36)
    );
}

#[test]
fn trace_disruptor_with_revealed_bits() {
    setup_logging();

    let config = config(48, false, true);
    let mut network = TestNetwork::from_seed([9; 32], 3, 2, &config);
    let mut ciphers = network.encode_round(0, &[Some(b"honest"), None, None]);

    // Client 1 flips a bit of its cell and signs the jammed cell.
    let bit_position = 11;
    let mut jammed = ciphers[1].payload().to_vec();
    jammed[bit_position / 8] ^= 1 << (bit_position % 8);
    let tag = DisruptionTag::compute(1, &jammed);
    ciphers[1] = DcNetCipher::new(jammed, None, Some(tag));

    // The jammed cell still passes, the tag holds client 1 accountable for it.
    network.decoder().verify_disruption(1, &ciphers[1]).unwrap();

    let decoded = network.decoder().combine(&ciphers).unwrap();
    assert_ne!(decoded, padded(b"honest", 16));
    assert_ne!(
        bit(&decoded, bit_position),
        bit(&padded(b"honest", 16), bit_position)
    );

    // Everyone reveals the pad bits they used at the disrupted position.
    let client_bits: Vec<_> = network
        .clients
        .iter()
        .map(|client| client.reveal_bit(0, bit_position).unwrap())
        .collect();
    let trustee_bits: Vec<_> = network
        .trustees
        .iter()
        .map(|trustee| trustee.reveal_bit(0, bit_position).unwrap())
        .collect();

    // Both ends of every shared secret reveal the same bit.
    for (client, bits) in client_bits.iter().enumerate() {
        for (trustee, bit) in bits {
            assert_eq!(trustee_bits[*trustee][&client], *bit);
        }
    }

    // Removing the pad bits from each cell shows what every client transmitted.
    let transmitted: Vec<bool> = client_bits
        .iter()
        .enumerate()
        .map(|(client, bits)| {
            bits.values()
                .fold(bit(ciphers[client].payload(), bit_position), |acc, bit| {
                    acc ^ bit
                })
        })
        .collect();
    assert_eq!(
        transmitted,
        vec![bit(&padded(b"honest", 16), bit_position), true, false]
    );

    // Trustees did not cheat, their cells are exactly their pads.
    for (trustee, bits) in trustee_bits.iter().enumerate() {
        let pads = bits.values().fold(false, |acc, bit| acc ^ bit);
        assert_eq!(bit(ciphers[3 + trustee].payload(), bit_position), pads);
    }
}

#[test]
fn deterministic_sessions() {
    let config = config(16, false, false);
    let mut network_1 = TestNetwork::from_seed([10; 32], 2, 2, &config);
    let mut network_2 = TestNetwork::from_seed([10; 32], 2, 2, &config);

    // One session skips rounds, the other one encodes every round.
    for round in 0..3 {
        network_1.encode_round(round, &[None, None]);
    }
    assert_eq!(
        network_1.encode_round(3, &[Some(b"same"), None]),
        network_2.encode_round(3, &[Some(b"same"), None])
    );

    for bit_position in [0, 7, 64, 127] {
        for (client_1, client_2) in network_1.clients.iter().zip(network_2.clients.iter()) {
            assert_eq!(
                client_1.reveal_bit(3, bit_position).unwrap(),
                client_2.reveal_bit(3, bit_position).unwrap()
            );
        }
    }
}

#[test]
fn odd_payload_length() {
    setup_logging();

    // Payload length which does not line up with the 32-bit words of the keystream.
    let config = config(45, false, true);
    let mut network = TestNetwork::from_seed([11; 32], 3, 2, &config);
    assert_eq!(network.clients[0].entity().payload_len(), 13);

    let ciphers = network.encode_round(0, &[None, Some(b"odd"), None]);
    assert_eq!(
        network.decoder().combine(&ciphers).unwrap(),
        padded(b"odd", 13)
    );

    // One client encodes every round, the others jump ahead.
    for round in 1..4 {
        network.clients[2].encode_for_round(round, None).unwrap();
    }
    let ciphers = network.encode_round(4, &[Some(b"thirteen byte"), None, None]);
    assert_eq!(
        network.decoder().combine(&ciphers).unwrap(),
        b"thirteen byte".to_vec()
    );

    // Revealed bits match a byte-exact replay of the pad stream.
    let bits = network.clients[1].reveal_bit(3, 100).unwrap();
    let bits_of_trustee = network.trustees[0].reveal_bit(3, 100).unwrap();
    assert_eq!(bits[&0], bits_of_trustee[&1]);
}
