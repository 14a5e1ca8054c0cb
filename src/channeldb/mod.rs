//! Channel-database consumption. The on-disk format (a bbolt-equivalent
//! key/value store) stays an external collaborator per the Non-goals —
//! this module only defines the shape of already-parsed channel state and
//! a read-only iterator over it, plus a minimal in-memory test double.

use bitcoin::secp256k1::PublicKey;
use bitcoin::{Amount, OutPoint, Transaction};

use crate::key::descriptor::KeyDescriptor;

/// Which BOLT3 commitment-output family a channel was opened with —
/// drives which shape SR.commit matches against.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelType {
    Legacy,
    StaticRemoteKey,
    Anchors,
    AnchorsZeroFeeHtlcTx,
    ScriptEnforcedLease,
    SimpleTaproot,
}

/// One party's side of the channel: base-point key descriptors plus the
/// relative-locktime delay applied to their own commitment output.
#[derive(Debug, Clone)]
pub struct ChannelConfig {
    pub multi_sig: KeyDescriptor,
    pub revocation_base: KeyDescriptor,
    pub payment_base: KeyDescriptor,
    pub delay_base: KeyDescriptor,
    pub htlc_base: KeyDescriptor,
    pub csv_delay: u16,
}

/// Deterministic per-height revocation-preimage stream. The real
/// implementation is a shachain tree; this trait only exposes what SR
/// needs (the preimage at a given commitment height), so a test double can
/// back it with a plain lookup table.
pub trait RevocationProducer {
    fn preimage_at_height(&self, height: u64) -> Option<[u8; 32]>;
}

pub struct LocalCommitment {
    pub tx: Transaction,
    pub height: u64,
    pub signature: Vec<u8>,
}

/// Opaque channel state as the channel DB would hand it to this crate —
/// consumed, never produced.
pub struct ChannelState {
    pub funding_outpoint: OutPoint,
    pub capacity: Amount,
    pub is_initiator: bool,
    pub local_config: ChannelConfig,
    pub remote_config: ChannelConfig,
    pub local_commitment: LocalCommitment,
    pub remote_current_revocation: Option<PublicKey>,
    pub remote_next_revocation: Option<PublicKey>,
    pub channel_type: ChannelType,
}

/// Read-only iterator over every channel a DB holds. The real
/// implementation walks a bbolt-equivalent store under a single read
/// transaction; this crate only ever consumes the trait.
pub trait ChannelIterator {
    fn next_channel(&mut self) -> Option<ChannelState>;

    fn collect_all(mut self) -> Vec<ChannelState>
    where
        Self: Sized,
    {
        let mut out = Vec::new();
        while let Some(state) = self.next_channel() {
            out.push(state);
        }
        out
    }
}

/// An in-memory stand-in for the real channel DB, for unit tests that
/// need SR.funding's DB mode without a real store.
pub struct InMemoryChannelIterator {
    states: std::vec::IntoIter<ChannelState>,
}

impl InMemoryChannelIterator {
    pub fn new(states: Vec<ChannelState>) -> Self {
        InMemoryChannelIterator {
            states: states.into_iter(),
        }
    }
}

impl ChannelIterator for InMemoryChannelIterator {
    fn next_channel(&mut self) -> Option<ChannelState> {
        self.states.next()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::key::locator::{KeyFamily, KeyLocator};
    use bitcoin::absolute::LockTime;
    use bitcoin::secp256k1::{Secp256k1, SecretKey};
    use bitcoin::transaction::Version;

    fn test_descriptor(family: KeyFamily, index: u32, byte: u8) -> KeyDescriptor {
        let secp = Secp256k1::new();
        let secret = SecretKey::from_slice(&[byte; 32]).unwrap();
        let pubkey = PublicKey::from_secret_key(&secp, &secret);
        KeyDescriptor::new(KeyLocator::new(family, index), pubkey)
    }

    fn sample_state() -> ChannelState {
        let config = ChannelConfig {
            multi_sig: test_descriptor(KeyFamily::MultiSig, 0, 1),
            revocation_base: test_descriptor(KeyFamily::RevocationBase, 0, 2),
            payment_base: test_descriptor(KeyFamily::PaymentBase, 0, 3),
            delay_base: test_descriptor(KeyFamily::DelayBase, 0, 4),
            htlc_base: test_descriptor(KeyFamily::HtlcBase, 0, 5),
            csv_delay: 144,
        };
        ChannelState {
            funding_outpoint: OutPoint::null(),
            capacity: Amount::from_sat(1_000_000),
            is_initiator: true,
            local_config: config.clone(),
            remote_config: config,
            local_commitment: LocalCommitment {
                tx: Transaction {
                    version: Version::TWO,
                    lock_time: LockTime::ZERO,
                    input: vec![],
                    output: vec![],
                },
                height: 0,
                signature: vec![],
            },
            remote_current_revocation: None,
            remote_next_revocation: None,
            channel_type: ChannelType::Anchors,
        }
    }

    #[test]
    fn in_memory_iterator_yields_every_state_once() {
        let mut iter = InMemoryChannelIterator::new(vec![sample_state(), sample_state()]);
        assert!(iter.next_channel().is_some());
        assert!(iter.next_channel().is_some());
        assert!(iter.next_channel().is_none());
    }

    #[test]
    fn collect_all_drains_the_iterator() {
        let iter = InMemoryChannelIterator::new(vec![sample_state()]);
        let states = iter.collect_all();
        assert_eq!(states.len(), 1);
    }
}
