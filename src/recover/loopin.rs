//! SR.loopin: reconstructs a Loop-in HTLC timeout output. When the swap
//! contract carries the client's script-key locator directly the search is
//! a single candidate; when it doesn't (HTLCv2 swaps predating that field)
//! the index is brute-forced within `swap.key_family` until the timeout
//! script's scriptPubKey matches byte-for-byte — the same soundness
//! criterion SR uses everywhere else, standing in for running a full
//! script interpreter as a signing oracle.

use bitcoin::secp256k1::{PublicKey, Secp256k1};
use bitcoin::{Amount, OutPoint, ScriptBuf};
use tracing::debug;

use crate::error::{Error, Result};
use crate::key::descriptor::KeyDescriptor;
use crate::key::locator::KeyLocator;
use crate::key::KeyCache;
use crate::params::Params;
use crate::script::loopin::{htlc_v2_address, htlc_v3_spend_info};

use super::types::{RecoveredOutput, ScriptKind, SpendMethod};

const PROGRESS_INTERVAL: u32 = 100;

pub enum SwapVersion {
    HtlcV2,
    HtlcV3,
}

pub struct LoopSwapContract {
    pub version: SwapVersion,
    pub key_family: u32,
    pub sender_key_index: Option<u32>,
    pub server_key: PublicKey,
    pub payment_hash160: [u8; 20],
    pub cltv_expiry: u32,
}

pub fn recover_loop_in(
    secp: &Secp256k1<bitcoin::secp256k1::All>,
    cache: &KeyCache,
    params: &Params,
    contract: &LoopSwapContract,
    outpoint: OutPoint,
    prev_value: Amount,
    prev_pk_script: &ScriptBuf,
    search_start: u32,
    num_tries: u32,
) -> Result<RecoveredOutput> {
    let indices: Box<dyn Iterator<Item = u32>> = match contract.sender_key_index {
        Some(index) => Box::new(std::iter::once(index)),
        None => Box::new(search_start..search_start + num_tries),
    };

    for index in indices {
        if index % PROGRESS_INTERVAL == 0 {
            debug!(index, "SR.loopin searching");
        }
        let locator = KeyLocator::raw(contract.key_family, index);
        let (_, sender_key) = cache.get(locator)?;

        match contract.version {
            SwapVersion::HtlcV2 => {
                let addr = htlc_v2_address(
                    &sender_key,
                    &contract.server_key,
                    &contract.payment_hash160,
                    contract.cltv_expiry,
                    params,
                );
                if addr.script_pubkey() == *prev_pk_script {
                    return Ok(RecoveredOutput {
                        outpoint,
                        prev_value,
                        prev_pk_script: prev_pk_script.clone(),
                        witness_script: Some(crate::script::loopin::htlc_v2_script(
                            &sender_key,
                            &contract.server_key,
                            &contract.payment_hash160,
                            contract.cltv_expiry,
                        )),
                        script_tree: None,
                        leaf_script: None,
                        key_descriptor: KeyDescriptor::new(locator, sender_key),
                        single_tweak: None,
                        spend_method: SpendMethod::WitnessV0,
                        script_kind: Some(ScriptKind::LoopHtlcV2Timeout),
                        required_locktime: Some(contract.cltv_expiry),
                        required_sequence: None,
                    });
                }
            }
            SwapVersion::HtlcV3 => {
                let info = htlc_v3_spend_info(
                    secp,
                    &sender_key,
                    &contract.server_key,
                    &contract.payment_hash160,
                    contract.cltv_expiry,
                )?;
                let addr =
                    bitcoin::Address::p2tr(secp, info.internal_key(), info.merkle_root(), params.network);
                if addr.script_pubkey() == *prev_pk_script {
                    let (sender_xonly, _) = sender_key.x_only_public_key();
                    let leaf = crate::script::loopin::htlc_v3_timeout_leaf(
                        &sender_xonly,
                        contract.cltv_expiry,
                    );
                    return Ok(RecoveredOutput {
                        outpoint,
                        prev_value,
                        prev_pk_script: prev_pk_script.clone(),
                        witness_script: None,
                        script_tree: Some(info),
                        leaf_script: Some(leaf),
                        key_descriptor: KeyDescriptor::new(locator, sender_key),
                        single_tweak: None,
                        spend_method: SpendMethod::TaprootScriptSpend,
                        script_kind: None,
                        required_locktime: Some(contract.cltv_expiry),
                        required_sequence: None,
                    });
                }
            }
        }
    }

    Err(Error::SearchExhausted {
        target: hex::encode(prev_pk_script.as_bytes()),
        searched: num_tries as usize,
        ranges: format!(
            "family {} index [{}, {})",
            contract.key_family,
            search_start,
            search_start + num_tries
        ),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use bitcoin::bip32::Xpriv;
    use bitcoin::Network;

    #[test]
    fn brute_forces_htlc_v2_index() {
        let secp = Secp256k1::new();
        let root = Xpriv::new_master(Network::Regtest, &[13u8; 64]).unwrap();
        let params = Params::regtest();
        let cache = KeyCache::new(&secp, root, params);

        let server_key = PublicKey::from_secret_key(
            &secp,
            &bitcoin::secp256k1::SecretKey::from_slice(&[14u8; 32]).unwrap(),
        );
        let (_, sender_key) = cache.get(KeyLocator::raw(2, 37)).unwrap();
        let target = htlc_v2_address(&sender_key, &server_key, &[0u8; 20], 900_000, &params)
            .script_pubkey();

        let contract = LoopSwapContract {
            version: SwapVersion::HtlcV2,
            key_family: 2,
            sender_key_index: None,
            server_key,
            payment_hash160: [0u8; 20],
            cltv_expiry: 900_000,
        };

        let result = recover_loop_in(
            &secp,
            &cache,
            &params,
            &contract,
            OutPoint::null(),
            Amount::from_sat(40_000),
            &target,
            0,
            50,
        )
        .unwrap();
        assert_eq!(result.key_descriptor.locator.index, 37);
    }
}
