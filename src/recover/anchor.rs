//! SR's anchor-output sweep: given an anchor address, iterate the funding
//! key family (P2WSH anchors use the multisig family; taproot anchors use
//! the payment-base family, since SIMPLE_TAPROOT channels move the anchor
//! key there) until the derived scriptPubKey matches.

use bitcoin::secp256k1::Secp256k1;
use bitcoin::{Amount, OutPoint, ScriptBuf};
use tracing::debug;

use crate::error::{Error, Result};
use crate::key::descriptor::KeyDescriptor;
use crate::key::locator::{KeyFamily, KeyLocator};
use crate::key::KeyCache;
use crate::params::Params;
use crate::script::anchor::{anchor_address, anchor_script, anchor_script_tree, anchor_taproot_address};

use super::types::{RecoveredOutput, ScriptKind, SpendMethod};

const MAX_INDEX: u32 = 1 << 15;
const PROGRESS_INTERVAL: u32 = 100;

pub fn search_anchor_output(
    secp: &Secp256k1<bitcoin::secp256k1::All>,
    cache: &KeyCache,
    params: &Params,
    outpoint: OutPoint,
    prev_value: Amount,
    prev_pk_script: &ScriptBuf,
    taproot: bool,
) -> Result<RecoveredOutput> {
    let family = if taproot {
        KeyFamily::PaymentBase
    } else {
        KeyFamily::MultiSig
    };

    for index in 0..MAX_INDEX {
        if index % PROGRESS_INTERVAL == 0 {
            debug!(index, taproot, "SR.anchor searching");
        }
        let locator = KeyLocator::new(family, index);
        let (_, pubkey) = cache.get(locator)?;

        if taproot {
            let addr = anchor_taproot_address(secp, &pubkey, params)?;
            if addr.script_pubkey() == *prev_pk_script {
                let info = anchor_script_tree(secp, &pubkey)?;
                return Ok(RecoveredOutput {
                    outpoint,
                    prev_value,
                    prev_pk_script: prev_pk_script.clone(),
                    witness_script: None,
                    script_tree: Some(info),
                    leaf_script: None,
                    key_descriptor: KeyDescriptor::new(locator, pubkey),
                    single_tweak: None,
                    spend_method: SpendMethod::TaprootScriptSpend,
                    script_kind: None,
                    required_locktime: None,
                    required_sequence: None,
                });
            }
        } else {
            let addr = anchor_address(&pubkey, params);
            if addr.script_pubkey() == *prev_pk_script {
                return Ok(RecoveredOutput {
                    outpoint,
                    prev_value,
                    prev_pk_script: prev_pk_script.clone(),
                    witness_script: Some(anchor_script(&pubkey)),
                    script_tree: None,
                    leaf_script: None,
                    key_descriptor: KeyDescriptor::new(locator, pubkey),
                    single_tweak: None,
                    spend_method: SpendMethod::WitnessV0,
                    script_kind: Some(ScriptKind::Anchor),
                    required_locktime: None,
                    required_sequence: None,
                });
            }
        }
    }

    Err(Error::SearchExhausted {
        target: hex::encode(prev_pk_script.as_bytes()),
        searched: MAX_INDEX as usize,
        ranges: format!("family {:?} index [0, {MAX_INDEX})", family),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use bitcoin::bip32::Xpriv;
    use bitcoin::Network;

    #[test]
    fn finds_segwit_anchor_output() {
        let secp = Secp256k1::new();
        let root = Xpriv::new_master(Network::Regtest, &[21u8; 64]).unwrap();
        let params = Params::regtest();
        let cache = KeyCache::new(&secp, root, params);

        let (_, pubkey) = cache.get(KeyLocator::new(KeyFamily::MultiSig, 9)).unwrap();
        let target = anchor_address(&pubkey, &params).script_pubkey();

        let result = search_anchor_output(
            &secp,
            &cache,
            &params,
            OutPoint::null(),
            Amount::from_sat(330),
            &target,
            false,
        )
        .unwrap();
        assert_eq!(result.key_descriptor.locator.index, 9);
        assert_eq!(result.spend_method, SpendMethod::WitnessV0);
    }
}
