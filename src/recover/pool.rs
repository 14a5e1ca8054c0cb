//! SR.pool: recovers an expired Pool account's spending key and script by
//! walking `(account_index, batch_key_index, expiry_block)` and, for each
//! combination, testing all three script generations. The account loop is
//! outermost because it drives the expensive ECDH shared-key computation;
//! batch key and expiry are cheap EC additions and comparisons by contrast.

use bitcoin::secp256k1::{PublicKey, Secp256k1};
use bitcoin::ScriptBuf;
use tracing::debug;

use crate::error::{Error, Result};
use crate::key::locator::{KeyFamily, KeyLocator};
use crate::key::KeyCache;
use crate::params::Params;
use crate::script::pool::{
    batch_key_at_index, segwit_expiry_address, shared_key, taproot_spend_info,
    taproot_spend_info_v040, trader_tweak, tweaked_auctioneer_key, tweaked_trader_key,
    PoolScriptVersion,
};

use super::types::{RecoveredOutput, ScriptKind, SpendMethod};

pub struct PoolSearchWindow {
    pub min_expiry: u32,
    pub max_blocks: u32,
    pub max_accounts: u32,
    pub max_batch_keys: u32,
}

const PROGRESS_INTERVAL: u32 = 100;

/// Returns the matched output together with which on-chain generation of
/// the script it was matched against, so callers can report it.
pub fn search_pool_account(
    secp: &Secp256k1<bitcoin::secp256k1::All>,
    cache: &KeyCache,
    params: &Params,
    auctioneer_pubkey: &PublicKey,
    outpoint: bitcoin::OutPoint,
    prev_value: bitcoin::Amount,
    prev_pk_script: &ScriptBuf,
    window: &PoolSearchWindow,
) -> Result<(RecoveredOutput, PoolScriptVersion)> {
    for account_index in 0..window.max_accounts {
        let locator = KeyLocator::new(KeyFamily::PoolAccount, account_index);
        let (trader_secret, trader_pub) = cache.get(locator)?;
        let shared = shared_key(&trader_secret, auctioneer_pubkey);

        for batch_key_index in 0..window.max_batch_keys {
            if batch_key_index % PROGRESS_INTERVAL == 0 {
                debug!(account_index, batch_key_index, "SR.pool searching");
            }
            let batch_key = batch_key_at_index(secp, batch_key_index)?;
            let tweak = trader_tweak(&shared, &batch_key, &trader_pub)?;
            let tweaked_trader = tweaked_trader_key(secp, &trader_pub, &tweak)?;
            let tweaked_auctioneer = tweaked_auctioneer_key(secp, auctioneer_pubkey, &tweak)?;

            for expiry in window.min_expiry..window.min_expiry + window.max_blocks {
                let segwit_addr =
                    segwit_expiry_address(&tweaked_trader, &tweaked_auctioneer, expiry, params);
                if segwit_addr.script_pubkey() == *prev_pk_script {
                    let output = RecoveredOutput {
                        outpoint,
                        prev_value,
                        prev_pk_script: prev_pk_script.clone(),
                        witness_script: Some(crate::script::pool::segwit_expiry_script(
                            &tweaked_trader,
                            &tweaked_auctioneer,
                            expiry,
                        )),
                        script_tree: None,
                        leaf_script: None,
                        key_descriptor: crate::key::descriptor::KeyDescriptor::new(
                            locator,
                            tweaked_trader,
                        ),
                        single_tweak: Some(tweak),
                        spend_method: SpendMethod::WitnessV0,
                        script_kind: Some(ScriptKind::PoolSegwitExpiry),
                        required_locktime: Some(expiry),
                        required_sequence: None,
                    };
                    return Ok((output, PoolScriptVersion::SegwitV0));
                }

                // The two taproot generations aggregate `(auctioneer,
                // tweaked_trader)` differently (BIP327 33-byte compressed
                // vs. the pre-BIP327 v0.4.0 32-byte x-only scheme) and so
                // produce distinct aggregate keys; both must be probed.
                for (info, version) in [
                    (
                        taproot_spend_info(secp, auctioneer_pubkey, &tweaked_trader, expiry)?,
                        PoolScriptVersion::TaprootMuSig2V100RC2,
                    ),
                    (
                        taproot_spend_info_v040(secp, auctioneer_pubkey, &tweaked_trader, expiry)?,
                        PoolScriptVersion::TaprootMuSig2V040,
                    ),
                ] {
                    let addr = bitcoin::Address::p2tr(
                        secp,
                        info.internal_key(),
                        info.merkle_root(),
                        params.network,
                    );
                    if addr.script_pubkey() == *prev_pk_script {
                        let leaf = crate::script::pool::taproot_expiry_leaf(
                            &tweaked_trader.x_only_public_key().0,
                            expiry,
                        );
                        let output = RecoveredOutput {
                            outpoint,
                            prev_value,
                            prev_pk_script: prev_pk_script.clone(),
                            witness_script: None,
                            script_tree: Some(info),
                            leaf_script: Some(leaf),
                            key_descriptor: crate::key::descriptor::KeyDescriptor::new(
                                locator,
                                tweaked_trader,
                            ),
                            single_tweak: Some(tweak),
                            spend_method: SpendMethod::TaprootScriptSpend,
                            script_kind: None,
                            required_locktime: Some(expiry),
                            required_sequence: None,
                        };
                        return Ok((output, version));
                    }
                }
            }
        }
    }

    Err(Error::SearchExhausted {
        target: hex::encode(prev_pk_script.as_bytes()),
        searched: (window.max_accounts as usize)
            * (window.max_batch_keys as usize)
            * (window.max_blocks as usize),
        ranges: format!(
            "accounts [0,{}) x batch_keys [0,{}) x expiry [{},{})",
            window.max_accounts,
            window.max_batch_keys,
            window.min_expiry,
            window.min_expiry + window.max_blocks
        ),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use bitcoin::bip32::Xpriv;
    use bitcoin::{Amount, Network, OutPoint};

    #[test]
    fn finds_segwit_pool_expiry_script() {
        let secp = Secp256k1::new();
        let root = Xpriv::new_master(Network::Regtest, &[11u8; 64]).unwrap();
        let params = Params::regtest();
        let cache = KeyCache::new(&secp, root, params);

        let auctioneer_secret = bitcoin::secp256k1::SecretKey::from_slice(&[22u8; 32]).unwrap();
        let auctioneer_pub = PublicKey::from_secret_key(&secp, &auctioneer_secret);

        let locator = KeyLocator::new(KeyFamily::PoolAccount, 2);
        let (trader_secret, trader_pub) = cache.get(locator).unwrap();
        let shared = shared_key(&trader_secret, &auctioneer_pub);
        let batch_key = batch_key_at_index(&secp, 3).unwrap();
        let tweak = trader_tweak(&shared, &batch_key, &trader_pub).unwrap();
        let tweaked_trader = tweaked_trader_key(&secp, &trader_pub, &tweak).unwrap();
        let tweaked_auctioneer = tweaked_auctioneer_key(&secp, &auctioneer_pub, &tweak).unwrap();
        let target = segwit_expiry_address(&tweaked_trader, &tweaked_auctioneer, 2065, &params)
            .script_pubkey();

        let window = PoolSearchWindow {
            min_expiry: 2060,
            max_blocks: 20,
            max_accounts: 5,
            max_batch_keys: 10,
        };
        let (result, version) = search_pool_account(
            &secp,
            &cache,
            &params,
            &auctioneer_pub,
            OutPoint::null(),
            Amount::from_sat(100_000),
            &target,
            &window,
        )
        .unwrap();
        assert_eq!(result.required_locktime, Some(2065));
        assert_eq!(result.spend_method, SpendMethod::WitnessV0);
        assert_eq!(version, PoolScriptVersion::SegwitV0);
    }

    #[test]
    fn finds_taproot_v040_pool_expiry_script() {
        let secp = Secp256k1::new();
        let root = Xpriv::new_master(Network::Regtest, &[12u8; 64]).unwrap();
        let params = Params::regtest();
        let cache = KeyCache::new(&secp, root, params);

        let auctioneer_secret = bitcoin::secp256k1::SecretKey::from_slice(&[23u8; 32]).unwrap();
        let auctioneer_pub = PublicKey::from_secret_key(&secp, &auctioneer_secret);

        let locator = KeyLocator::new(KeyFamily::PoolAccount, 1);
        let (trader_secret, trader_pub) = cache.get(locator).unwrap();
        let shared = shared_key(&trader_secret, &auctioneer_pub);
        let batch_key = batch_key_at_index(&secp, 4).unwrap();
        let tweak = trader_tweak(&shared, &batch_key, &trader_pub).unwrap();
        let tweaked_trader = tweaked_trader_key(&secp, &trader_pub, &tweak).unwrap();

        let info =
            crate::script::pool::taproot_spend_info_v040(&secp, &auctioneer_pub, &tweaked_trader, 3005)
                .unwrap();
        let target =
            bitcoin::Address::p2tr(&secp, info.internal_key(), info.merkle_root(), params.network)
                .script_pubkey();

        let window = PoolSearchWindow {
            min_expiry: 3000,
            max_blocks: 20,
            max_accounts: 5,
            max_batch_keys: 10,
        };
        let (result, version) = search_pool_account(
            &secp,
            &cache,
            &params,
            &auctioneer_pub,
            OutPoint::null(),
            Amount::from_sat(100_000),
            &target,
            &window,
        )
        .unwrap();
        assert_eq!(result.required_locktime, Some(3005));
        assert_eq!(result.spend_method, SpendMethod::TaprootScriptSpend);
        assert_eq!(version, PoolScriptVersion::TaprootMuSig2V040);
    }
}
