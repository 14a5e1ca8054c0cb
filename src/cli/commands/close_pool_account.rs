//! `closepoolaccount`: brute-force an expired Pool trader account and
//! sweep it back to the wallet.

use std::collections::HashMap;

use bitcoin::secp256k1::{PublicKey, Secp256k1};
use bitcoin::OutPoint;

use crate::chain::EsploraClient;
use crate::cli::seed_args::SeedArgs;
use crate::error::Result;
use crate::params::Params;
use crate::recover::pool::{search_pool_account, PoolSearchWindow};
use crate::tx::SweepBuilder;

pub struct Args {
    pub outpoint: OutPoint,
    pub auctioneer_pubkey: PublicKey,
    pub sweep_addr: String,
    pub fee_rate: u64,
    pub min_expiry: u32,
    pub max_blocks: u32,
    pub max_accounts: u32,
    pub max_batch_keys: u32,
    pub publish: bool,
}

pub fn run(params: &Params, seed: &SeedArgs, args: Args) -> Result<()> {
    let secp = Secp256k1::new();
    let root = super::resolve_root(seed, params)?;
    let cache = super::key_cache(&secp, root, *params);

    let chain = EsploraClient::default_for_network(params.network)?;
    let (prev_value, prev_pk_script) = super::fetch_prevout(&chain, args.outpoint)?;

    let window = PoolSearchWindow {
        min_expiry: args.min_expiry,
        max_blocks: args.max_blocks,
        max_accounts: args.max_accounts,
        max_batch_keys: args.max_batch_keys,
    };

    let (recovered, version) = search_pool_account(
        &secp,
        &cache,
        params,
        &args.auctioneer_pubkey,
        args.outpoint,
        prev_value,
        &prev_pk_script,
        &window,
    )?;

    println!(
        "matched account_index={} expiry={:?} spend_method={:?} version={version:?}",
        recovered.key_descriptor.locator.index, recovered.required_locktime, recovered.spend_method
    );

    let destination = super::parse_address(&args.sweep_addr, params)?.script_pubkey();
    let mut builder = SweepBuilder::new(vec![recovered.clone()], destination, args.fee_rate)?;
    builder.estimate()?;

    let base_secret = cache.secret(recovered.key_descriptor.locator)?;
    let secret = match recovered.single_tweak {
        Some(tweak) => base_secret
            .add_tweak(&tweak)
            .map_err(|e| crate::error::Error::derivation(e.to_string()))?,
        None => base_secret,
    };
    builder.sign_all(&secp, &[secret], &HashMap::new())?;

    super::finish_tx(params, args.publish, builder.transaction())
}
