//! `sweepremoteclosed`: brute-forces a single remote force-closed
//! commitment output (static-remote-key, tweakless, anchor, or taproot)
//! from the seed alone — no channel DB, no backup file — and sweeps it
//! directly, rather than writing a WIF file the way `rescueclosed` does.

use std::collections::HashMap;

use bitcoin::secp256k1::{PublicKey, Secp256k1};
use bitcoin::OutPoint;

use crate::chain::EsploraClient;
use crate::cli::seed_args::SeedArgs;
use crate::error::Result;
use crate::params::Params;
use crate::recover::commit::search_commit_output;
use crate::tx::SweepBuilder;

pub struct Args {
    pub outpoint: OutPoint,
    pub commit_point: Option<PublicKey>,
    pub num_keys: u32,
    pub sweep_addr: String,
    pub fee_rate: u64,
    pub publish: bool,
}

pub fn run(params: &Params, seed: &SeedArgs, args: Args) -> Result<()> {
    let secp = Secp256k1::new();
    let root = super::resolve_root(seed, params)?;
    let cache = super::key_cache(&secp, root, *params);

    let chain = EsploraClient::default_for_network(params.network)?;
    let (prev_value, prev_pk_script) = super::fetch_prevout(&chain, args.outpoint)?;

    let candidates: Vec<PublicKey> = args.commit_point.into_iter().collect();
    let recovered = search_commit_output(
        &secp,
        &cache,
        params,
        args.outpoint,
        prev_value,
        &prev_pk_script,
        &candidates,
        args.num_keys,
    )?;

    println!(
        "matched key_locator={:?} spend_method={:?}",
        recovered.key_descriptor.locator, recovered.spend_method
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
