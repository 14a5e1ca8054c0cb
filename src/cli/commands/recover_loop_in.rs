//! `recoverloopin`: reconstruct and sweep a Loop-in HTLC timeout output.

use std::collections::HashMap;

use bitcoin::secp256k1::{PublicKey, Secp256k1};
use bitcoin::OutPoint;

use crate::chain::EsploraClient;
use crate::cli::seed_args::SeedArgs;
use crate::error::Result;
use crate::params::Params;
use crate::recover::loopin::{recover_loop_in, LoopSwapContract, SwapVersion};
use crate::tx::SweepBuilder;

pub struct Args {
    pub outpoint: OutPoint,
    pub server_key: PublicKey,
    pub payment_hash160: [u8; 20],
    pub cltv_expiry: u32,
    pub key_family: u32,
    pub sender_key_index: Option<u32>,
    pub htlc_version: SwapVersion,
    pub search_start: u32,
    pub num_tries: u32,
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

    let contract = LoopSwapContract {
        version: args.htlc_version,
        key_family: args.key_family,
        sender_key_index: args.sender_key_index,
        server_key: args.server_key,
        payment_hash160: args.payment_hash160,
        cltv_expiry: args.cltv_expiry,
    };

    let recovered = recover_loop_in(
        &secp,
        &cache,
        params,
        &contract,
        args.outpoint,
        prev_value,
        &prev_pk_script,
        args.search_start,
        args.num_tries,
    )?;

    println!(
        "matched key_locator={:?} cltv_expiry={:?}",
        recovered.key_descriptor.locator, recovered.required_locktime
    );

    let destination = super::parse_address(&args.sweep_addr, params)?.script_pubkey();
    let mut builder = SweepBuilder::new(vec![recovered.clone()], destination, args.fee_rate)?;
    builder.estimate()?;

    let secret = cache.secret(recovered.key_descriptor.locator)?;
    builder.sign_all(&secp, &[secret], &HashMap::new())?;

    super::finish_tx(params, args.publish, builder.transaction())
}
