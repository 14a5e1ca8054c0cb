//! `rescuefunding`: builds a base64 PSBT spending a channel's funding
//! multisig output to a sweep address, with our half of the 2-of-2
//! signature already attached, for the channel counterparty to co-sign
//! with `signrescuefunding`.

use bitcoin::hashes::Hash;
use bitcoin::secp256k1::{PublicKey, Secp256k1};
use bitcoin::sighash::EcdsaSighashType;
use bitcoin::{Amount, OutPoint};

use crate::chain::EsploraClient;
use crate::cli::seed_args::SeedArgs;
use crate::error::{Error, Result};
use crate::params::Params;
use crate::recover::funding::{recover_from_channel_state, recover_with_known_index, MAX_CHANNEL_LOOKUP};
use crate::recover::RecoveredOutput;
use crate::tx::{psbt, SweepBuilder};

pub struct Args {
    pub outpoint: OutPoint,
    pub local_index: Option<u32>,
    pub remote_pubkey: PublicKey,
    pub sweep_addr: String,
    pub fee_rate: u64,
    pub value_sat: u64,
}

pub fn run(params: &Params, seed: &SeedArgs, args: Args) -> Result<()> {
    let secp = Secp256k1::new();
    let root = super::resolve_root(seed, params)?;
    let cache = super::key_cache(&secp, root, *params);
    let prev_value = Amount::from_sat(args.value_sat);

    let recovered = recover_funding_output(
        &cache,
        params,
        args.outpoint,
        prev_value,
        &args.remote_pubkey,
        args.local_index,
    )?;

    println!(
        "matched local multisig index={}",
        recovered.key_descriptor.locator.index
    );

    let destination = super::parse_address(&args.sweep_addr, params)?.script_pubkey();
    let mut builder = SweepBuilder::new(vec![recovered.clone()], destination, args.fee_rate)?;
    let tx = builder.estimate()?.clone();

    let mut psbt = psbt::build_psbt(tx, &[recovered.clone()])?;
    let our_secret = cache.secret(recovered.key_descriptor.locator)?;
    let our_pubkey = PublicKey::from_secret_key(&secp, &our_secret);

    let witness_script = recovered
        .witness_script
        .as_ref()
        .ok_or_else(|| Error::input("funding multisig output has no witness script"))?;
    let digest = {
        let mut sighash_cache = bitcoin::sighash::SighashCache::new(&psbt.unsigned_tx);
        sighash_cache
            .segwit_v0_signature_hash(0, witness_script, prev_value, EcdsaSighashType::All)
            .map_err(|e| Error::Signing(e.to_string()))?
    };
    let message = bitcoin::secp256k1::Message::from_digest(digest.to_byte_array());
    let sig = secp.sign_ecdsa(&message, &our_secret);
    psbt::insert_partial_signature(&mut psbt, 0, our_pubkey, sig)?;

    println!("{}", psbt::to_base64(&psbt));
    Ok(())
}

/// DB mode would supply both indices already, so only the no-DB modes
/// `rescuefunding` offers as a CLI command apply here: a known local
/// index hint, or a brute force over it when the hint is absent.
fn recover_funding_output(
    cache: &crate::key::KeyCache,
    params: &Params,
    outpoint: OutPoint,
    prev_value: Amount,
    remote_pubkey: &PublicKey,
    local_index: Option<u32>,
) -> Result<RecoveredOutput> {
    if let Some(index) = local_index {
        return recover_from_channel_state(cache, params, index, remote_pubkey, outpoint, prev_value);
    }

    let chain = EsploraClient::default_for_network(params.network)?;
    let (_, prev_pk_script) = super::fetch_prevout(&chain, outpoint)?;

    for index in 0..MAX_CHANNEL_LOOKUP {
        if let Ok(candidate) = recover_with_known_index(
            cache,
            params,
            index,
            remote_pubkey,
            outpoint,
            prev_value,
            &prev_pk_script,
        ) {
            return Ok(candidate);
        }
    }

    Err(Error::SearchExhausted {
        target: hex::encode(prev_pk_script.as_bytes()),
        searched: MAX_CHANNEL_LOOKUP as usize,
        ranges: format!("local multisig index [0, {MAX_CHANNEL_LOOKUP})"),
    })
}
