//! `pullanchor`: pulls one or more anchor outputs plus an already-owned
//! "sponsor" UTXO into a single CPFP transaction, producing a base64 PSBT
//! ready for finalization (rather than broadcasting directly — anchor
//! sweeps are typically bundled with other fee-bumping tooling).

use std::collections::HashMap;

use bitcoin::secp256k1::{PublicKey, Secp256k1};
use bitcoin::{Amount, OutPoint};

use crate::chain::{ChainApi, EsploraClient};
use crate::cli::seed_args::SeedArgs;
use crate::error::Result;
use crate::key::addresses::p2wkh_addr;
use crate::key::descriptor::KeyDescriptor;
use crate::key::extended::derive_path;
use crate::key::locator::KeyLocator;
use crate::key::path::wallet_default_path;
use crate::params::Params;
use crate::recover::anchor::search_anchor_output;
use crate::recover::types::{RecoveredOutput, ScriptKind, SpendMethod};
use crate::tx::{psbt, SweepBuilder};

pub struct Args {
    pub sponsor_outpoint: OutPoint,
    pub sponsor_value: Amount,
    pub anchor_addrs: Vec<String>,
    pub taproot: bool,
    pub change_addr: String,
    pub fee_rate: u64,
}

/// A locator family id reserved for wallet-derived (not Lightning-family)
/// keys, so sponsor inputs still carry a `KeyDescriptor` for PSBT
/// metadata even though they aren't looked up through the [`KeyCache`].
const WALLET_SPONSOR_FAMILY: u32 = u32::MAX;

pub fn run(params: &Params, seed: &SeedArgs, args: Args) -> Result<()> {
    let secp = Secp256k1::new();
    let root = super::resolve_root(seed, params)?;
    let cache = super::key_cache(&secp, root, *params);

    let chain = EsploraClient::default_for_network(params.network)?;

    let sponsor_path = wallet_default_path(params, false, 0)?;
    let root_key = crate::key::ExtendedKey::from_xpriv(root);
    let sponsor_xpriv = *derive_path(&secp, &root_key, &sponsor_path)?.as_xpriv()?;
    let sponsor_secret = sponsor_xpriv.private_key;
    let sponsor_pubkey = PublicKey::from_secret_key(&secp, &sponsor_secret);
    let sponsor_script = p2wkh_addr(&sponsor_pubkey, params)?.script_pubkey();

    let sponsor_output = RecoveredOutput {
        outpoint: args.sponsor_outpoint,
        prev_value: args.sponsor_value,
        prev_pk_script: sponsor_script,
        witness_script: None,
        script_tree: None,
        leaf_script: None,
        key_descriptor: KeyDescriptor::new(KeyLocator::raw(WALLET_SPONSOR_FAMILY, 0), sponsor_pubkey),
        single_tweak: None,
        spend_method: SpendMethod::WitnessV0,
        script_kind: Some(ScriptKind::P2wkh),
        required_locktime: None,
        required_sequence: None,
    };

    let mut outputs = vec![sponsor_output];
    let mut secrets = vec![sponsor_secret];

    for addr_str in &args.anchor_addrs {
        let addr = super::parse_address(addr_str, params)?;
        let outpoint = chain.get_outpoint(&addr)?;
        let utxos = chain.get_unspent(&addr)?;
        let value = utxos
            .first()
            .map(|u| u.value)
            .ok_or_else(|| crate::error::Error::input(format!("no unspent output at {addr_str}")))?;
        let script = addr.script_pubkey();

        let recovered = search_anchor_output(&secp, &cache, params, outpoint, value, &script, args.taproot)?;
        secrets.push(cache.secret(recovered.key_descriptor.locator)?);
        outputs.push(recovered);
    }

    let destination = super::parse_address(&args.change_addr, params)?.script_pubkey();
    let mut builder = SweepBuilder::new(outputs.clone(), destination, args.fee_rate)?;
    let unsigned_tx = builder.estimate()?.clone();

    let mut psbt = psbt::build_psbt(unsigned_tx, &outputs)?;
    builder.sign_all(&secp, &secrets, &HashMap::new())?;
    for (index, tx_in) in builder.transaction().input.iter().enumerate() {
        psbt.inputs[index].final_script_witness = Some(tx_in.witness.clone());
    }

    println!("{}", psbt::to_base64(&psbt));
    Ok(())
}
