//! `scbforceclose`: reads every `Single` record from a `channel.backup`
//! file, locates each channel's force-close commitment transaction on
//! chain, classifies its outputs, recovers whichever ones this tool can
//! (to-remote and anchor — to-local/HTLC outputs need a revocation
//! preimage or channel-DB context this command doesn't have), and sweeps
//! them to a single destination per backup entry.

use std::collections::HashMap;
use std::path::PathBuf;

use bitcoin::secp256k1::Secp256k1;
use bitcoin::{Amount, ScriptBuf};

use crate::backup::scb;
use crate::chain::{ChainApi, EsploraClient};
use crate::cli::seed_args::SeedArgs;
use crate::error::Result;
use crate::params::Params;
use crate::recover::{classify_outputs, commit::search_commit_output, OutputClass};
use crate::tx::SweepBuilder;

pub struct Args {
    pub backup_file: PathBuf,
    pub sweep_addr: String,
    pub fee_rate: u64,
    pub chain_api_url: Option<String>,
    pub publish: bool,
}

pub fn run(params: &Params, seed: &SeedArgs, args: Args) -> Result<()> {
    let secp = Secp256k1::new();
    let root = super::resolve_root(seed, params)?;
    let cache = super::key_cache(&secp, root, *params);

    let key = scb::backup_key(&cache)?;
    let raw = std::fs::read(&args.backup_file)?;
    let singles = scb::unpack(&raw, &key)?;

    let chain: Box<dyn ChainApi> = match &args.chain_api_url {
        Some(url) => Box::new(EsploraClient::new(url.clone(), params.network)?),
        None => Box::new(EsploraClient::default_for_network(params.network)?),
    };

    let destination = super::parse_address(&args.sweep_addr, params)?.script_pubkey();

    for single in &singles {
        let funding_info = chain.get_transaction(single.funding_outpoint.txid)?;
        let funding_vout = funding_info
            .vout
            .get(single.funding_outpoint.vout as usize)
            .ok_or_else(|| crate::error::Error::input("funding outpoint has no such vout"))?;
        let Some(commit_txid) = funding_vout.outspend.txid else {
            println!("{}: funding output not yet spent, nothing to sweep", single.funding_outpoint);
            continue;
        };

        let commit_info = chain.get_transaction(commit_txid)?;
        let outputs: Vec<(Amount, ScriptBuf)> = commit_info
            .vout
            .iter()
            .map(|v| -> Result<(Amount, ScriptBuf)> {
                Ok((v.value, ScriptBuf::from(hex::decode(&v.scriptpubkey_hex)?)))
            })
            .collect::<Result<_>>()?;

        let classes = classify_outputs(&secp, &single.remote_chan_cfg.payment_base, params, &outputs)?;

        let mut recovered = Vec::new();
        for (index, (class, (value, script))) in classes.iter().zip(outputs.iter()).enumerate() {
            let outpoint = bitcoin::OutPoint {
                txid: commit_txid,
                vout: index as u32,
            };
            match class {
                OutputClass::ToRemote => {
                    match search_commit_output(&secp, &cache, params, outpoint, *value, script, &[], crate::recover::commit::DEFAULT_NUM_KEYS) {
                        Ok(output) => recovered.push(output),
                        Err(e) => println!("{outpoint}: to_remote classified but unrecoverable: {e}"),
                    }
                }
                OutputClass::Anchor => {
                    match crate::recover::anchor::search_anchor_output(&secp, &cache, params, outpoint, *value, script, false) {
                        Ok(output) => recovered.push(output),
                        Err(_) => {
                            if let Ok(output) = crate::recover::anchor::search_anchor_output(
                                &secp, &cache, params, outpoint, *value, script, true,
                            ) {
                                recovered.push(output);
                            } else {
                                println!("{outpoint}: anchor classified but unrecoverable");
                            }
                        }
                    }
                }
                OutputClass::ToLocalOrHtlc => {
                    println!("{outpoint}: to_local/htlc output, needs a revocation preimage or channel DB — skipped");
                }
            }
        }

        if recovered.is_empty() {
            println!("{}: nothing recoverable", single.funding_outpoint);
            continue;
        }

        let mut builder = SweepBuilder::new(recovered.clone(), destination.clone(), args.fee_rate)?;
        builder.estimate()?;
        let secrets: Vec<_> = recovered
            .iter()
            .map(|o| cache.secret(o.key_descriptor.locator))
            .collect::<Result<_>>()?;
        builder.sign_all(&secp, &secrets, &HashMap::new())?;

        println!("{}:", single.funding_outpoint);
        super::finish_tx(params, args.publish, builder.transaction())?;
    }

    Ok(())
}
