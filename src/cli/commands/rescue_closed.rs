//! `rescueclosed`: brute-force a single force-closed commitment output and
//! write its spending WIF to a timestamped results file, rather than
//! building a transaction directly — the counterparty's channel may
//! already be closed by the time a user runs this, so a wallet-importable
//! WIF is the more durable artifact.

use std::path::PathBuf;

use bitcoin::secp256k1::{PublicKey, Secp256k1};
use bitcoin::OutPoint;
use serde::Serialize;

use crate::chain::EsploraClient;
use crate::cli::seed_args::SeedArgs;
use crate::error::Result;
use crate::logscrape::extract_commit_points;
use crate::params::Params;
use crate::recover::commit::search_commit_output;

pub struct Args {
    pub addr: String,
    pub outpoint: OutPoint,
    pub commit_point: Option<PublicKey>,
    pub logfile: Option<PathBuf>,
    pub num_keys: u32,
    pub out_dir: PathBuf,
}

#[derive(Serialize)]
struct SweepRecord {
    address: String,
    outpoint: String,
    key_family: u32,
    key_index: u32,
    wif: String,
}

pub fn run(params: &Params, seed: &SeedArgs, args: Args) -> Result<()> {
    let secp = Secp256k1::new();
    let root = super::resolve_root(seed, params)?;
    let cache = super::key_cache(&secp, root, *params);

    let chain = EsploraClient::default_for_network(params.network)?;
    let (prev_value, prev_pk_script) = super::fetch_prevout(&chain, args.outpoint)?;

    let mut candidates: Vec<PublicKey> = Vec::new();
    if let Some(pt) = args.commit_point {
        candidates.push(pt);
    }
    if let Some(path) = &args.logfile {
        let text = std::fs::read_to_string(path)?;
        candidates.extend(extract_commit_points(&text));
    }

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

    let base_secret = cache.secret(recovered.key_descriptor.locator)?;
    let spend_secret = match recovered.single_tweak {
        Some(tweak) => base_secret
            .add_tweak(&tweak)
            .map_err(|e| crate::error::Error::derivation(e.to_string()))?,
        None => base_secret,
    };
    let wif = bitcoin::PrivateKey::new(spend_secret, params.network).to_wif();

    let record = SweepRecord {
        address: args.addr,
        outpoint: args.outpoint.to_string(),
        key_family: recovered.key_descriptor.locator.family,
        key_index: recovered.key_descriptor.locator.index,
        wif,
    };

    std::fs::create_dir_all(&args.out_dir)?;
    let stamp = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0);
    let out_path = args.out_dir.join(format!("rescueclosed-{stamp}.json"));
    std::fs::write(&out_path, serde_json::to_vec_pretty(&[record])?)?;

    println!("wrote {}", out_path.display());
    Ok(())
}
