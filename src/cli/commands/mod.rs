//! One module per subcommand. Each exposes a `run` function (or an `Args`
//! struct plus `run`) that the dispatcher in [`super`] calls into.

pub mod close_pool_account;
pub mod derive_key;
pub mod pull_anchor;
pub mod recover_loop_in;
pub mod rescue_closed;
pub mod rescue_funding;
pub mod scb_force_close;
pub mod show_root_key;
pub mod sign_rescue_funding;
pub mod sweep_remote_closed;

use bitcoin::bip32::Xpriv;
use bitcoin::secp256k1::{All, Secp256k1};

use crate::cli::seed_args::SeedArgs;
use crate::error::Result;
use crate::key::cache::KeyCache;
use crate::params::Params;
use crate::seed;

/// Resolves `seed` into a root `Xpriv`, the common first step of every
/// command. Commands that only need standard (wallet) derivation stop
/// here; commands touching Lightning key families build a [`KeyCache`] on
/// top of it.
pub fn resolve_root(seed: &SeedArgs, params: &Params) -> Result<Xpriv> {
    let source = seed.resolve(params)?;
    let result = seed::read_seed(&source)?;
    result.root.as_xpriv().cloned()
}

pub fn key_cache<'a>(secp: &'a Secp256k1<All>, root: Xpriv, params: Params) -> KeyCache<'a> {
    KeyCache::new(secp, root, params)
}

/// Parses and network-checks a destination address string.
pub fn parse_address(s: &str, params: &Params) -> Result<bitcoin::Address> {
    let unchecked: bitcoin::Address<bitcoin::address::NetworkUnchecked> = s
        .parse()
        .map_err(|e| crate::error::Error::input(format!("bad address {s}: {e}")))?;
    unchecked
        .require_network(params.network)
        .map_err(|e| crate::error::Error::input(format!("address {s} wrong network: {e}")))
}

/// Prints a raw signed transaction as hex, the shared "print" output path
/// every sweep command falls back to when `--publish` isn't set.
pub fn print_raw_tx(tx: &bitcoin::Transaction) {
    use bitcoin::consensus::encode::serialize_hex;
    println!("{}", serialize_hex(tx));
}

pub fn publish_tx(chain: &dyn crate::chain::ChainApi, tx: &bitcoin::Transaction) -> Result<()> {
    use bitcoin::consensus::encode::serialize_hex;
    let txid = chain.publish_tx(&serialize_hex(tx))?;
    println!("published {txid}");
    Ok(())
}

/// Looks up a single previous output's value and scriptPubKey from the
/// chain API — every search function needs both and no command accepts
/// them as raw flags (a forensic user has the outpoint, not the script).
pub fn fetch_prevout(
    chain: &dyn crate::chain::ChainApi,
    outpoint: bitcoin::OutPoint,
) -> Result<(bitcoin::Amount, bitcoin::ScriptBuf)> {
    let info = chain.get_transaction(outpoint.txid)?;
    let vout = info
        .vout
        .get(outpoint.vout as usize)
        .ok_or_else(|| crate::error::Error::input(format!("{outpoint} has no such vout")))?;
    let bytes = hex::decode(&vout.scriptpubkey_hex)?;
    Ok((vout.value, bitcoin::ScriptBuf::from(bytes)))
}

/// Either publishes the signed transaction (when `publish` is set) or
/// prints it as raw hex — the shared final step of every sweep command.
pub fn finish_tx(
    params: &Params,
    publish: bool,
    tx: &bitcoin::Transaction,
) -> Result<()> {
    if publish {
        let chain = crate::chain::EsploraClient::default_for_network(params.network)?;
        publish_tx(&chain, tx)
    } else {
        print_raw_tx(tx);
        Ok(())
    }
}
