//! `derivekey`: derive a single key at an explicit BIP32 path and print
//! every representation a forensic user might need.

use bitcoin::bip32::Xpub;
use bitcoin::secp256k1::Secp256k1;

use crate::cli::seed_args::SeedArgs;
use crate::error::Result;
use crate::key::addresses::{p2pkh_addr, p2tr_addr, p2wkh_addr};
use crate::key::path::parse_path;
use crate::params::Params;

pub fn run(params: &Params, seed: &SeedArgs, path: &str, neuter: bool) -> Result<()> {
    let secp = Secp256k1::new();
    let root = super::resolve_root(seed, params)?;
    let derivation = parse_path(path)?;
    let derived = root
        .derive_priv(&secp, &derivation)
        .map_err(|e| crate::error::Error::derivation(e.to_string()))?;
    let pubkey = derived.private_key.public_key(&secp);
    let xpub = Xpub::from_priv(&secp, &derived);

    println!("path:    {path}");
    println!("network: {:?}", params.network);
    println!("pubkey:  {}", hex::encode(pubkey.serialize()));
    println!("xpub:    {xpub}");
    if !neuter {
        println!("xprv:    {derived}");
        let wif = bitcoin::PrivateKey::new(derived.private_key, params.network).to_wif();
        println!("wif:     {wif}");
    }
    println!("p2wkh:   {}", p2wkh_addr(&pubkey, params)?);
    println!("p2pkh:   {}", p2pkh_addr(&pubkey, params));
    println!("p2tr:    {}", p2tr_addr(&secp, &pubkey, params));
    Ok(())
}
