//! `signrescuefunding`: the channel counterparty's half of the
//! `rescuefunding` PSBT round-trip — attaches our own signature, finalizes
//! the 2-of-2 witness, and prints the final raw transaction.

use bitcoin::hashes::Hash;
use bitcoin::secp256k1::{PublicKey, Secp256k1};
use bitcoin::sighash::EcdsaSighashType;

use crate::cli::seed_args::SeedArgs;
use crate::error::{Error, Result};
use crate::params::Params;
use crate::tx::psbt;

pub fn run(params: &Params, seed: &SeedArgs, psbt_input: &str, local_index: u32, _remote_pubkey: PublicKey) -> Result<()> {
    let secp = Secp256k1::new();
    let root = super::resolve_root(seed, params)?;
    let cache = super::key_cache(&secp, root, *params);

    let encoded = match std::fs::read_to_string(psbt_input) {
        Ok(contents) => contents.trim().to_string(),
        Err(_) => psbt_input.to_string(),
    };
    let mut parsed = psbt::from_base64(&encoded)?;

    let locator = crate::key::locator::KeyLocator::new(crate::key::locator::KeyFamily::MultiSig, local_index);
    let our_secret = cache.secret(locator)?;
    let our_pubkey = PublicKey::from_secret_key(&secp, &our_secret);

    let witness_script = parsed.inputs[0]
        .witness_script
        .clone()
        .ok_or_else(|| Error::input("PSBT input 0 is missing its witness script"))?;
    let prev_value = parsed.inputs[0]
        .witness_utxo
        .as_ref()
        .ok_or_else(|| Error::input("PSBT input 0 is missing its witness UTXO"))?
        .value;

    let digest = {
        let mut sighash_cache = bitcoin::sighash::SighashCache::new(&parsed.unsigned_tx);
        sighash_cache
            .segwit_v0_signature_hash(0, &witness_script, prev_value, EcdsaSighashType::All)
            .map_err(|e| Error::Signing(e.to_string()))?
    };
    let message = bitcoin::secp256k1::Message::from_digest(digest.to_byte_array());
    let sig = secp.sign_ecdsa(&message, &our_secret);
    psbt::insert_partial_signature(&mut parsed, 0, our_pubkey, sig)?;

    psbt::finalize_funding_multisig(&mut parsed, 0)?;
    let tx = psbt::extract_transaction(parsed)?;
    super::print_raw_tx(&tx);
    Ok(())
}
