//! Address and script derivation for every output class KS needs to
//! produce or recognize: P2PKH, P2WKH, P2TR (BIP86 key-path), the
//! static-remote-key anchor script, and its taproot counterpart.

use bitcoin::hashes::Hash;
use bitcoin::key::{TapTweak, TweakedPublicKey, UntweakedPublicKey};
use bitcoin::opcodes::all as opcodes;
use bitcoin::script::{Builder, ScriptBuf};
use bitcoin::secp256k1::{PublicKey, Secp256k1, Verification, XOnlyPublicKey};
use bitcoin::taproot::{TaprootBuilder, TaprootSpendInfo};
use bitcoin::{Address, CompressedPublicKey};

use crate::error::{Error, Result};
use crate::params::Params;

/// `OP_DROP <pubkey> OP_CHECKSIGVERIFY OP_1 OP_CHECKSEQUENCEVERIFY`-family
/// output paying the remote party once one block has confirmed the
/// commitment (BOLT3 `to_remote_confirmed`, used by anchor-commitment
/// channels).
pub fn to_remote_confirmed_script(remote_pubkey: &PublicKey) -> ScriptBuf {
    Builder::new()
        .push_slice(remote_pubkey.serialize())
        .push_opcode(opcodes::OP_CHECKSIGVERIFY)
        .push_int(1)
        .push_opcode(opcodes::OP_CSV)
        .into_script()
}

/// The P2WSH address and witness script for `to_remote_confirmed_script`.
pub fn p2anchor_static_remote(
    remote_pubkey: &PublicKey,
    params: &Params,
) -> (Address, ScriptBuf) {
    let script = to_remote_confirmed_script(remote_pubkey);
    let address = Address::p2wsh(&script, params.network);
    (address, script)
}

/// Single-leaf tapscript mirroring `to_remote_confirmed_script`, used as
/// the script tree for the taproot to-remote output.
pub fn to_remote_confirmed_leaf(remote_pubkey: &XOnlyPublicKey) -> ScriptBuf {
    Builder::new()
        .push_slice(remote_pubkey.serialize())
        .push_opcode(opcodes::OP_CHECKSIGVERIFY)
        .push_int(1)
        .push_opcode(opcodes::OP_CSV)
        .into_script()
}

/// The P2TR address for the taproot to-remote output: `pub` tweaked by the
/// merkle root of `to_remote_confirmed_leaf`, matching SR.commit's
/// "taproot key-spend (simple taproot)" match rule.
pub fn p2taproot_static_remote(
    secp: &Secp256k1<impl Verification>,
    remote_pubkey: &PublicKey,
    params: &Params,
) -> Result<(Address, TaprootSpendInfo)> {
    let (xonly, _parity) = remote_pubkey.x_only_public_key();
    let leaf = to_remote_confirmed_leaf(&xonly);

    let builder = TaprootBuilder::new()
        .add_leaf(0, leaf)
        .map_err(|e| Error::derivation(e.to_string()))?;
    let spend_info = builder
        .finalize(secp, xonly)
        .map_err(|_| Error::derivation("taproot tree finalization failed".into()))?;

    let address = Address::p2tr(
        secp,
        xonly,
        spend_info.merkle_root(),
        params.network,
    );
    Ok((address, spend_info))
}

/// Plain BIP86 key-path-only taproot address: internal key tweaked with an
/// empty merkle root. Used for wallet P2TR addresses.
pub fn p2tr_addr(
    secp: &Secp256k1<impl Verification>,
    pubkey: &PublicKey,
    params: &Params,
) -> Address {
    let (xonly, _parity) = pubkey.x_only_public_key();
    Address::p2tr(secp, xonly, None, params.network)
}

/// Computes the tweaked output key for a BIP86 key-path-only spend,
/// without constructing a full address — used by SR when only the 32-byte
/// x-only output key needs to be compared against a target.
pub fn tweak_for_key_path_only(
    secp: &Secp256k1<impl Verification>,
    pubkey: &PublicKey,
) -> TweakedPublicKey {
    let (xonly, _parity) = pubkey.x_only_public_key();
    let untweaked: UntweakedPublicKey = xonly;
    untweaked.tap_tweak(secp, None).0
}

pub fn p2wkh_addr(pubkey: &PublicKey, params: &Params) -> Result<Address> {
    let compressed = CompressedPublicKey(*pubkey);
    Ok(Address::p2wpkh(&compressed, params.network))
}

pub fn p2pkh_addr(pubkey: &PublicKey, params: &Params) -> Address {
    let pk = bitcoin::PublicKey::new(*pubkey);
    Address::p2pkh(pk, params.network)
}

/// `OP_0 <hash160(pubkey)>`, the witness program inside a P2WKH
/// scriptPubKey — used when SR only has the raw scriptPubKey bytes and
/// needs to recompute the hash rather than build a full `Address`.
pub fn p2wkh_pubkey_hash(pubkey: &PublicKey) -> bitcoin::PubkeyHash {
    bitcoin::PublicKey::new(*pubkey).pubkey_hash()
}

pub fn hash160(data: &[u8]) -> [u8; 20] {
    bitcoin::hashes::hash160::Hash::hash(data).to_byte_array()
}

#[cfg(test)]
mod tests {
    use super::*;
    use bitcoin::secp256k1::SecretKey;

    fn test_pubkey(byte: u8) -> PublicKey {
        let secp = Secp256k1::new();
        let sk = SecretKey::from_slice(&[byte; 32]).unwrap();
        PublicKey::from_secret_key(&secp, &sk)
    }

    #[test]
    fn to_remote_confirmed_script_has_csv_one() {
        let pubkey = test_pubkey(1);
        let script = to_remote_confirmed_script(&pubkey);
        let bytes = script.as_bytes();
        assert_eq!(bytes.last(), Some(&opcodes::OP_CSV.to_u8()));
    }

    #[test]
    fn taproot_to_remote_output_is_deterministic() {
        let secp = Secp256k1::new();
        let pubkey = test_pubkey(2);
        let params = Params::mainnet();
        let (addr1, info1) = p2taproot_static_remote(&secp, &pubkey, &params).unwrap();
        let (addr2, info2) = p2taproot_static_remote(&secp, &pubkey, &params).unwrap();
        assert_eq!(addr1, addr2);
        assert_eq!(info1.output_key(), info2.output_key());
    }

    #[test]
    fn p2wkh_and_p2pkh_addresses_differ() {
        let pubkey = test_pubkey(3);
        let params = Params::mainnet();
        let wkh = p2wkh_addr(&pubkey, &params).unwrap();
        let pkh = p2pkh_addr(&pubkey, &params);
        assert_ne!(wkh.to_string(), pkh.to_string());
    }
}
