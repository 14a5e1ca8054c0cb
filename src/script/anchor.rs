//! Anchor output script and its taproot leaf: a 330-sat output each side
//! can always spend with its own funding key, with a 16-block relative
//! timelock carve-out letting anyone sweep it if neither side bothers.

use bitcoin::opcodes::all as opcodes;
use bitcoin::script::{Builder, ScriptBuf};
use bitcoin::secp256k1::{PublicKey, Secp256k1, Verification, XOnlyPublicKey};
use bitcoin::taproot::{TaprootBuilder, TaprootSpendInfo};
use bitcoin::Address;

use crate::error::{Error, Result};
use crate::params::Params;

/// `<funding_pubkey> OP_CHECKSIG OP_IFDUP OP_NOTIF 16 OP_CSV OP_ENDIF`.
pub fn anchor_script(funding_pubkey: &PublicKey) -> ScriptBuf {
    Builder::new()
        .push_slice(funding_pubkey.serialize())
        .push_opcode(opcodes::OP_CHECKSIG)
        .push_opcode(opcodes::OP_IFDUP)
        .push_opcode(opcodes::OP_NOTIF)
        .push_int(16)
        .push_opcode(opcodes::OP_CSV)
        .push_opcode(opcodes::OP_ENDIF)
        .into_script()
}

pub fn anchor_address(funding_pubkey: &PublicKey, params: &Params) -> Address {
    Address::p2wsh(&anchor_script(funding_pubkey), params.network)
}

/// The taproot equivalent: a single-leaf script tree wrapping
/// [`anchor_script`], tweaked off the funding pubkey as internal key.
pub fn anchor_script_tree(
    secp: &Secp256k1<impl Verification>,
    funding_pubkey: &PublicKey,
) -> Result<TaprootSpendInfo> {
    let (xonly, _parity) = funding_pubkey.x_only_public_key();
    let leaf = anchor_leaf(&xonly);
    let builder = TaprootBuilder::new()
        .add_leaf(0, leaf)
        .map_err(|e| Error::derivation(e.to_string()))?;
    builder
        .finalize(secp, xonly)
        .map_err(|_| Error::derivation("anchor taproot tree finalization failed".into()))
}

fn anchor_leaf(funding_pubkey: &XOnlyPublicKey) -> ScriptBuf {
    Builder::new()
        .push_slice(funding_pubkey.serialize())
        .push_opcode(opcodes::OP_CHECKSIG)
        .push_opcode(opcodes::OP_IFDUP)
        .push_opcode(opcodes::OP_NOTIF)
        .push_int(16)
        .push_opcode(opcodes::OP_CSV)
        .push_opcode(opcodes::OP_ENDIF)
        .into_script()
}

pub fn anchor_taproot_address(
    secp: &Secp256k1<impl Verification>,
    funding_pubkey: &PublicKey,
    params: &Params,
) -> Result<Address> {
    let info = anchor_script_tree(secp, funding_pubkey)?;
    let (xonly, _) = funding_pubkey.x_only_public_key();
    Ok(Address::p2tr(secp, xonly, info.merkle_root(), params.network))
}

#[cfg(test)]
mod tests {
    use super::*;
    use bitcoin::secp256k1::SecretKey;

    fn key(byte: u8) -> PublicKey {
        let secp = Secp256k1::new();
        PublicKey::from_secret_key(&secp, &SecretKey::from_slice(&[byte; 32]).unwrap())
    }

    #[test]
    fn anchor_script_ends_in_csv() {
        let script = anchor_script(&key(1));
        let bytes = script.as_bytes();
        assert_eq!(bytes[bytes.len() - 2], opcodes::OP_CSV.to_u8());
    }

    #[test]
    fn taproot_anchor_address_is_deterministic() {
        let secp = Secp256k1::new();
        let pubkey = key(2);
        let params = Params::mainnet();
        let a1 = anchor_taproot_address(&secp, &pubkey, &params).unwrap();
        let a2 = anchor_taproot_address(&secp, &pubkey, &params).unwrap();
        assert_eq!(a1, a2);
    }
}
