//! Loop-in HTLC scripts. Loop-in locks funds in an HTLC the server can
//! claim with the payment preimage or the client can reclaim after a CLTV
//! expiry; SR only ever needs the timeout path, since by construction the
//! toolkit is reconstructing an output the *client* can still sweep.

use bitcoin::opcodes::all as opcodes;
use bitcoin::script::{Builder, ScriptBuf};
use bitcoin::secp256k1::{PublicKey, Secp256k1, Verification, XOnlyPublicKey};
use bitcoin::taproot::{TaprootBuilder, TaprootSpendInfo};

use crate::error::{Error, Result};

/// HTLCv2 (segwit): success path pays `receiver_key` against the preimage,
/// timeout path pays `sender_key` after `cltv_expiry`.
///
/// ```text
/// OP_SIZE 32 OP_EQUAL
/// OP_IF
///     OP_HASH160 <hash160(preimage)> OP_EQUALVERIFY
///     <receiver_key> OP_CHECKSIG
/// OP_ELSE
///     OP_DROP
///     <sender_key> OP_CHECKSIGVERIFY
///     <cltv_expiry> OP_CHECKLOCKTIMEVERIFY
/// OP_ENDIF
/// ```
pub fn htlc_v2_script(
    sender_key: &PublicKey,
    receiver_key: &PublicKey,
    payment_hash160: &[u8; 20],
    cltv_expiry: u32,
) -> ScriptBuf {
    Builder::new()
        .push_opcode(opcodes::OP_SIZE)
        .push_int(32)
        .push_opcode(opcodes::OP_EQUAL)
        .push_opcode(opcodes::OP_IF)
        .push_opcode(opcodes::OP_HASH160)
        .push_slice(payment_hash160)
        .push_opcode(opcodes::OP_EQUALVERIFY)
        .push_slice(receiver_key.serialize())
        .push_opcode(opcodes::OP_CHECKSIG)
        .push_opcode(opcodes::OP_ELSE)
        .push_opcode(opcodes::OP_DROP)
        .push_slice(sender_key.serialize())
        .push_opcode(opcodes::OP_CHECKSIGVERIFY)
        .push_int(cltv_expiry as i64)
        .push_opcode(opcodes::OP_CLTV)
        .push_opcode(opcodes::OP_ENDIF)
        .into_script()
}

pub fn htlc_v2_address(
    sender_key: &PublicKey,
    receiver_key: &PublicKey,
    payment_hash160: &[u8; 20],
    cltv_expiry: u32,
    params: &crate::params::Params,
) -> bitcoin::Address {
    bitcoin::Address::p2wsh(
        &htlc_v2_script(sender_key, receiver_key, payment_hash160, cltv_expiry),
        params.network,
    )
}

/// HTLCv3 (taproot) timeout leaf: `<sender_key> OP_CHECKSIGVERIFY <expiry>
/// OP_CHECKLOCKTIMEVERIFY`. The success leaf is irrelevant to SR (it is the
/// server's spend path) and is not reconstructed here.
pub fn htlc_v3_timeout_leaf(sender_key: &XOnlyPublicKey, cltv_expiry: u32) -> ScriptBuf {
    Builder::new()
        .push_slice(sender_key.serialize())
        .push_opcode(opcodes::OP_CHECKSIGVERIFY)
        .push_int(cltv_expiry as i64)
        .push_opcode(opcodes::OP_CLTV)
        .into_script()
}

/// HTLCv3 (taproot) success leaf: `OP_HASH160 <hash160(preimage)>
/// OP_EQUALVERIFY <receiver_key> OP_CHECKSIG`. Included in the tree purely
/// so the merkle root matches the real two-leaf construction; SR never
/// spends through it.
pub fn htlc_v3_success_leaf(receiver_key: &XOnlyPublicKey, payment_hash160: &[u8; 20]) -> ScriptBuf {
    Builder::new()
        .push_opcode(opcodes::OP_HASH160)
        .push_slice(payment_hash160)
        .push_opcode(opcodes::OP_EQUALVERIFY)
        .push_slice(receiver_key.serialize())
        .push_opcode(opcodes::OP_CHECKSIG)
        .into_script()
}

/// Builds the two-leaf taproot tree (timeout + success) and aggregates
/// `sender_key`/`receiver_key` via MuSig2 as the internal key, matching the
/// on-chain HTLCv3 output so SR can compare output keys byte-for-byte.
pub fn htlc_v3_spend_info(
    secp: &Secp256k1<bitcoin::secp256k1::All>,
    sender_key: &PublicKey,
    receiver_key: &PublicKey,
    payment_hash160: &[u8; 20],
    cltv_expiry: u32,
) -> Result<TaprootSpendInfo> {
    let (sender_xonly, _) = sender_key.x_only_public_key();
    let (receiver_xonly, _) = receiver_key.x_only_public_key();

    let timeout_leaf = htlc_v3_timeout_leaf(&sender_xonly, cltv_expiry);
    let success_leaf = htlc_v3_success_leaf(&receiver_xonly, payment_hash160);

    let ctx = musig2::KeyAggContext::new([*sender_key, *receiver_key])
        .map_err(|e| Error::derivation(format!("musig2 key aggregation failed: {e}")))?;
    let internal: PublicKey = ctx.aggregated_pubkey();
    let (internal_xonly, _) = internal.x_only_public_key();

    let builder = TaprootBuilder::new()
        .add_leaf(1, timeout_leaf)
        .map_err(|e| Error::derivation(e.to_string()))?
        .add_leaf(1, success_leaf)
        .map_err(|e| Error::derivation(e.to_string()))?;
    builder
        .finalize(secp, internal_xonly)
        .map_err(|_| Error::derivation("HTLCv3 taproot tree finalization failed".into()))
}

pub fn address_matches(
    secp: &Secp256k1<impl Verification>,
    spend_info: &TaprootSpendInfo,
    internal_xonly: XOnlyPublicKey,
    params: &crate::params::Params,
) -> bitcoin::Address {
    bitcoin::Address::p2tr(secp, internal_xonly, spend_info.merkle_root(), params.network)
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
    fn v2_script_has_two_spend_paths() {
        let script = htlc_v2_script(&key(1), &key(2), &[0u8; 20], 800_000);
        let bytes = script.as_bytes();
        assert_eq!(bytes.last(), Some(&opcodes::OP_ENDIF.to_u8()));
    }

    #[test]
    fn v3_spend_info_is_deterministic() {
        let secp = Secp256k1::new();
        let sender = key(3);
        let receiver = key(4);
        let a = htlc_v3_spend_info(&secp, &sender, &receiver, &[0u8; 20], 123).unwrap();
        let b = htlc_v3_spend_info(&secp, &sender, &receiver, &[0u8; 20], 123).unwrap();
        assert_eq!(a.output_key(), b.output_key());
    }
}
