//! Pool account expiry scripts: a 2-of-2 (trader, auctioneer) CLTV-gated
//! output, in three variants — plain segwit P2WSH and two taproot/MuSig2
//! generations. `TaprootMuSig2V100RC2` aggregates via the `musig2` crate's
//! BIP327-compliant path; `TaprootMuSig2V040` predates BIP327 and is
//! hand-rolled below, since it aggregates over a different (32-byte
//! x-only) key serialization and produces a different aggregate key for
//! the same signer pair. The per-account tweak chain (shared key, batch
//! key walk, trader tweak) is hand-rolled per the documented algorithm
//! since it predates any published crate either way.

use bitcoin::opcodes::all as opcodes;
use bitcoin::script::{Builder, ScriptBuf};
use bitcoin::secp256k1::ecdh::SharedSecret;
use bitcoin::secp256k1::{PublicKey, Scalar, Secp256k1, SecretKey, Signing, Verification};
use bitcoin::taproot::{TaprootBuilder, TaprootSpendInfo};
use hmac::{Hmac, Mac};
use sha2::{Digest, Sha256};

use crate::error::{Error, Result};

type HmacSha256 = Hmac<Sha256>;

/// Which on-chain generation of the Pool account script this match is for.
/// The two taproot generations differ upstream in their MuSig2 library's
/// key-aggregation scheme (see [`taproot_spend_info`] vs.
/// [`taproot_spend_info_v040`]) and therefore in the aggregate output key,
/// so both must be probed independently to cover both generations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PoolScriptVersion {
    SegwitV0,
    TaprootMuSig2V040,
    TaprootMuSig2V100RC2,
}

/// The fixed starting point for the batch-key walk: the secp256k1
/// generator point, serialized compressed. Each batch index adds one more
/// multiple of `G`.
pub fn initial_batch_key(secp: &Secp256k1<impl Signing>) -> PublicKey {
    let mut scalar_one = [0u8; 32];
    scalar_one[31] = 1;
    let one = SecretKey::from_slice(&scalar_one).expect("scalar 1 is a valid secret key");
    PublicKey::from_secret_key(secp, &one)
}

/// `batch_key = initial_batch_key + batch_key_index * G`.
pub fn batch_key_at_index(
    secp: &Secp256k1<impl Verification + Signing>,
    batch_key_index: u32,
) -> Result<PublicKey> {
    if batch_key_index == 0 {
        return Ok(initial_batch_key(secp));
    }
    let scalar = Scalar::from_be_bytes({
        let mut buf = [0u8; 32];
        buf[28..].copy_from_slice(&batch_key_index.to_be_bytes());
        buf
    })
    .map_err(|_| Error::derivation("batch key index out of range".into()))?;
    initial_batch_key(secp)
        .add_exp_tweak(secp, &scalar)
        .map_err(|e| Error::derivation(e.to_string()))
}

/// ECDH shared key between the trader's account base key and the
/// auctioneer's published pubkey.
pub fn shared_key(trader_secret: &SecretKey, auctioneer_pubkey: &PublicKey) -> [u8; 32] {
    SharedSecret::new(auctioneer_pubkey, trader_secret).secret_bytes()
}

/// `HMAC-SHA256(key = shared_key, msg = batch_key || trader_pub)` reduced
/// to a scalar, the per-account tweak applied to both the trader's and the
/// auctioneer's keys.
pub fn trader_tweak(
    shared_key: &[u8; 32],
    batch_key: &PublicKey,
    trader_pub: &PublicKey,
) -> Result<Scalar> {
    let mut mac = HmacSha256::new_from_slice(shared_key).expect("HMAC accepts any key length");
    mac.update(&batch_key.serialize());
    mac.update(&trader_pub.serialize());
    let digest: [u8; 32] = mac.finalize().into_bytes().into();
    Scalar::from_be_bytes(digest).map_err(|_| Error::derivation("trader tweak out of range".into()))
}

pub fn tweaked_trader_key(
    secp: &Secp256k1<impl Verification>,
    trader_pub: &PublicKey,
    tweak: &Scalar,
) -> Result<PublicKey> {
    trader_pub
        .add_exp_tweak(secp, tweak)
        .map_err(|e| Error::derivation(e.to_string()))
}

pub fn tweaked_auctioneer_key(
    secp: &Secp256k1<impl Verification>,
    auctioneer_pub: &PublicKey,
    tweak: &Scalar,
) -> Result<PublicKey> {
    auctioneer_pub
        .add_exp_tweak(secp, tweak)
        .map_err(|e| Error::derivation(e.to_string()))
}

/// `<tweaked_trader> OP_CHECKSIGVERIFY <tweaked_auctioneer> OP_CHECKSIG
/// OP_IFDUP OP_NOTIF <expiry> OP_CHECKLOCKTIMEVERIFY OP_ENDIF`.
pub fn segwit_expiry_script(
    tweaked_trader: &PublicKey,
    tweaked_auctioneer: &PublicKey,
    expiry: u32,
) -> ScriptBuf {
    Builder::new()
        .push_slice(tweaked_trader.serialize())
        .push_opcode(opcodes::OP_CHECKSIGVERIFY)
        .push_slice(tweaked_auctioneer.serialize())
        .push_opcode(opcodes::OP_CHECKSIG)
        .push_opcode(opcodes::OP_IFDUP)
        .push_opcode(opcodes::OP_NOTIF)
        .push_int(expiry as i64)
        .push_opcode(opcodes::OP_CLTV)
        .push_opcode(opcodes::OP_ENDIF)
        .into_script()
}

pub fn segwit_expiry_address(
    tweaked_trader: &PublicKey,
    tweaked_auctioneer: &PublicKey,
    expiry: u32,
    params: &crate::params::Params,
) -> bitcoin::Address {
    bitcoin::Address::p2wsh(
        &segwit_expiry_script(tweaked_trader, tweaked_auctioneer, expiry),
        params.network,
    )
}

/// `<schnorr(tweaked_trader)> OP_CHECKSIGVERIFY <expiry> OP_CHECKLOCKTIMEVERIFY`.
pub fn taproot_expiry_leaf(tweaked_trader: &bitcoin::secp256k1::XOnlyPublicKey, expiry: u32) -> ScriptBuf {
    Builder::new()
        .push_slice(tweaked_trader.serialize())
        .push_opcode(opcodes::OP_CHECKSIGVERIFY)
        .push_int(expiry as i64)
        .push_opcode(opcodes::OP_CLTV)
        .into_script()
}

/// Aggregates `auctioneer` and `tweaked_trader` via BIP327 MuSig2
/// (v1.0.0-rc2's generation), taproot-tweaked by the expiry leaf's merkle
/// root, and returns the resulting spend info.
pub fn taproot_spend_info(
    secp: &Secp256k1<bitcoin::secp256k1::All>,
    auctioneer: &PublicKey,
    tweaked_trader: &PublicKey,
    expiry: u32,
) -> Result<TaprootSpendInfo> {
    let (trader_xonly, _) = tweaked_trader.x_only_public_key();
    let leaf = taproot_expiry_leaf(&trader_xonly, expiry);

    let ctx = musig2::KeyAggContext::new([*auctioneer, *tweaked_trader])
        .map_err(|e| Error::derivation(format!("musig2 key aggregation failed: {e}")))?;
    let internal: PublicKey = ctx.aggregated_pubkey();
    let (internal_xonly, _) = internal.x_only_public_key();

    let builder = TaprootBuilder::new()
        .add_leaf(0, leaf)
        .map_err(|e| Error::derivation(e.to_string()))?;
    builder
        .finalize(secp, internal_xonly)
        .map_err(|_| Error::derivation("pool taproot tree finalization failed".into()))
}

/// Aggregates `auctioneer` and `tweaked_trader` the way the pre-BIP327
/// v0.4.0 musig2 library did, taproot-tweaked by the expiry leaf's merkle
/// root. Same shape as [`taproot_spend_info`], different key-aggregation
/// math underneath (see [`legacy_musig_v040_aggregate`]).
pub fn taproot_spend_info_v040(
    secp: &Secp256k1<bitcoin::secp256k1::All>,
    auctioneer: &PublicKey,
    tweaked_trader: &PublicKey,
    expiry: u32,
) -> Result<TaprootSpendInfo> {
    let (trader_xonly, _) = tweaked_trader.x_only_public_key();
    let leaf = taproot_expiry_leaf(&trader_xonly, expiry);

    let internal = legacy_musig_v040_aggregate(secp, &[*auctioneer, *tweaked_trader])?;
    let (internal_xonly, _) = internal.x_only_public_key();

    let builder = TaprootBuilder::new()
        .add_leaf(0, leaf)
        .map_err(|e| Error::derivation(e.to_string()))?;
    builder
        .finalize(secp, internal_xonly)
        .map_err(|_| Error::derivation("pool taproot tree finalization failed".into()))
}

/// Key aggregation as the v0.4.0 musig2 library performed it, before
/// BIP327 standardized a different scheme: `ell = SHA256(x_1 || ... ||
/// x_n)` over each signer's 32-byte x-only serialization, a per-key
/// coefficient `SHA256(ell || x_i)`, and the aggregate point `sum(coeff_i
/// * P_i)`. BIP327 (used by [`taproot_spend_info`]) hashes 33-byte
/// compressed serializations under domain-separated tagged hashes
/// instead, so the two schemes never agree on an aggregate key for the
/// same signer set.
fn legacy_musig_v040_aggregate(
    secp: &Secp256k1<bitcoin::secp256k1::All>,
    keys: &[PublicKey],
) -> Result<PublicKey> {
    let xonly: Vec<[u8; 32]> = keys
        .iter()
        .map(|k| k.x_only_public_key().0.serialize())
        .collect();

    let mut ell_hasher = Sha256::new();
    for x in &xonly {
        ell_hasher.update(x);
    }
    let ell: [u8; 32] = ell_hasher.finalize().into();

    let mut acc: Option<PublicKey> = None;
    for (key, x) in keys.iter().zip(xonly.iter()) {
        let mut coeff_hasher = Sha256::new();
        coeff_hasher.update(ell);
        coeff_hasher.update(x);
        let coeff_bytes: [u8; 32] = coeff_hasher.finalize().into();
        let coeff = Scalar::from_be_bytes(coeff_bytes)
            .map_err(|_| Error::derivation("musig v0.4.0 coefficient out of range".into()))?;
        let tweaked = key
            .mul_tweak(secp, &coeff)
            .map_err(|e| Error::derivation(e.to_string()))?;
        acc = Some(match acc {
            None => tweaked,
            Some(prev) => prev
                .combine(&tweaked)
                .map_err(|e| Error::derivation(e.to_string()))?,
        });
    }
    acc.ok_or_else(|| Error::derivation("musig v0.4.0 aggregation needs at least one key".into()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn secp() -> Secp256k1<bitcoin::secp256k1::All> {
        Secp256k1::new()
    }

    #[test]
    fn batch_key_walk_is_deterministic_and_distinct() {
        let secp = secp();
        let k0 = batch_key_at_index(&secp, 0).unwrap();
        let k1 = batch_key_at_index(&secp, 1).unwrap();
        let k1_again = batch_key_at_index(&secp, 1).unwrap();
        assert_ne!(k0, k1);
        assert_eq!(k1, k1_again);
    }

    #[test]
    fn segwit_script_ends_in_cltv_endif() {
        let secp = secp();
        let trader =
            PublicKey::from_secret_key(&secp, &SecretKey::from_slice(&[6u8; 32]).unwrap());
        let auctioneer =
            PublicKey::from_secret_key(&secp, &SecretKey::from_slice(&[7u8; 32]).unwrap());
        let script = segwit_expiry_script(&trader, &auctioneer, 700_000);
        let bytes = script.as_bytes();
        assert_eq!(bytes.last(), Some(&opcodes::OP_ENDIF.to_u8()));
    }

    #[test]
    fn taproot_spend_info_is_deterministic() {
        let secp = secp();
        let trader =
            PublicKey::from_secret_key(&secp, &SecretKey::from_slice(&[8u8; 32]).unwrap());
        let auctioneer =
            PublicKey::from_secret_key(&secp, &SecretKey::from_slice(&[9u8; 32]).unwrap());
        let a = taproot_spend_info(&secp, &auctioneer, &trader, 123).unwrap();
        let b = taproot_spend_info(&secp, &auctioneer, &trader, 123).unwrap();
        assert_eq!(a.output_key(), b.output_key());
    }

    #[test]
    fn v040_and_v100rc2_aggregate_to_different_keys() {
        let secp = secp();
        let trader =
            PublicKey::from_secret_key(&secp, &SecretKey::from_slice(&[8u8; 32]).unwrap());
        let auctioneer =
            PublicKey::from_secret_key(&secp, &SecretKey::from_slice(&[9u8; 32]).unwrap());

        let rc2 = taproot_spend_info(&secp, &auctioneer, &trader, 123).unwrap();
        let v040 = taproot_spend_info_v040(&secp, &auctioneer, &trader, 123).unwrap();
        assert_ne!(rc2.output_key(), v040.output_key());
    }

    #[test]
    fn v040_aggregation_is_deterministic() {
        let secp = secp();
        let trader =
            PublicKey::from_secret_key(&secp, &SecretKey::from_slice(&[10u8; 32]).unwrap());
        let auctioneer =
            PublicKey::from_secret_key(&secp, &SecretKey::from_slice(&[11u8; 32]).unwrap());
        let a = taproot_spend_info_v040(&secp, &auctioneer, &trader, 321).unwrap();
        let b = taproot_spend_info_v040(&secp, &auctioneer, &trader, 321).unwrap();
        assert_eq!(a.output_key(), b.output_key());
    }
}
