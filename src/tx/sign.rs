//! Per-input signing dispatch. Every `RecoveredOutput` carries enough
//! context (`spend_method`, `script_kind`, the witness/leaf script, the
//! taproot tree) to build its own witness stack; this module is the single
//! place that turns that context plus a secret key into bytes on the wire.

use bitcoin::hashes::Hash;
use bitcoin::key::{Keypair, TapTweak};
use bitcoin::secp256k1::{ecdsa, schnorr, All, Message, PublicKey, Secp256k1, SecretKey};
use bitcoin::sighash::{EcdsaSighashType, Prevouts, SighashCache, TapSighashType};
use bitcoin::taproot::LeafVersion;
use bitcoin::{Transaction, TxOut, Witness};

use crate::error::{Error, Result};
use crate::recover::{RecoveredOutput, ScriptKind, SpendMethod};

const SIGHASH_ALL_BYTE: u8 = EcdsaSighashType::All.to_u32() as u8;

fn ecdsa_sign(secp: &Secp256k1<All>, secret: &SecretKey, digest: [u8; 32]) -> Vec<u8> {
    let msg = Message::from_digest(digest);
    let sig: ecdsa::Signature = secp.sign_ecdsa(&msg, secret);
    let mut bytes = sig.serialize_der().to_vec();
    bytes.push(SIGHASH_ALL_BYTE);
    bytes
}

fn schnorr_sign(secp: &Secp256k1<All>, keypair: &Keypair, digest: [u8; 32]) -> schnorr::Signature {
    let msg = Message::from_digest(digest);
    secp.sign_schnorr_no_aux_rand(&msg, keypair)
}

/// Signs input `index` of `tx` in place, given the prevouts of every input
/// in the batch (taproot sighashing commits to all of them) and the
/// secret key `output.key_descriptor` resolved to.
///
/// Funding-multisig inputs are the one shape that needs a counterparty
/// signature STB cannot produce on its own; callers pass it in when
/// available (e.g. a cooperative `rescuefunding` PSBT round-trip) and get
/// `Error::MissingCounterpartySignature` back otherwise.
pub fn sign_input(
    secp: &Secp256k1<All>,
    tx: &mut Transaction,
    index: usize,
    prevouts: &[TxOut],
    output: &RecoveredOutput,
    secret: &SecretKey,
    counterparty: Option<(&PublicKey, &[u8])>,
) -> Result<()> {
    let witness = match output.spend_method {
        SpendMethod::WitnessV0 => sign_witness_v0(secp, tx, index, prevouts, output, secret, counterparty)?,
        SpendMethod::TaprootKeySpend => sign_taproot_keyspend(secp, tx, index, prevouts, output, secret)?,
        SpendMethod::TaprootScriptSpend => sign_taproot_scriptspend(secp, tx, index, prevouts, output, secret)?,
    };
    tx.input[index].witness = witness;
    Ok(())
}

fn sign_witness_v0(
    secp: &Secp256k1<All>,
    tx: &Transaction,
    index: usize,
    prevouts: &[TxOut],
    output: &RecoveredOutput,
    secret: &SecretKey,
    counterparty: Option<(&PublicKey, &[u8])>,
) -> Result<Witness> {
    let value = output.prev_value;
    let pubkey = PublicKey::from_secret_key(secp, secret);
    let mut cache = SighashCache::new(tx);

    match output.script_kind {
        None | Some(ScriptKind::P2wkh) => {
            let digest = cache
                .p2wpkh_signature_hash(index, &output.prev_pk_script, value, EcdsaSighashType::All)
                .map_err(|e| Error::Signing(e.to_string()))?;
            let sig = ecdsa_sign(secp, secret, digest.to_byte_array());
            let mut w = Witness::new();
            w.push(sig);
            w.push(pubkey.serialize());
            Ok(w)
        }
        Some(ScriptKind::ToRemoteConfirmed) | Some(ScriptKind::Anchor) | Some(ScriptKind::PoolSegwitExpiry) => {
            let script = output
                .witness_script
                .as_ref()
                .ok_or_else(|| Error::Signing("missing witness script".into()))?;
            let digest = cache
                .segwit_v0_signature_hash(index, script, value, EcdsaSighashType::All)
                .map_err(|e| Error::Signing(e.to_string()))?;
            let sig = ecdsa_sign(secp, secret, digest.to_byte_array());
            let mut w = Witness::new();
            if matches!(output.script_kind, Some(ScriptKind::PoolSegwitExpiry)) {
                // Expiry path: the first `OP_CHECKSIGVERIFY` consumes
                // whatever is on top of the stack as the trader signature,
                // so the trader sig must be pushed last (on top); the
                // auctioneer branch's empty placeholder goes underneath it,
                // where the following `OP_CHECKSIG`/`OP_NOTIF` expects it.
                w.push(Vec::new());
            }
            w.push(sig);
            w.push(script.as_bytes());
            Ok(w)
        }
        Some(ScriptKind::LoopHtlcV2Timeout) => {
            let script = output
                .witness_script
                .as_ref()
                .ok_or_else(|| Error::Signing("missing witness script".into()))?;
            let digest = cache
                .segwit_v0_signature_hash(index, script, value, EcdsaSighashType::All)
                .map_err(|e| Error::Signing(e.to_string()))?;
            let sig = ecdsa_sign(secp, secret, digest.to_byte_array());
            let mut w = Witness::new();
            w.push(sig);
            w.push(Vec::new()); // selects the timeout branch, not the preimage branch
            w.push(script.as_bytes());
            Ok(w)
        }
        Some(ScriptKind::FundingMultisig) => {
            let script = output
                .witness_script
                .as_ref()
                .ok_or_else(|| Error::Signing("missing witness script".into()))?;
            let (counterparty_pubkey, counterparty_sig) = counterparty
                .ok_or(Error::MissingCounterpartySignature { index })?;
            let digest = cache
                .segwit_v0_signature_hash(index, script, value, EcdsaSighashType::All)
                .map_err(|e| Error::Signing(e.to_string()))?;
            let our_sig = ecdsa_sign(secp, secret, digest.to_byte_array());

            // CHECKMULTISIG requires signatures in the same relative order
            // as their pubkeys appear in the script, which is the sorted
            // order `funding_script` built it in.
            let mut w = Witness::new();
            w.push(Vec::new()); // CHECKMULTISIG's off-by-one dummy element
            if pubkey.serialize() < counterparty_pubkey.serialize() {
                w.push(our_sig);
                w.push(counterparty_sig.to_vec());
            } else {
                w.push(counterparty_sig.to_vec());
                w.push(our_sig);
            }
            w.push(script.as_bytes());
            Ok(w)
        }
    }
}

fn sign_taproot_keyspend(
    secp: &Secp256k1<All>,
    tx: &Transaction,
    index: usize,
    prevouts: &[TxOut],
    output: &RecoveredOutput,
    secret: &SecretKey,
) -> Result<Witness> {
    let merkle_root = output.script_tree.as_ref().and_then(|info| info.merkle_root());
    let mut cache = SighashCache::new(tx);
    let digest = cache
        .taproot_key_spend_signature_hash(index, &Prevouts::All(prevouts), TapSighashType::Default)
        .map_err(|e| Error::Signing(e.to_string()))?;

    let untweaked = Keypair::from_secret_key(secp, secret);
    let tweaked = untweaked.tap_tweak(secp, merkle_root);
    let sig = schnorr_sign(secp, &tweaked.to_inner(), digest.to_byte_array());

    let mut w = Witness::new();
    w.push(sig.as_ref());
    Ok(w)
}

fn sign_taproot_scriptspend(
    secp: &Secp256k1<All>,
    tx: &Transaction,
    index: usize,
    prevouts: &[TxOut],
    output: &RecoveredOutput,
    secret: &SecretKey,
) -> Result<Witness> {
    let leaf_script = output
        .leaf_script
        .as_ref()
        .ok_or_else(|| Error::Signing("missing taproot leaf script".into()))?;
    let info = output
        .script_tree
        .as_ref()
        .ok_or_else(|| Error::Signing("missing taproot spend info".into()))?;
    let leaf_hash = bitcoin::taproot::TapLeafHash::from_script(leaf_script, LeafVersion::TapScript);

    let mut cache = SighashCache::new(tx);
    let digest = cache
        .taproot_script_spend_signature_hash(
            index,
            &Prevouts::All(prevouts),
            leaf_hash,
            TapSighashType::Default,
        )
        .map_err(|e| Error::Signing(e.to_string()))?;

    let keypair = Keypair::from_secret_key(secp, secret);
    let sig = schnorr_sign(secp, &keypair, digest.to_byte_array());

    let control_block = info
        .control_block(&(leaf_script.clone(), LeafVersion::TapScript))
        .ok_or_else(|| Error::Signing("leaf script not present in the spend tree".into()))?;

    let mut w = Witness::new();
    w.push(sig.as_ref());
    w.push(leaf_script.as_bytes());
    w.push(control_block.serialize());
    Ok(w)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::key::addresses::p2wkh_addr;
    use crate::params::Params;
    use crate::recover::types::{RecoveredOutput, SpendMethod};
    use bitcoin::absolute::LockTime;
    use bitcoin::transaction::Version;
    use bitcoin::{Amount, OutPoint, Sequence, TxIn};

    fn test_keypair(byte: u8) -> (SecretKey, PublicKey) {
        let secp = Secp256k1::new();
        let sk = SecretKey::from_slice(&[byte; 32]).unwrap();
        let pk = PublicKey::from_secret_key(&secp, &sk);
        (sk, pk)
    }

    #[test]
    fn p2wkh_witness_has_sig_and_pubkey() {
        let secp = Secp256k1::new();
        let (secret, pubkey) = test_keypair(9);
        let params = Params::mainnet();
        let addr = p2wkh_addr(&pubkey, &params).unwrap();
        let prev_pk_script = addr.script_pubkey();

        let outpoint = OutPoint::null();
        let prevout = TxOut {
            value: Amount::from_sat(10_000),
            script_pubkey: prev_pk_script.clone(),
        };
        let mut tx = Transaction {
            version: Version::TWO,
            lock_time: LockTime::ZERO,
            input: vec![TxIn {
                previous_output: outpoint,
                script_sig: Default::default(),
                sequence: Sequence::MAX,
                witness: Witness::new(),
            }],
            output: vec![TxOut {
                value: Amount::from_sat(9_000),
                script_pubkey: prev_pk_script.clone(),
            }],
        };

        let output = RecoveredOutput {
            outpoint,
            prev_value: Amount::from_sat(10_000),
            prev_pk_script: prev_pk_script.clone(),
            witness_script: None,
            script_tree: None,
            leaf_script: None,
            key_descriptor: crate::key::KeyDescriptor::new(
                crate::key::locator::KeyLocator::raw(0, 0),
                pubkey,
            ),
            single_tweak: None,
            spend_method: SpendMethod::WitnessV0,
            script_kind: Some(ScriptKind::P2wkh),
            required_locktime: None,
            required_sequence: None,
        };

        sign_input(&secp, &mut tx, 0, &[prevout], &output, &secret, None).unwrap();
        assert_eq!(tx.input[0].witness.len(), 2);
    }

    #[test]
    fn pool_segwit_expiry_witness_puts_trader_sig_on_top() {
        use crate::script::pool::segwit_expiry_script;

        let secp = Secp256k1::new();
        let (trader_secret, trader_pub) = test_keypair(20);
        let (_, auctioneer_pub) = test_keypair(21);
        let expiry: u32 = 800_000;
        let script = segwit_expiry_script(&trader_pub, &auctioneer_pub, expiry);
        let address = bitcoin::Address::p2wsh(&script, bitcoin::Network::Bitcoin);
        let prev_pk_script = address.script_pubkey();

        let outpoint = OutPoint::null();
        let prevout = TxOut {
            value: Amount::from_sat(50_000),
            script_pubkey: prev_pk_script.clone(),
        };
        let mut tx = Transaction {
            version: Version::TWO,
            lock_time: LockTime::from_consensus(expiry),
            input: vec![TxIn {
                previous_output: outpoint,
                script_sig: Default::default(),
                sequence: Sequence::from_consensus(0),
                witness: Witness::new(),
            }],
            output: vec![TxOut {
                value: Amount::from_sat(49_000),
                script_pubkey: prev_pk_script.clone(),
            }],
        };

        let output = RecoveredOutput {
            outpoint,
            prev_value: Amount::from_sat(50_000),
            prev_pk_script: prev_pk_script.clone(),
            witness_script: Some(script.clone()),
            script_tree: None,
            leaf_script: None,
            key_descriptor: crate::key::KeyDescriptor::new(
                crate::key::locator::KeyLocator::raw(220, 0),
                trader_pub,
            ),
            single_tweak: None,
            spend_method: SpendMethod::WitnessV0,
            script_kind: Some(ScriptKind::PoolSegwitExpiry),
            required_locktime: Some(expiry),
            required_sequence: None,
        };

        sign_input(&secp, &mut tx, 0, &[prevout], &output, &trader_secret, None).unwrap();

        let witness = &tx.input[0].witness;
        assert_eq!(witness.len(), 3);
        // Bottom-to-top: empty placeholder, trader signature, script. The
        // script's first opcode sequence pushes the trader pubkey and runs
        // OP_CHECKSIGVERIFY against whatever is on top of the stack, so the
        // signature (not the placeholder) must be the element immediately
        // below the witness script.
        assert!(witness.nth(0).unwrap().is_empty());
        assert!(!witness.nth(1).unwrap().is_empty());
        assert_eq!(witness.nth(2).unwrap(), script.as_bytes());
    }
}
