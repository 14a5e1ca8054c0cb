//! The shared result type every SR search funnels into: a fully
//! reconstructed, spendable output plus enough context for STB to sign it
//! without re-deriving anything.

use bitcoin::secp256k1::Scalar;
use bitcoin::taproot::TaprootSpendInfo;
use bitcoin::{Amount, OutPoint, ScriptBuf};

use crate::key::KeyDescriptor;

/// How STB must sign this input.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpendMethod {
    WitnessV0,
    TaprootKeySpend,
    TaprootScriptSpend,
}

/// For `SpendMethod::WitnessV0` outputs, which witness-stack shape to
/// build — the segwit v0 scripts differ enough (single-sig vs. 2-of-2,
/// extra dummy pushes for `OP_NOTIF` branches) that dispatch needs more
/// than `witness_script.is_some()`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScriptKind {
    P2wkh,
    ToRemoteConfirmed,
    Anchor,
    FundingMultisig,
    PoolSegwitExpiry,
    LoopHtlcV2Timeout,
}

/// An output SR has matched against an observed UTXO, with every field STB
/// needs to build a witness and nothing it would need to re-derive.
#[derive(Clone)]
pub struct RecoveredOutput {
    pub outpoint: OutPoint,
    pub prev_value: Amount,
    pub prev_pk_script: ScriptBuf,
    /// The segwit v0 witness script, when `spend_method == WitnessV0`.
    pub witness_script: Option<ScriptBuf>,
    /// The taproot tree, when the output is a taproot key- or script-spend.
    pub script_tree: Option<TaprootSpendInfo>,
    /// The specific leaf being spent, when `spend_method ==
    /// TaprootScriptSpend`.
    pub leaf_script: Option<ScriptBuf>,
    pub key_descriptor: KeyDescriptor,
    /// Per-commitment tweak applied to the base key, for legacy
    /// tweaked-P2WKH commitment outputs.
    pub single_tweak: Option<Scalar>,
    pub spend_method: SpendMethod,
    /// Witness-stack shape to build, when `spend_method == WitnessV0`.
    pub script_kind: Option<ScriptKind>,
    /// `tx.lock_time` this input requires (Pool expiry, Loop CLTV).
    pub required_locktime: Option<u32>,
    /// `tx_in.sequence` this input requires (CSV=1 for confirmed
    /// to-remote / taproot to-remote outputs).
    pub required_sequence: Option<u32>,
}

impl RecoveredOutput {
    /// The locktime all recovered outputs in a batch must agree on, or an
    /// error description of the conflicting values. `None` inputs (no
    /// constraint) are compatible with any locktime.
    pub fn reconcile_locktime(outputs: &[RecoveredOutput]) -> Option<u32> {
        outputs.iter().filter_map(|o| o.required_locktime).next()
    }
}
