//! SR.commit: brute-force recovery of a remotely force-closed commitment
//! output. Walks the six Lightning key families, `0..num_keys` each, and
//! for every candidate base key tests all four commitment output shapes in
//! the documented order; on a match, returns immediately rather than
//! continuing to search (first match in enumeration order wins).

use bitcoin::secp256k1::{PublicKey, Secp256k1};
use bitcoin::{Amount, OutPoint, ScriptBuf};
use tracing::debug;

use crate::error::{Error, Result};
use crate::key::addresses::{p2anchor_static_remote, p2taproot_static_remote, p2wkh_addr};
use crate::key::descriptor::KeyDescriptor;
use crate::key::locator::{KeyFamily, KeyLocator};
use crate::key::KeyCache;
use crate::params::Params;
use crate::script::commitment::{commit_tweak, tweak_pubkey};

use super::types::{RecoveredOutput, ScriptKind, SpendMethod};

pub const DEFAULT_NUM_KEYS: u32 = 5000;
const PROGRESS_INTERVAL: u32 = 100;

/// Anchor outputs are a fixed 330 sat, the value BOLT3 assigns them
/// regardless of channel type.
pub const ANCHOR_VALUE_SAT: u64 = 330;

/// What a single commitment output turned out to be, for the SCB
/// force-close path — which has a channel's remote payment-base key but
/// no local channel-DB context to identify to-local/HTLC outputs with.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputClass {
    ToRemote,
    Anchor,
    /// Either a to-local output or an in-flight HTLC; both need a channel
    /// DB (or further per-HTLC context this crate doesn't have) to
    /// distinguish, so they're reported together.
    ToLocalOrHtlc,
}

/// Classifies every output of a published commitment transaction given
/// only the remote party's payment-base key: matches the to-remote shapes
/// SR.commit already knows (static-remote-key, tweakless/anchor P2WSH,
/// taproot key-spend), falls back to the fixed anchor value, and reports
/// everything else as to-local-or-HTLC.
pub fn classify_outputs(
    secp: &Secp256k1<bitcoin::secp256k1::All>,
    remote_payment_base: &PublicKey,
    params: &Params,
    outputs: &[(Amount, ScriptBuf)],
) -> Result<Vec<OutputClass>> {
    let to_remote_p2wkh = p2wkh_addr(remote_payment_base, params)?.script_pubkey();
    let (to_remote_anchor_addr, _) = p2anchor_static_remote(remote_payment_base, params);
    let to_remote_taproot = p2taproot_static_remote(secp, remote_payment_base, params)
        .ok()
        .map(|(addr, _)| addr.script_pubkey());

    Ok(outputs
        .iter()
        .map(|(value, script)| {
            if *script == to_remote_p2wkh
                || *script == to_remote_anchor_addr.script_pubkey()
                || to_remote_taproot.as_ref() == Some(script)
            {
                OutputClass::ToRemote
            } else if value.to_sat() == ANCHOR_VALUE_SAT {
                OutputClass::Anchor
            } else {
                OutputClass::ToLocalOrHtlc
            }
        })
        .collect())
}

/// Searches for the `(family, index[, commit_point])` that reproduces
/// `prev_pk_script`. `commit_points` is the caller-supplied candidate list
/// (channel DB, log scrape, or user input); an empty list still covers the
/// three commit-point-independent shapes (static-remote-key, tweakless
/// P2WSH, taproot).
pub fn search_commit_output(
    secp: &Secp256k1<bitcoin::secp256k1::All>,
    cache: &KeyCache,
    params: &Params,
    outpoint: OutPoint,
    prev_value: Amount,
    prev_pk_script: &ScriptBuf,
    commit_points: &[PublicKey],
    num_keys: u32,
) -> Result<RecoveredOutput> {
    let commit_candidates: Vec<Option<PublicKey>> = if commit_points.is_empty() {
        vec![None]
    } else {
        commit_points.iter().map(|p| Some(*p)).collect()
    };

    for commit_point in &commit_candidates {
        for family in KeyFamily::COMMIT_SEARCH_FAMILIES {
            for index in 0..num_keys {
                if index % PROGRESS_INTERVAL == 0 {
                    debug!(family = family.as_u32(), index, "SR.commit searching");
                }
                let locator = KeyLocator::new(family, index);
                let (_, pubkey) = cache.get(locator)?;

                if let Some(result) = try_match(
                    secp,
                    &pubkey,
                    *commit_point,
                    params,
                    locator,
                    outpoint,
                    prev_value,
                    prev_pk_script,
                )? {
                    return Ok(result);
                }
            }
        }
    }

    Err(Error::SearchExhausted {
        target: hex::encode(prev_pk_script.as_bytes()),
        searched: commit_candidates.len()
            * KeyFamily::COMMIT_SEARCH_FAMILIES.len()
            * num_keys as usize,
        ranges: format!(
            "{} commit point(s) x {} families x [0, {num_keys})",
            commit_candidates.len(),
            KeyFamily::COMMIT_SEARCH_FAMILIES.len()
        ),
    })
}

#[allow(clippy::too_many_arguments)]
fn try_match(
    secp: &Secp256k1<bitcoin::secp256k1::All>,
    pubkey: &PublicKey,
    commit_point: Option<PublicKey>,
    params: &Params,
    locator: KeyLocator,
    outpoint: OutPoint,
    prev_value: Amount,
    prev_pk_script: &ScriptBuf,
) -> Result<Option<RecoveredOutput>> {
    let base = |spend_method, script_kind, witness_script, script_tree, single_tweak, required_sequence| {
        RecoveredOutput {
            outpoint,
            prev_value,
            prev_pk_script: prev_pk_script.clone(),
            witness_script,
            script_tree,
            leaf_script: None,
            key_descriptor: KeyDescriptor::new(locator, *pubkey),
            single_tweak,
            spend_method,
            script_kind,
            required_locktime: None,
            required_sequence,
        }
    };

    // static-remote-key
    if p2wkh_addr(pubkey, params)?.script_pubkey() == *prev_pk_script {
        return Ok(Some(base(
            SpendMethod::WitnessV0,
            Some(ScriptKind::P2wkh),
            None,
            None,
            None,
            None,
        )));
    }

    // tweakless / anchor P2WSH
    let (addr, script) = p2anchor_static_remote(pubkey, params);
    if addr.script_pubkey() == *prev_pk_script {
        return Ok(Some(base(
            SpendMethod::WitnessV0,
            Some(ScriptKind::ToRemoteConfirmed),
            Some(script),
            None,
            None,
            Some(1),
        )));
    }

    // taproot key-spend (simple taproot)
    if let Ok((addr, info)) = p2taproot_static_remote(secp, pubkey, params) {
        if addr.script_pubkey() == *prev_pk_script {
            return Ok(Some(base(
                SpendMethod::TaprootKeySpend,
                None,
                None,
                Some(info),
                None,
                Some(1),
            )));
        }
    }

    // tweaked P2WKH (legacy), only meaningful with a commit point
    if let Some(cp) = commit_point {
        let tweaked = tweak_pubkey(secp, pubkey, &cp)?;
        if p2wkh_addr(&tweaked, params)?.script_pubkey() == *prev_pk_script {
            let tweak_scalar = commit_tweak(&cp, pubkey)?;
            return Ok(Some(base(
                SpendMethod::WitnessV0,
                Some(ScriptKind::P2wkh),
                None,
                None,
                Some(tweak_scalar),
                None,
            )));
        }
    }

    Ok(None)
}

#[cfg(test)]
mod tests {
    use super::*;
    use bitcoin::bip32::Xpriv;
    use bitcoin::Network;

    fn test_root() -> (Secp256k1<bitcoin::secp256k1::All>, Xpriv) {
        let secp = Secp256k1::new();
        let root = Xpriv::new_master(Network::Regtest, &[42u8; 64]).unwrap();
        (secp, root)
    }

    #[test]
    fn finds_static_remote_key_output() {
        let (secp, root) = test_root();
        let params = Params::regtest();
        let cache = KeyCache::new(&secp, root, params);

        let locator = KeyLocator::new(KeyFamily::PaymentBase, 17);
        let (_, pubkey) = cache.get(locator).unwrap();
        let target_script = p2wkh_addr(&pubkey, &params).unwrap().script_pubkey();

        let result = search_commit_output(
            &secp,
            &cache,
            &params,
            OutPoint::null(),
            Amount::from_sat(50_000),
            &target_script,
            &[],
            50,
        )
        .unwrap();
        assert_eq!(result.key_descriptor.pubkey, pubkey);
        assert_eq!(result.spend_method, SpendMethod::WitnessV0);
    }

    #[test]
    fn reports_exhaustion_when_nothing_matches() {
        let (secp, root) = test_root();
        let params = Params::regtest();
        let cache = KeyCache::new(&secp, root, params);
        let bogus = ScriptBuf::from(vec![0u8; 22]);
        let err = search_commit_output(
            &secp,
            &cache,
            &params,
            OutPoint::null(),
            Amount::from_sat(1000),
            &bogus,
            &[],
            5,
        )
        .unwrap_err();
        assert!(matches!(err, Error::SearchExhausted { .. }));
    }

    #[test]
    fn classify_outputs_finds_to_remote_anchors_and_leftovers() {
        let (secp, root) = test_root();
        let params = Params::regtest();
        let cache = KeyCache::new(&secp, root, params);

        let (_, remote_payment_base) = cache.get(KeyLocator::new(KeyFamily::PaymentBase, 0)).unwrap();
        let (anchor_addr, _) = p2anchor_static_remote(&remote_payment_base, &params);

        let outputs = vec![
            (Amount::from_sat(330), ScriptBuf::from(vec![0u8; 34])),
            (Amount::from_sat(330), ScriptBuf::from(vec![1u8; 34])),
            (Amount::from_sat(1_000_000), ScriptBuf::from(vec![2u8; 34])),
            (Amount::from_sat(790_968), anchor_addr.script_pubkey()),
        ];

        let classes = classify_outputs(&secp, &remote_payment_base, &params, &outputs).unwrap();
        assert_eq!(classes[0], OutputClass::Anchor);
        assert_eq!(classes[1], OutputClass::Anchor);
        assert_eq!(classes[2], OutputClass::ToLocalOrHtlc);
        assert_eq!(classes[3], OutputClass::ToRemote);
    }
}
