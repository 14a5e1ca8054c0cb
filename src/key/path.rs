//! BIP32 path construction and parsing.
//!
//! The canonical Lightning path is `m/1017'/coin'/family'/0/index`; wallet
//! paths follow BIP84 (`m/84'/coin'/0'/{0,1}/i`) or BIP86
//! (`m/86'/coin'/0'/{0,1}/i`). Hardened components may be written as `i'`
//! or `hi`.

use bitcoin::bip32::{ChildNumber, DerivationPath};

use crate::error::{Error, Result};
use crate::key::locator::{KeyFamily, KeyLocator};
use crate::params::Params;

/// BIP43 purpose used for every Lightning-specific key.
pub const LIGHTNING_PURPOSE: u32 = 1017;
pub const WALLET_PURPOSE_P2WPKH: u32 = 84;
pub const WALLET_PURPOSE_P2TR: u32 = 86;

/// Parses `path`, which must start with `m/`. Accepts `i'` and `hi` as
/// equivalent hardened markers.
pub fn parse_path(path: &str) -> Result<DerivationPath> {
    let path = path.trim();
    if !path.starts_with("m/") && path != "m" {
        return Err(Error::PathNotAbsolute);
    }
    let rest = path.strip_prefix("m").unwrap_or(path);
    let rest = rest.strip_prefix('/').unwrap_or(rest);
    if rest.is_empty() {
        return Ok(DerivationPath::master());
    }

    let mut children = Vec::new();
    for segment in rest.split('/') {
        children.push(parse_segment(segment)?);
    }
    Ok(DerivationPath::from(children))
}

fn parse_segment(segment: &str) -> Result<ChildNumber> {
    let segment = segment.trim();
    let (digits, hardened) = if let Some(stripped) = segment.strip_prefix('h') {
        (stripped, true)
    } else if let Some(stripped) = segment.strip_suffix('\'') {
        (stripped, true)
    } else if let Some(stripped) = segment.strip_suffix('h') {
        (stripped, true)
    } else {
        (segment, false)
    };

    let index: u32 = digits
        .parse()
        .map_err(|_| Error::input(format!("invalid path segment: {segment}")))?;

    if hardened {
        ChildNumber::from_hardened_idx(index)
            .map_err(|e| Error::derivation(format!("hardened index out of range: {e}")))
    } else {
        ChildNumber::from_normal_idx(index)
            .map_err(|e| Error::derivation(format!("normal index out of range: {e}")))
    }
}

/// Builds the canonical `m/1017'/coin'/family'/0/index` path for a Lightning
/// key locator.
pub fn lightning_path(params: &Params, locator: KeyLocator) -> Result<DerivationPath> {
    let path = format!(
        "m/{}'/{}'/{}'/0/{}",
        LIGHTNING_PURPOSE,
        params.coin_type(),
        locator.family,
        locator.index
    );
    parse_path(&path)
}

/// `m/1017'/coin'/6'/0/0` — the node's long-term identity key.
pub fn identity_path(params: &Params) -> Result<DerivationPath> {
    lightning_path(params, KeyLocator::new(KeyFamily::NodeKey, 0))
}

/// `m/1017'/coin'/0'/0/index` — a funding multisig key at `index`.
pub fn multisig_path(params: &Params, index: u32) -> Result<DerivationPath> {
    lightning_path(params, KeyLocator::new(KeyFamily::MultiSig, index))
}

/// `m/84'/coin'/0'/{0,1}/i` — BIP84 wallet default (P2WPKH) path.
pub fn wallet_default_path(params: &Params, change: bool, index: u32) -> Result<DerivationPath> {
    wallet_path(WALLET_PURPOSE_P2WPKH, params, change, index)
}

/// `m/86'/coin'/0'/{0,1}/i` — BIP86 wallet (P2TR) path.
pub fn wallet_bip86_path(params: &Params, change: bool, index: u32) -> Result<DerivationPath> {
    wallet_path(WALLET_PURPOSE_P2TR, params, change, index)
}

fn wallet_path(purpose: u32, params: &Params, change: bool, index: u32) -> Result<DerivationPath> {
    let path = format!(
        "m/{}'/{}'/0'/{}/{}",
        purpose,
        params.coin_type(),
        change as u32,
        index
    );
    parse_path(&path)
}

/// Parses a path written with explicit u32 segments, where a value at or
/// above the hardened offset (2^31) indicates hardening — matching
/// `derive_children`'s contract.
pub fn path_from_segments(segments: &[u32]) -> Result<DerivationPath> {
    let children = segments
        .iter()
        .map(|&raw| {
            if raw >= ChildNumber::HARDENED_BIT {
                ChildNumber::from_hardened_idx(raw - ChildNumber::HARDENED_BIT)
            } else {
                ChildNumber::from_normal_idx(raw)
            }
            .map_err(|e| Error::derivation(e.to_string()))
        })
        .collect::<Result<Vec<_>>>()?;
    Ok(DerivationPath::from(children))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_hardened_tick_and_h() {
        let a = parse_path("m/1017'/0'/1'/0/5").unwrap();
        let b = parse_path("m/1017h/0h/1h/0/5").unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn rejects_relative_paths() {
        assert!(parse_path("1017'/0'/1'/0/5").is_err());
    }

    #[test]
    fn lightning_path_matches_canonical_form() {
        let params = Params::mainnet();
        let path = lightning_path(&params, KeyLocator::new(KeyFamily::HtlcBase, 9)).unwrap();
        assert_eq!(path.to_string(), "m/1017'/0'/2'/0/9");
    }

    #[test]
    fn wallet_paths_use_bip84_and_bip86_purposes() {
        let params = Params::testnet();
        assert_eq!(
            wallet_default_path(&params, false, 3).unwrap().to_string(),
            "m/84'/1'/0'/0/3"
        );
        assert_eq!(
            wallet_bip86_path(&params, true, 2).unwrap().to_string(),
            "m/86'/1'/0'/1/2"
        );
    }

    #[test]
    fn segments_with_hardened_bit_match_tick_notation() {
        let a = path_from_segments(&[1017 + (1 << 31), 0 + (1 << 31), 1 + (1 << 31), 0, 5])
            .unwrap();
        let b = parse_path("m/1017'/0'/1'/0/5").unwrap();
        assert_eq!(a, b);
    }
}
