//! Per-commitment key tweaking for legacy (pre-static-remote-key) commitment
//! outputs: `tweak = SHA256(per_commitment_point || basepoint)`, applied as
//! an EC tweak to the base point to get the per-state spending key. This is
//! the one family member of SR.commit's match set that needs a commit
//! point at all; the other three (static-remote-key, tweakless/anchor,
//! taproot) spend the base point directly.

use bitcoin::secp256k1::{PublicKey, Scalar, Secp256k1, SecretKey, Signing, Verification};
use sha2::{Digest, Sha256};

use crate::error::{Error, Result};

/// `SHA256(per_commitment_point || basepoint)` as an EC scalar, or an error
/// if (astronomically unlikely) the digest is not a valid scalar.
pub fn commit_tweak(per_commitment_point: &PublicKey, basepoint: &PublicKey) -> Result<Scalar> {
    let mut hasher = Sha256::new();
    hasher.update(per_commitment_point.serialize());
    hasher.update(basepoint.serialize());
    let digest: [u8; 32] = hasher.finalize().into();
    Scalar::from_be_bytes(digest).map_err(|_| Error::derivation("commit tweak out of range"))
}

/// Applies the commit tweak to a base public key.
pub fn tweak_pubkey(
    secp: &Secp256k1<impl Verification>,
    basepoint: &PublicKey,
    per_commitment_point: &PublicKey,
) -> Result<PublicKey> {
    let tweak = commit_tweak(per_commitment_point, basepoint)?;
    basepoint
        .add_exp_tweak(secp, &tweak)
        .map_err(|e| Error::derivation(e.to_string()))
}

/// Applies the same tweak to the corresponding base private key, so the
/// recovered key actually spends the tweaked output SR matched against.
pub fn tweak_privkey(
    secp: &Secp256k1<impl Signing>,
    base_secret: &SecretKey,
    per_commitment_point: &PublicKey,
) -> Result<SecretKey> {
    let basepoint = PublicKey::from_secret_key(secp, base_secret);
    let tweak = commit_tweak(per_commitment_point, &basepoint)?;
    base_secret
        .add_tweak(&tweak)
        .map_err(|e| Error::derivation(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn secp() -> Secp256k1<bitcoin::secp256k1::All> {
        Secp256k1::new()
    }

    #[test]
    fn tweaked_pub_and_priv_stay_in_sync() {
        let secp = secp();
        let base = SecretKey::from_slice(&[1u8; 32]).unwrap();
        let base_pub = PublicKey::from_secret_key(&secp, &base);
        let commit_point_secret = SecretKey::from_slice(&[2u8; 32]).unwrap();
        let commit_point = PublicKey::from_secret_key(&secp, &commit_point_secret);

        let tweaked_pub = tweak_pubkey(&secp, &base_pub, &commit_point).unwrap();
        let tweaked_priv = tweak_privkey(&secp, &base, &commit_point).unwrap();
        assert_eq!(PublicKey::from_secret_key(&secp, &tweaked_priv), tweaked_pub);
    }

    #[test]
    fn different_commit_points_give_different_keys() {
        let secp = secp();
        let base_pub =
            PublicKey::from_secret_key(&secp, &SecretKey::from_slice(&[3u8; 32]).unwrap());
        let p1 = PublicKey::from_secret_key(&secp, &SecretKey::from_slice(&[4u8; 32]).unwrap());
        let p2 = PublicKey::from_secret_key(&secp, &SecretKey::from_slice(&[5u8; 32]).unwrap());

        let k1 = tweak_pubkey(&secp, &base_pub, &p1).unwrap();
        let k2 = tweak_pubkey(&secp, &base_pub, &p2).unwrap();
        assert_ne!(k1, k2);
    }
}
