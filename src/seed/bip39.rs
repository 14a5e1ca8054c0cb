//! BIP39 mnemonic + passphrase seed ingestion. Thin wrapper over the
//! `bip39` crate's PBKDF2-HMAC-SHA512 seed stretch.

use bip39::Mnemonic;
use bitcoin::bip32::Xpriv;
use bitcoin::Network;

use crate::error::{Error, Result};

/// Decodes `mnemonic` and stretches it (with `passphrase`) into a BIP32
/// master extended private key.
pub fn master_key_from_mnemonic(
    mnemonic: &str,
    passphrase: &str,
    network: Network,
) -> Result<Xpriv> {
    let mnemonic = Mnemonic::parse_normalized(mnemonic)
        .map_err(|e| Error::SeedDecode(format!("invalid BIP39 mnemonic: {e}")))?;
    let seed = mnemonic.to_seed(passphrase);
    Xpriv::new_master(network, &seed).map_err(|e| Error::SeedDecode(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    const TEST_MNEMONIC: &str = "abandon abandon abandon abandon abandon abandon \
         abandon abandon abandon abandon abandon about";

    #[test]
    fn decodes_known_test_mnemonic() {
        let key = master_key_from_mnemonic(TEST_MNEMONIC, "", Network::Bitcoin).unwrap();
        assert_eq!(key.depth, 0);
    }

    #[test]
    fn passphrase_changes_the_derived_key() {
        let a = master_key_from_mnemonic(TEST_MNEMONIC, "", Network::Bitcoin).unwrap();
        let b = master_key_from_mnemonic(TEST_MNEMONIC, "TREZOR", Network::Bitcoin).unwrap();
        assert_ne!(a.private_key, b.private_key);
    }

    #[test]
    fn rejects_malformed_mnemonic() {
        assert!(master_key_from_mnemonic("not a real seed phrase", "", Network::Bitcoin).is_err());
    }
}
