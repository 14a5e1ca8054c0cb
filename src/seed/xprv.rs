//! Raw BIP32 extended key ingestion: a user-supplied `xprv.../tprv...` or
//! `xpub.../tpub...` string, parsed directly with no KDF involved. Public
//! keys are accepted so that commands that only need to *verify* derived
//! addresses (rather than sign) can run against a watch-only root.

use bitcoin::bip32::{Xpriv, Xpub};

use crate::error::{Error, Result};
use crate::key::ExtendedKey;

pub fn parse_extended_key(s: &str) -> Result<ExtendedKey> {
    let s = s.trim();
    if let Ok(xprv) = s.parse::<Xpriv>() {
        return Ok(ExtendedKey::from_xpriv(xprv));
    }
    if let Ok(xpub) = s.parse::<Xpub>() {
        return Ok(ExtendedKey::from_xpub(xpub));
    }
    Err(Error::SeedDecode(format!(
        "not a recognizable extended key: {s}"
    )))
}

#[cfg(test)]
mod tests {
    use super::*;
    use bitcoin::bip32::Xpriv;
    use bitcoin::Network;

    #[test]
    fn parses_private_extended_key() {
        let xprv = Xpriv::new_master(Network::Bitcoin, &[7u8; 64]).unwrap();
        let parsed = parse_extended_key(&xprv.to_string()).unwrap();
        assert!(parsed.is_private());
        assert_eq!(parsed.as_xpriv().unwrap().private_key, xprv.private_key);
    }

    #[test]
    fn parses_public_extended_key() {
        let secp = bitcoin::secp256k1::Secp256k1::new();
        let xprv = Xpriv::new_master(Network::Bitcoin, &[9u8; 64]).unwrap();
        let xpub = Xpub::from_priv(&secp, &xprv);
        let parsed = parse_extended_key(&xpub.to_string()).unwrap();
        assert!(!parsed.is_private());
    }

    #[test]
    fn rejects_garbage_input() {
        assert!(parse_extended_key("not-a-key").is_err());
    }
}
