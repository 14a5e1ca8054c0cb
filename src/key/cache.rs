//! [`KeyCache`] — an explicit, per-invocation replacement for the shared
//! global derived-key cache the brute-force search functions in SR.commit,
//! SR.pool, and SR.funding all read from. Constructed once at the start of
//! a command and passed by reference into the search functions; no global
//! state, per the REDESIGN FLAGS note on shared mutable caches.
//!
//! Entries are derived lazily on first access and never evicted — the
//! cache lives and dies with the command invocation, so there is no
//! eviction policy to get wrong.

use std::cell::RefCell;
use std::collections::HashMap;

use bitcoin::bip32::Xpriv;
use bitcoin::secp256k1::{PublicKey, Secp256k1, SecretKey};

use crate::error::Result;
use crate::key::descriptor::KeyDescriptor;
use crate::key::extended::derive_path_nonstandard;
use crate::key::locator::KeyLocator;
use crate::key::path::lightning_path;
use crate::params::Params;

pub struct KeyCache<'a> {
    secp: &'a Secp256k1<bitcoin::secp256k1::All>,
    root: Xpriv,
    params: Params,
    entries: RefCell<HashMap<KeyLocator, (SecretKey, PublicKey)>>,
}

impl<'a> KeyCache<'a> {
    pub fn new(secp: &'a Secp256k1<bitcoin::secp256k1::All>, root: Xpriv, params: Params) -> Self {
        KeyCache {
            secp,
            root,
            params,
            entries: RefCell::new(HashMap::new()),
        }
    }

    /// Returns the `(privkey, pubkey)` pair for `locator`, deriving and
    /// memoizing it on first access. Lightning keys always derive with the
    /// non-standard rule — see the derivation-audit note in `key::extended`.
    pub fn get(&self, locator: KeyLocator) -> Result<(SecretKey, PublicKey)> {
        if let Some(found) = self.entries.borrow().get(&locator) {
            return Ok(*found);
        }
        let path = lightning_path(&self.params, locator)?;
        let xpriv = derive_path_nonstandard(self.secp, &self.root, &path)?;
        let secret = xpriv.private_key;
        let pubkey = PublicKey::from_secret_key(self.secp, &secret);
        self.entries.borrow_mut().insert(locator, (secret, pubkey));
        Ok((secret, pubkey))
    }

    pub fn descriptor(&self, locator: KeyLocator) -> Result<KeyDescriptor> {
        let (_, pubkey) = self.get(locator)?;
        Ok(KeyDescriptor::new(locator, pubkey))
    }

    pub fn secret(&self, locator: KeyLocator) -> Result<SecretKey> {
        Ok(self.get(locator)?.0)
    }

    pub fn pubkey(&self, locator: KeyLocator) -> Result<PublicKey> {
        Ok(self.get(locator)?.1)
    }

    pub fn len(&self) -> usize {
        self.entries.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::key::locator::KeyFamily;
    use bitcoin::Network;

    #[test]
    fn repeated_lookups_are_memoized_and_stable() {
        let secp = Secp256k1::new();
        let root = Xpriv::new_master(Network::Bitcoin, &[3u8; 32]).unwrap();
        let cache = KeyCache::new(&secp, root, Params::mainnet());

        let loc = KeyLocator::new(KeyFamily::HtlcBase, 17);
        let first = cache.get(loc).unwrap();
        let second = cache.get(loc).unwrap();
        assert_eq!(first, second);
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn distinct_locators_derive_distinct_keys() {
        let secp = Secp256k1::new();
        let root = Xpriv::new_master(Network::Bitcoin, &[3u8; 32]).unwrap();
        let cache = KeyCache::new(&secp, root, Params::mainnet());

        let a = cache.pubkey(KeyLocator::new(KeyFamily::HtlcBase, 0)).unwrap();
        let b = cache.pubkey(KeyLocator::new(KeyFamily::HtlcBase, 1)).unwrap();
        assert_ne!(a, b);
    }
}
