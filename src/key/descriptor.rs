//! [`KeyDescriptor`] — a locator plus the derived public key. Transient by
//! design: never persisted, always recomputed from the locator and the root
//! key when needed again.

use bitcoin::secp256k1::PublicKey;

use crate::key::locator::KeyLocator;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeyDescriptor {
    pub locator: KeyLocator,
    pub pubkey: PublicKey,
}

impl KeyDescriptor {
    pub fn new(locator: KeyLocator, pubkey: PublicKey) -> Self {
        KeyDescriptor { locator, pubkey }
    }
}
