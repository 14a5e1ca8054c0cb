//! Hierarchical key service (KS): seed ingestion lands here as an
//! [`extended::ExtendedKey`]; everything downstream — locators,
//! descriptors, paths, address derivation, and the per-command key cache —
//! lives in this module tree.

pub mod addresses;
pub mod cache;
pub mod descriptor;
pub mod extended;
pub mod locator;
pub mod path;

pub use cache::KeyCache;
pub use descriptor::KeyDescriptor;
pub use extended::ExtendedKey;
pub use locator::{KeyFamily, KeyLocator};
