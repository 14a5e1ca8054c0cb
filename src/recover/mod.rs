//! Script reconstructor and brute-force engine (SR): given an observed
//! output and whatever context is available, searches a bounded key space
//! for the exact derivation that produced it.

pub mod anchor;
pub mod commit;
pub mod funding;
pub mod loopin;
pub mod pool;
pub mod types;

pub use commit::{classify_outputs, OutputClass, ANCHOR_VALUE_SAT};
pub use types::{RecoveredOutput, ScriptKind, SpendMethod};
