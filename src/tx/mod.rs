//! Sweep-Transaction-Builder (STB): turns SR's recovered outputs into a
//! transaction, estimates its fee, signs it, and hands it off to be
//! printed or published.

pub mod builder;
pub mod psbt;
pub mod sign;
pub mod weight;

pub use builder::{BuilderState, SweepBuilder, DUST_LIMIT_SAT};
