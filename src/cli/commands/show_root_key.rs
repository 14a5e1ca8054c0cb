//! `showrootkey`: print the root extended private key for a seed.

use crate::cli::seed_args::SeedArgs;
use crate::error::Result;
use crate::params::Params;

pub fn run(params: &Params, seed: &SeedArgs) -> Result<()> {
    let root = super::resolve_root(seed, params)?;
    println!("{root}");
    Ok(())
}
