//! Seed-selection flags shared by every command that needs a root key.
//!
//! Three mutually exclusive sources, each with an environment-variable
//! fallback for unattended use. A literal `-` for a passphrase/password
//! flag or env var means "empty", not "use the default".

use clap::Args;

use crate::error::{Error, Result};
use crate::params::Params;
use crate::seed::SeedSource;

const NO_PASSPHRASE: &str = "-";

#[derive(Debug, Args)]
pub struct SeedArgs {
    /// Raw xprv/xpub string. Mutually exclusive with --bip39 and --walletdb.
    #[arg(long, global = true)]
    pub rootkey: Option<String>,

    /// Read a BIP39 mnemonic from AEZEED_MNEMONIC/BIP39_MNEMONIC env vars
    /// instead of an aezeed seed.
    #[arg(long, global = true)]
    pub bip39: bool,

    /// Path to an lnd wallet.db to decrypt the root key from.
    #[arg(long, global = true)]
    pub walletdb: Option<std::path::PathBuf>,
}

impl SeedArgs {
    /// Resolves the flags (and their env var fallbacks) into one
    /// [`SeedSource`]. Precedence: `--rootkey` > `--walletdb` > `--bip39` >
    /// aezeed (the default when nothing else is given).
    pub fn resolve(&self, params: &Params) -> Result<SeedSource> {
        if let Some(xprv) = &self.rootkey {
            return Ok(SeedSource::RawExtendedKey(xprv.clone()));
        }

        if let Some(path) = &self.walletdb {
            let password = env_or_dash("WALLET_PASSWORD").unwrap_or_default();
            return Ok(SeedSource::WalletFile {
                path: path.clone(),
                password,
            });
        }

        if self.bip39 {
            let mnemonic = require_env("BIP39_MNEMONIC")?;
            let passphrase = env_or_dash("BIP39_PASSPHRASE").unwrap_or_default();
            return Ok(SeedSource::Bip39 {
                mnemonic,
                passphrase,
                network: params.network,
            });
        }

        let mnemonic = require_env("AEZEED_MNEMONIC")?;
        let passphrase = env_or_dash("AEZEED_PASSPHRASE").unwrap_or_default();
        let words: Vec<String> = mnemonic.split_whitespace().map(str::to_string).collect();
        Ok(SeedSource::Aezeed { words, passphrase })
    }
}

/// Reads `var`; `-` collapses to an empty string, anything else passes
/// through unchanged. Missing is `None`.
fn env_or_dash(var: &str) -> Option<String> {
    std::env::var(var).ok().map(|v| {
        if v == NO_PASSPHRASE {
            String::new()
        } else {
            v
        }
    })
}

fn require_env(var: &str) -> Result<String> {
    std::env::var(var).map_err(|_| Error::input(format!("missing required environment variable {var}")))
}
