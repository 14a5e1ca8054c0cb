//! Crate-wide error type.
//!
//! Mirrors the error kinds in the design's propagation policy: every
//! fallible operation returns `Result<T>` up to the CLI layer, which is the
//! only place that formats a message and sets the process exit code.

use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    #[error("invalid input: {0}")]
    InputValidation(String),

    #[error("dust output: {value} sat is below the {limit} sat dust limit")]
    Dust { value: u64, limit: u64 },

    #[error("seed decode failed: {0}")]
    SeedDecode(String),

    #[error("wrong passphrase or password")]
    WrongPassphrase,

    #[error("derivation failed: {0}")]
    Derivation(String),

    #[error("path must be absolute and start with 'm/'")]
    PathNotAbsolute,

    #[error("cannot derive a private child from a neutered (public-only) key")]
    NeuteredPrivateOp,

    #[error("search exhausted: no match for {target} in {searched} candidates ({ranges})")]
    SearchExhausted {
        target: String,
        searched: usize,
        ranges: String,
    },

    #[error("signing failed: {0}")]
    Signing(String),

    #[error("script engine verification failed for input {index}")]
    ScriptVerification { index: usize },

    #[error("counterparty signature missing for input {index}")]
    MissingCounterpartySignature { index: usize },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("chain API error: {0}")]
    ChainApi(String),

    #[error("broadcast rejected: {0}")]
    BroadcastRejected(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("hex decode error: {0}")]
    Hex(#[from] hex::FromHexError),

    #[error("bitcoin encoding error: {0}")]
    BitcoinEncoding(String),
}

impl Error {
    pub fn input(msg: impl Into<String>) -> Self {
        Error::InputValidation(msg.into())
    }

    pub fn derivation(msg: impl Into<String>) -> Self {
        Error::Derivation(msg.into())
    }
}
