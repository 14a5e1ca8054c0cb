//! The block-explorer client: an external collaborator. This module only
//! defines the abstract contract ([`ChainApi`]) plus one concrete HTTP
//! implementation against an Esplora-style REST API; every command that
//! needs chain data takes a `&dyn ChainApi` so tests can substitute a
//! fake.

pub mod http;

use bitcoin::{Address, Amount, OutPoint, Txid};

use crate::error::Result;

/// One output of a transaction, as the abstract chain API reports it.
#[derive(Debug, Clone)]
pub struct Vout {
    pub value: Amount,
    pub scriptpubkey_hex: String,
    pub outspend: OutSpend,
}

/// Whether (and by what) a given output has already been spent.
#[derive(Debug, Clone, Default)]
pub struct OutSpend {
    pub spent: bool,
    pub txid: Option<Txid>,
    pub vin: Option<u32>,
}

#[derive(Debug, Clone)]
pub struct TransactionInfo {
    pub vout: Vec<Vout>,
}

/// The external chain API this tool depends on: fetch transaction/UTXO
/// state and publish a signed sweep. Kept intentionally narrow — no block
/// headers, no mempool policy, nothing STB/SR don't directly need.
pub trait ChainApi {
    fn get_transaction(&self, txid: Txid) -> Result<TransactionInfo>;
    fn get_unspent(&self, address: &Address) -> Result<Vec<Vout>>;
    fn get_outpoint(&self, address: &Address) -> Result<OutPoint>;
    fn get_address_for_outpoint(&self, outpoint: OutPoint) -> Result<Address>;
    fn publish_tx(&self, raw_hex: &str) -> Result<Txid>;
}

pub use http::EsploraClient;
