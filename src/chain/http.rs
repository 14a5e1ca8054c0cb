//! Synchronous Esplora-style HTTP client. Every command issues at most a
//! handful of these calls, so a blocking client (rather than threading an
//! async runtime through the whole crate for a few GETs and one POST) is
//! the right fit.

use std::time::Duration;

use bitcoin::{Address, Amount, Network, OutPoint, ScriptBuf, Txid};
use serde::Deserialize;

use crate::error::{Error, Result};

use super::{ChainApi, OutSpend, TransactionInfo, Vout};

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

pub struct EsploraClient {
    base_url: String,
    client: reqwest::blocking::Client,
    network: Network,
}

impl EsploraClient {
    pub fn new(base_url: impl Into<String>, network: Network) -> Result<Self> {
        let client = reqwest::blocking::Client::builder()
            .timeout(DEFAULT_TIMEOUT)
            .build()
            .map_err(|e| Error::ChainApi(e.to_string()))?;
        Ok(EsploraClient {
            base_url: base_url.into(),
            client,
            network,
        })
    }

    /// Esplora instance run by Blockstream, scoped per network — the
    /// default unless the caller overrides the base URL.
    pub fn default_for_network(network: Network) -> Result<Self> {
        let base = match network {
            Network::Bitcoin => "https://blockstream.info/api",
            Network::Testnet => "https://blockstream.info/testnet/api",
            Network::Signet => "https://blockstream.info/signet/api",
            Network::Regtest => "http://127.0.0.1:3000",
            _ => "https://blockstream.info/api",
        };
        Self::new(base, network)
    }
}

#[derive(Deserialize)]
struct RawVout {
    value: u64,
    scriptpubkey: String,
}

#[derive(Deserialize)]
struct RawTx {
    vout: Vec<RawVout>,
}

#[derive(Deserialize)]
struct RawOutspend {
    spent: bool,
    txid: Option<String>,
    vin: Option<u32>,
}

#[derive(Deserialize)]
struct RawUtxo {
    txid: String,
    vout: u32,
    value: u64,
}

impl ChainApi for EsploraClient {
    fn get_transaction(&self, txid: Txid) -> Result<TransactionInfo> {
        let tx_url = format!("{}/tx/{}", self.base_url, txid);
        let raw_tx: RawTx = self
            .client
            .get(&tx_url)
            .send()
            .map_err(|e| Error::ChainApi(e.to_string()))?
            .error_for_status()
            .map_err(|e| Error::ChainApi(e.to_string()))?
            .json()
            .map_err(|e| Error::ChainApi(e.to_string()))?;

        let outspends_url = format!("{}/tx/{}/outspends", self.base_url, txid);
        let raw_outspends: Vec<RawOutspend> = self
            .client
            .get(&outspends_url)
            .send()
            .map_err(|e| Error::ChainApi(e.to_string()))?
            .error_for_status()
            .map_err(|e| Error::ChainApi(e.to_string()))?
            .json()
            .map_err(|e| Error::ChainApi(e.to_string()))?;

        let vout = raw_tx
            .vout
            .into_iter()
            .zip(raw_outspends.into_iter().chain(std::iter::repeat_with(|| RawOutspend {
                spent: false,
                txid: None,
                vin: None,
            })))
            .map(|(v, o)| -> Result<Vout> {
                Ok(Vout {
                    value: Amount::from_sat(v.value),
                    scriptpubkey_hex: v.scriptpubkey,
                    outspend: OutSpend {
                        spent: o.spent,
                        txid: o
                            .txid
                            .map(|t| t.parse().map_err(|_| Error::ChainApi("malformed spending txid".into())))
                            .transpose()?,
                        vin: o.vin,
                    },
                })
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(TransactionInfo { vout })
    }

    fn get_unspent(&self, address: &Address) -> Result<Vec<Vout>> {
        let url = format!("{}/address/{}/utxo", self.base_url, address);
        let raw: Vec<RawUtxo> = self
            .client
            .get(&url)
            .send()
            .map_err(|e| Error::ChainApi(e.to_string()))?
            .error_for_status()
            .map_err(|e| Error::ChainApi(e.to_string()))?
            .json()
            .map_err(|e| Error::ChainApi(e.to_string()))?;

        raw.into_iter()
            .map(|u| {
                Ok(Vout {
                    value: Amount::from_sat(u.value),
                    scriptpubkey_hex: hex::encode(address.script_pubkey().as_bytes()),
                    outspend: OutSpend::default(),
                })
            })
            .collect()
    }

    fn get_outpoint(&self, address: &Address) -> Result<OutPoint> {
        let url = format!("{}/address/{}/utxo", self.base_url, address);
        let raw: Vec<RawUtxo> = self
            .client
            .get(&url)
            .send()
            .map_err(|e| Error::ChainApi(e.to_string()))?
            .error_for_status()
            .map_err(|e| Error::ChainApi(e.to_string()))?
            .json()
            .map_err(|e| Error::ChainApi(e.to_string()))?;

        let first = raw
            .into_iter()
            .next()
            .ok_or_else(|| Error::ChainApi(format!("no unspent outputs for {address}")))?;
        let txid: Txid = first
            .txid
            .parse()
            .map_err(|_| Error::ChainApi("malformed txid".into()))?;
        Ok(OutPoint {
            txid,
            vout: first.vout,
        })
    }

    fn get_address_for_outpoint(&self, outpoint: OutPoint) -> Result<Address> {
        let info = self.get_transaction(outpoint.txid)?;
        let vout = info
            .vout
            .get(outpoint.vout as usize)
            .ok_or_else(|| Error::ChainApi(format!("{outpoint} has no such vout")))?;
        let script_bytes =
            hex::decode(&vout.scriptpubkey_hex).map_err(|e| Error::ChainApi(e.to_string()))?;
        let script = ScriptBuf::from(script_bytes);
        Address::from_script(&script, self.network).map_err(|e| Error::ChainApi(e.to_string()))
    }

    fn publish_tx(&self, raw_hex: &str) -> Result<Txid> {
        let url = format!("{}/tx", self.base_url);
        let response = self
            .client
            .post(&url)
            .body(raw_hex.to_string())
            .send()
            .map_err(|e| Error::ChainApi(e.to_string()))?;

        if !response.status().is_success() {
            let body = response.text().unwrap_or_default();
            return Err(Error::BroadcastRejected(body));
        }
        let body = response.text().map_err(|e| Error::ChainApi(e.to_string()))?;
        body.trim()
            .parse()
            .map_err(|_| Error::ChainApi(format!("unexpected publish response: {body}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_urls_are_scoped_per_network() {
        let main = EsploraClient::default_for_network(Network::Bitcoin).unwrap();
        let test = EsploraClient::default_for_network(Network::Testnet).unwrap();
        assert_ne!(main.base_url, test.base_url);
    }
}
