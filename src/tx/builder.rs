//! STB's sweep assembly: turns a batch of `RecoveredOutput`s and a
//! destination script into an unsigned transaction, then walks it through
//! `Draft -> Estimated -> Signed -> {Printed, Published}` as the caller
//! supplies a fee rate, signs each input, and finally either prints the
//! raw hex or hands it to the chain API.

use bitcoin::absolute::LockTime;
use bitcoin::secp256k1::{All, Secp256k1};
use bitcoin::transaction::Version;
use bitcoin::{Amount, ScriptBuf, Sequence, Transaction, TxIn, TxOut, Witness};

use crate::error::{Error, Result};
use crate::recover::{RecoveredOutput, ScriptKind, SpendMethod};

use super::weight::{self, WeightEstimator};

pub const DUST_LIMIT_SAT: u64 = 600;

/// `1` satoshi per vbyte, the unit this tool takes fee rates in;
/// internally everything converts to sat/kw, matching how lnd quotes fees.
pub fn sat_per_vbyte_to_sat_per_kw(fee_rate_sat_per_vbyte: u64) -> u64 {
    1000 * fee_rate_sat_per_vbyte / 4
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BuilderState {
    Draft,
    Estimated,
    Signed,
    Printed,
    Published,
}

pub struct SweepBuilder {
    outputs: Vec<RecoveredOutput>,
    destination: ScriptBuf,
    fee_rate_sat_per_vbyte: u64,
    state: BuilderState,
    tx: Transaction,
}

impl SweepBuilder {
    /// Builds the unsigned transaction skeleton: one input per recovered
    /// output (appropriate sequence), one output paying the full input sum
    /// minus an estimated fee to `destination`, and a locktime reconciled
    /// across every input that requires one.
    pub fn new(
        outputs: Vec<RecoveredOutput>,
        destination: ScriptBuf,
        fee_rate_sat_per_vbyte: u64,
    ) -> Result<Self> {
        if outputs.is_empty() {
            return Err(Error::input("no recovered outputs to sweep"));
        }
        if fee_rate_sat_per_vbyte == 0 {
            return Err(Error::input("fee rate must be positive"));
        }

        let lock_time = match RecoveredOutput::reconcile_locktime(&outputs) {
            Some(height) => LockTime::from_consensus(height),
            None => LockTime::ZERO,
        };

        let input = outputs
            .iter()
            .map(|o| TxIn {
                previous_output: o.outpoint,
                script_sig: ScriptBuf::new(),
                sequence: o
                    .required_sequence
                    .map(Sequence::from_consensus)
                    .unwrap_or(Sequence::MAX),
                witness: Witness::new(),
            })
            .collect();

        let total_in: Amount = outputs.iter().map(|o| o.prev_value).sum();
        let tx = Transaction {
            version: Version::TWO,
            lock_time,
            input,
            // Placeholder value, corrected once `estimate` knows the fee.
            output: vec![TxOut {
                value: total_in,
                script_pubkey: destination.clone(),
            }],
        };

        Ok(SweepBuilder {
            outputs,
            destination,
            fee_rate_sat_per_vbyte,
            state: BuilderState::Draft,
            tx,
        })
    }

    pub fn state(&self) -> BuilderState {
        self.state
    }

    pub fn outputs(&self) -> &[RecoveredOutput] {
        &self.outputs
    }

    fn witness_weight_for(output: &RecoveredOutput) -> Result<u64> {
        let w = match output.spend_method {
            SpendMethod::WitnessV0 => match output.script_kind {
                Some(ScriptKind::P2wkh) | None => weight::P2WKH_WITNESS_WEIGHT,
                Some(ScriptKind::ToRemoteConfirmed) => weight::TO_REMOTE_CONFIRMED_WITNESS_WEIGHT,
                Some(ScriptKind::Anchor) => weight::ANCHOR_WITNESS_WEIGHT,
                Some(ScriptKind::FundingMultisig) => weight::FUNDING_MULTISIG_WITNESS_WEIGHT,
                Some(ScriptKind::PoolSegwitExpiry) => weight::POOL_EXPIRY_WITNESS_WEIGHT,
                Some(ScriptKind::LoopHtlcV2Timeout) => weight::LOOP_HTLC_V2_WITNESS_WEIGHT,
            },
            SpendMethod::TaprootKeySpend => weight::TAPROOT_KEYSPEND_WITNESS_WEIGHT,
            SpendMethod::TaprootScriptSpend => {
                let leaf = output
                    .leaf_script
                    .as_ref()
                    .ok_or_else(|| Error::input("taproot script-spend output missing a leaf script"))?;
                let info = output
                    .script_tree
                    .as_ref()
                    .ok_or_else(|| Error::input("taproot script-spend output missing its spend tree"))?;
                let control_block = info
                    .control_block(&(leaf.clone(), bitcoin::taproot::LeafVersion::TapScript))
                    .ok_or_else(|| Error::input("leaf script absent from its own spend tree"))?;
                // item-count byte + (len-prefix + sig) + (len-prefix + leaf) + (len-prefix + control block)
                1 + (1 + 65) + (1 + leaf.len() as u64) + (1 + control_block.serialize().len() as u64)
            }
        };
        Ok(w)
    }

    fn estimate_weight(&self) -> Result<WeightEstimator> {
        let mut est = WeightEstimator::new();
        for output in &self.outputs {
            match output.spend_method {
                SpendMethod::WitnessV0 => {
                    est.add_witness_input(Self::witness_weight_for(output)?);
                }
                SpendMethod::TaprootKeySpend => {
                    est.add_taproot_keyspend_input(false);
                }
                SpendMethod::TaprootScriptSpend => {
                    est.add_taproot_scriptspend_input(Self::witness_weight_for(output)?);
                }
            }
        }
        if is_taproot_output(&self.destination) {
            est.add_p2tr_output();
        } else {
            est.add_p2wkh_output();
        }
        Ok(est)
    }

    /// Computes the fee from the estimated weight, subtracts it from the
    /// sole output, and refuses to proceed if that leaves a dust output.
    pub fn estimate(&mut self) -> Result<&Transaction> {
        let est = self.estimate_weight()?;
        let vsize = est.vsize();
        let fee = vsize * self.fee_rate_sat_per_vbyte;

        let total_in: Amount = self.outputs.iter().map(|o| o.prev_value).sum();
        let fee_amount = Amount::from_sat(fee);
        if total_in <= fee_amount {
            return Err(Error::Dust {
                value: 0,
                limit: DUST_LIMIT_SAT,
            });
        }
        let sweep_value = total_in - fee_amount;
        if sweep_value.to_sat() < DUST_LIMIT_SAT {
            return Err(Error::Dust {
                value: sweep_value.to_sat(),
                limit: DUST_LIMIT_SAT,
            });
        }

        self.tx.output[0] = TxOut {
            value: sweep_value,
            script_pubkey: self.destination.clone(),
        };
        self.state = BuilderState::Estimated;
        Ok(&self.tx)
    }

    /// The prevouts every input's sighash needs, in input order — taproot
    /// sighashing commits to the whole set.
    pub fn prevouts(&self) -> Vec<TxOut> {
        self.outputs
            .iter()
            .map(|o| TxOut {
                value: o.prev_value,
                script_pubkey: o.prev_pk_script.clone(),
            })
            .collect()
    }

    pub fn transaction(&self) -> &Transaction {
        &self.tx
    }

    pub fn transaction_mut(&mut self) -> &mut Transaction {
        &mut self.tx
    }

    /// Signs every input with the secret the cache resolves for its
    /// descriptor. `counterparty_signatures` supplies a signature per
    /// input index for funding-multisig spends; inputs of any other shape
    /// ignore it.
    pub fn sign_all(
        &mut self,
        secp: &Secp256k1<All>,
        secrets: &[bitcoin::secp256k1::SecretKey],
        counterparty_signatures: &std::collections::HashMap<usize, (bitcoin::secp256k1::PublicKey, Vec<u8>)>,
    ) -> Result<()> {
        if self.state != BuilderState::Estimated {
            return Err(Error::input("sweep must be estimated before it can be signed"));
        }
        if secrets.len() != self.outputs.len() {
            return Err(Error::input("one secret key is required per recovered output"));
        }

        let prevouts = self.prevouts();
        for (index, (output, secret)) in self.outputs.iter().zip(secrets.iter()).enumerate() {
            let counterparty = counterparty_signatures
                .get(&index)
                .map(|(pk, sig)| (pk, sig.as_slice()));
            super::sign::sign_input(secp, &mut self.tx, index, &prevouts, output, secret, counterparty)?;
        }
        self.state = BuilderState::Signed;
        Ok(())
    }

    pub fn mark_printed(&mut self) -> Result<()> {
        if self.state != BuilderState::Signed {
            return Err(Error::input("sweep must be signed before it can be printed"));
        }
        self.state = BuilderState::Printed;
        Ok(())
    }

    pub fn mark_published(&mut self) -> Result<()> {
        if !matches!(self.state, BuilderState::Signed | BuilderState::Printed) {
            return Err(Error::input("sweep must be signed before it can be published"));
        }
        self.state = BuilderState::Published;
        Ok(())
    }
}

fn is_taproot_output(script: &ScriptBuf) -> bool {
    script.is_p2tr()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::key::addresses::p2wkh_addr;
    use crate::params::Params;
    use bitcoin::secp256k1::{PublicKey, SecretKey};
    use bitcoin::OutPoint;

    fn test_output(byte: u8, value_sat: u64) -> (RecoveredOutput, SecretKey) {
        let secp = Secp256k1::new();
        let secret = SecretKey::from_slice(&[byte; 32]).unwrap();
        let pubkey = PublicKey::from_secret_key(&secp, &secret);
        let params = Params::mainnet();
        let script = p2wkh_addr(&pubkey, &params).unwrap().script_pubkey();
        let output = RecoveredOutput {
            outpoint: OutPoint::null(),
            prev_value: Amount::from_sat(value_sat),
            prev_pk_script: script,
            witness_script: None,
            script_tree: None,
            leaf_script: None,
            key_descriptor: crate::key::KeyDescriptor::new(
                crate::key::locator::KeyLocator::raw(0, byte as u32),
                pubkey,
            ),
            single_tweak: None,
            spend_method: SpendMethod::WitnessV0,
            script_kind: Some(ScriptKind::P2wkh),
            required_locktime: None,
            required_sequence: None,
        };
        (output, secret)
    }

    #[test]
    fn estimate_deducts_fee_from_sweep_output() {
        let (output, _) = test_output(1, 100_000);
        let secp = Secp256k1::new();
        let dest_secret = SecretKey::from_slice(&[2u8; 32]).unwrap();
        let dest_pubkey = PublicKey::from_secret_key(&secp, &dest_secret);
        let dest = p2wkh_addr(&dest_pubkey, &Params::mainnet()).unwrap().script_pubkey();

        let mut builder = SweepBuilder::new(vec![output], dest, 10).unwrap();
        let tx = builder.estimate().unwrap();
        assert!(tx.output[0].value.to_sat() < 100_000);
        assert_eq!(builder.state(), BuilderState::Estimated);
    }

    #[test]
    fn refuses_dust_sweep() {
        let (output, _) = test_output(3, 700);
        let secp = Secp256k1::new();
        let dest_secret = SecretKey::from_slice(&[4u8; 32]).unwrap();
        let dest_pubkey = PublicKey::from_secret_key(&secp, &dest_secret);
        let dest = p2wkh_addr(&dest_pubkey, &Params::mainnet()).unwrap().script_pubkey();

        let mut builder = SweepBuilder::new(vec![output], dest, 50).unwrap();
        let err = builder.estimate().unwrap_err();
        assert!(matches!(err, Error::Dust { .. }));
    }

    #[test]
    fn sign_all_requires_estimated_state() {
        let (output, secret) = test_output(5, 50_000);
        let secp = Secp256k1::new();
        let dest = output.prev_pk_script.clone();
        let mut builder = SweepBuilder::new(vec![output], dest, 10).unwrap();
        let err = builder
            .sign_all(&secp, &[secret], &std::collections::HashMap::new())
            .unwrap_err();
        assert!(matches!(err, Error::InputValidation(_)));
    }
}
