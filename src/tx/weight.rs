//! Transaction weight estimation. STB needs an accurate vsize before it can
//! pick a fee, but it can't serialize a signed transaction to measure one —
//! the whole point is that nothing is signed yet. So, as every wallet that
//! builds PSBTs before signing does, it accumulates weight contributions
//! per input/output shape from known constants instead.
//!
//! Constants are expressed in weight units (`bitcoin::Weight`), following
//! BIP141: non-witness bytes count 4x, witness bytes count 1x.

use bitcoin::Weight;

/// Fixed per-input non-witness contribution: 36-byte outpoint + 1-byte
/// empty scriptSig length + 4-byte sequence, all weighted 4x.
const INPUT_BASE_WEIGHT: u64 = (36 + 1 + 4) * 4;

/// Fixed overhead for a segwit transaction: 4-byte version + segwit marker
/// and flag (1 weight unit each) + 4-byte locktime, plus the input/output
/// count varints (assumed single-byte, true for any realistic sweep).
const TX_BASE_WEIGHT: u64 = 4 * 4 + 2 + 4 * 4 + 4 + 4;

/// Witness weight for a standard P2WKH spend: `<sig> <pubkey>` plus the
/// per-input witness-item-count byte.
pub const P2WKH_WITNESS_WEIGHT: u64 = 107;

/// `to_remote_confirmed` witness: `<sig> <to_remote_confirmed_script>`.
pub const TO_REMOTE_CONFIRMED_WITNESS_WEIGHT: u64 = 112;

/// Anchor witness: `<sig> <anchor_script>`.
pub const ANCHOR_WITNESS_WEIGHT: u64 = 116;

/// Funding 2-of-2 witness: `OP_0 <sig_a> <sig_b> <multisig_script>`.
pub const FUNDING_MULTISIG_WITNESS_WEIGHT: u64 = 222;

/// Pool segwit expiry witness: `<trader_sig> OP_0 <expiry_script>`.
pub const POOL_EXPIRY_WITNESS_WEIGHT: u64 = 214;

/// Loop-in HTLCv2 timeout witness: `<sender_sig> OP_0 <htlc_script>`.
pub const LOOP_HTLC_V2_WITNESS_WEIGHT: u64 = 189;

/// Taproot key-spend witness with the default sighash type (no explicit
/// byte): a single 64-byte Schnorr signature plus the item-count byte.
pub const TAPROOT_KEYSPEND_WITNESS_WEIGHT: u64 = 65;

/// Taproot key-spend witness with an explicit (non-default) sighash byte
/// appended to the signature.
pub const TAPROOT_KEYSPEND_WITNESS_WEIGHT_EXPLICIT_SIGHASH: u64 = 66;

/// P2WKH output: 8-byte value + 1-byte script length + 22-byte script.
pub const P2WKH_OUTPUT_WEIGHT: u64 = (8 + 1 + 22) * 4;

/// P2TR output: 8-byte value + 1-byte script length + 34-byte script.
pub const P2TR_OUTPUT_WEIGHT: u64 = (8 + 1 + 34) * 4;

/// Accumulates the weight of an unsigned-but-about-to-be-signed
/// transaction, one input/output contribution at a time.
#[derive(Debug, Clone, Copy)]
pub struct WeightEstimator {
    weight: u64,
}

impl WeightEstimator {
    pub fn new() -> Self {
        WeightEstimator {
            weight: TX_BASE_WEIGHT,
        }
    }

    fn add_input(&mut self, witness_weight: u64) -> &mut Self {
        self.weight += INPUT_BASE_WEIGHT + witness_weight;
        self
    }

    pub fn add_p2wkh_input(&mut self) -> &mut Self {
        self.add_input(P2WKH_WITNESS_WEIGHT)
    }

    /// Any segwit v0 witness shape not covered by a dedicated helper —
    /// takes the raw witness weight in weight units.
    pub fn add_witness_input(&mut self, witness_weight: u64) -> &mut Self {
        self.add_input(witness_weight)
    }

    pub fn add_taproot_keyspend_input(&mut self, explicit_sighash_byte: bool) -> &mut Self {
        let w = if explicit_sighash_byte {
            TAPROOT_KEYSPEND_WITNESS_WEIGHT_EXPLICIT_SIGHASH
        } else {
            TAPROOT_KEYSPEND_WITNESS_WEIGHT
        };
        self.add_input(w)
    }

    /// Taproot script-spend: caller supplies the full witness weight
    /// (signature + leaf script + control block + item-count overhead),
    /// since leaf scripts and control block sizes vary by tree shape.
    pub fn add_taproot_scriptspend_input(&mut self, witness_weight: u64) -> &mut Self {
        self.add_input(witness_weight)
    }

    pub fn add_p2wkh_output(&mut self) -> &mut Self {
        self.weight += P2WKH_OUTPUT_WEIGHT;
        self
    }

    pub fn add_p2tr_output(&mut self) -> &mut Self {
        self.weight += P2TR_OUTPUT_WEIGHT;
        self
    }

    pub fn weight(&self) -> Weight {
        Weight::from_wu(self.weight)
    }

    pub fn vsize(&self) -> u64 {
        self.weight().to_vbytes_ceil()
    }
}

impl Default for WeightEstimator {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn single_input_single_output_sweep_has_plausible_vsize() {
        let mut est = WeightEstimator::new();
        est.add_p2wkh_input().add_p2wkh_output();
        // A real single-in/single-out P2WKH sweep is ~110 vbytes.
        let vsize = est.vsize();
        assert!(vsize > 90 && vsize < 130, "vsize {vsize} out of range");
    }

    #[test]
    fn taproot_keyspend_is_cheaper_than_funding_multisig() {
        let mut tr = WeightEstimator::new();
        tr.add_taproot_keyspend_input(false).add_p2wkh_output();

        let mut multisig = WeightEstimator::new();
        multisig
            .add_witness_input(FUNDING_MULTISIG_WITNESS_WEIGHT)
            .add_p2wkh_output();

        assert!(tr.vsize() < multisig.vsize());
    }

    #[test]
    fn estimator_is_additive() {
        let mut est = WeightEstimator::new();
        est.add_p2wkh_input();
        let after_one = est.weight();
        est.add_p2wkh_input();
        let after_two = est.weight();
        assert_eq!(
            after_two.to_wu() - after_one.to_wu(),
            INPUT_BASE_WEIGHT + P2WKH_WITNESS_WEIGHT
        );
    }
}
