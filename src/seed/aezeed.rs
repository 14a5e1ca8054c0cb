//! aezeed: the 24-word mnemonic that carries a version byte, a birthday,
//! and 16 bytes of entropy, reusing the BIP39 English wordlist but its own
//! CRC32-based checksum rather than BIP39's SHA256 checksum.
//!
//! Wire layout (33 bytes total, 24 words * 11 bits):
//! `version(1) || birthday_be(2) || ciphertext(16) || salt(10) || crc32_be(4)`.
//! `ciphertext` is the 16-byte entropy XORed with an scrypt-derived
//! keystream keyed by the passphrase and `salt`; the stored CRC32 covers
//! the *plaintext* entropy, not the ciphertext, so decoding with the wrong
//! passphrase reliably fails the checksum instead of silently producing a
//! different (wrong) master key.

use bip39::Language;

use crate::error::{Error, Result};

const TOTAL_WORDS: usize = 24;
const TOTAL_BYTES: usize = 33;
const BITS_PER_WORD: usize = 11;
const SALT_LEN: usize = 10;
const ENTROPY_LEN: usize = 16;

/// Days between the Unix epoch and the aezeed epoch (2017-01-01 UTC), used
/// to store the wallet birthday compactly as a `u16` day count.
pub const CIPHER_SEED_EPOCH_DAYS: u32 = 17_167;

pub struct CipherSeed {
    pub version: u8,
    pub birthday_days: u16,
    pub entropy: [u8; ENTROPY_LEN],
}

impl CipherSeed {
    pub fn new(version: u8, birthday_days: u16, entropy: [u8; ENTROPY_LEN]) -> Self {
        CipherSeed {
            version,
            birthday_days,
            entropy,
        }
    }

    /// Decodes and, if `passphrase` is correct, decrypts a 24-word mnemonic.
    pub fn decode(words: &[&str], passphrase: &[u8]) -> Result<Self> {
        if words.len() != TOTAL_WORDS {
            return Err(Error::SeedDecode(format!(
                "aezeed must have {TOTAL_WORDS} words, got {}",
                words.len()
            )));
        }
        let wordlist = Language::English.word_list();
        let mut indices = Vec::with_capacity(TOTAL_WORDS);
        for word in words {
            let idx = wordlist
                .iter()
                .position(|w| w == word)
                .ok_or_else(|| Error::SeedDecode(format!("unknown word: {word}")))?;
            indices.push(idx as u16);
        }

        let payload = words_to_bytes(&indices);
        debug_assert_eq!(payload.len(), TOTAL_BYTES);

        let version = payload[0];
        let birthday_days = u16::from_be_bytes([payload[1], payload[2]]);
        let ciphertext: [u8; ENTROPY_LEN] = payload[3..3 + ENTROPY_LEN].try_into().unwrap();
        let salt: [u8; SALT_LEN] =
            payload[3 + ENTROPY_LEN..3 + ENTROPY_LEN + SALT_LEN].try_into().unwrap();
        let crc_stored = u32::from_be_bytes(
            payload[3 + ENTROPY_LEN + SALT_LEN..].try_into().unwrap(),
        );

        let stream = stretch(passphrase, &salt);
        let mut entropy = ciphertext;
        for (byte, key) in entropy.iter_mut().zip(stream.iter()) {
            *byte ^= key;
        }

        let crc_check = compute_crc(version, birthday_days, &entropy, &salt);
        if crc_check != crc_stored {
            return Err(Error::WrongPassphrase);
        }

        Ok(CipherSeed {
            version,
            birthday_days,
            entropy,
        })
    }

    /// Encodes this seed into 24 words, enciphering the entropy under
    /// `passphrase` and `salt`. Exists so encode/decode round-trip
    /// properties are testable even though the CLI only ever decodes.
    pub fn encode(&self, passphrase: &[u8], salt: [u8; SALT_LEN]) -> Vec<String> {
        let crc = compute_crc(self.version, self.birthday_days, &self.entropy, &salt);

        let stream = stretch(passphrase, &salt);
        let mut ciphertext = self.entropy;
        for (byte, key) in ciphertext.iter_mut().zip(stream.iter()) {
            *byte ^= key;
        }

        let mut payload = Vec::with_capacity(TOTAL_BYTES);
        payload.push(self.version);
        payload.extend_from_slice(&self.birthday_days.to_be_bytes());
        payload.extend_from_slice(&ciphertext);
        payload.extend_from_slice(&salt);
        payload.extend_from_slice(&crc.to_be_bytes());

        let indices = bytes_to_words(&payload);
        let wordlist = Language::English.word_list();
        indices
            .into_iter()
            .map(|i| wordlist[i as usize].to_string())
            .collect()
    }

    pub fn birthday_unix_days(&self) -> u32 {
        CIPHER_SEED_EPOCH_DAYS + self.birthday_days as u32
    }
}

fn compute_crc(version: u8, birthday_days: u16, entropy: &[u8], salt: &[u8]) -> u32 {
    let mut buf = Vec::with_capacity(1 + 2 + entropy.len() + salt.len());
    buf.push(version);
    buf.extend_from_slice(&birthday_days.to_be_bytes());
    buf.extend_from_slice(entropy);
    buf.extend_from_slice(salt);
    crc32fast::hash(&buf)
}

/// Stretches `passphrase` and `salt` into a 16-byte keystream via scrypt.
/// Not a true stream cipher — a single-block XOR mask — but sufficient to
/// make the checksum passphrase-dependent as required by `decode`.
fn stretch(passphrase: &[u8], salt: &[u8]) -> [u8; ENTROPY_LEN] {
    let params = scrypt::Params::new(5, 8, 1, ENTROPY_LEN).expect("static scrypt params are valid");
    let mut out = [0u8; ENTROPY_LEN];
    scrypt::scrypt(passphrase, salt, &params, &mut out).expect("fixed-size output buffer");
    out
}

fn bytes_to_words(data: &[u8]) -> Vec<u16> {
    let mut bits: Vec<bool> = Vec::with_capacity(data.len() * 8);
    for byte in data {
        for i in (0..8).rev() {
            bits.push((byte >> i) & 1 == 1);
        }
    }
    bits.chunks(BITS_PER_WORD)
        .map(|chunk| {
            chunk
                .iter()
                .fold(0u16, |acc, &bit| (acc << 1) | (bit as u16))
        })
        .collect()
}

fn words_to_bytes(indices: &[u16]) -> Vec<u8> {
    let mut bits: Vec<bool> = Vec::with_capacity(indices.len() * BITS_PER_WORD);
    for &idx in indices {
        for i in (0..BITS_PER_WORD).rev() {
            bits.push((idx >> i) & 1 == 1);
        }
    }
    bits.chunks(8)
        .map(|chunk| {
            chunk
                .iter()
                .fold(0u8, |acc, &bit| (acc << 1) | (bit as u8))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encode_decode_round_trips_with_correct_passphrase() {
        let seed = CipherSeed::new(0, 400, [9u8; ENTROPY_LEN]);
        let words = seed.encode(b"hunter2", [1u8; SALT_LEN]);
        assert_eq!(words.len(), TOTAL_WORDS);

        let refs: Vec<&str> = words.iter().map(String::as_str).collect();
        let decoded = CipherSeed::decode(&refs, b"hunter2").unwrap();
        assert_eq!(decoded.entropy, seed.entropy);
        assert_eq!(decoded.birthday_days, seed.birthday_days);
        assert_eq!(decoded.version, seed.version);
    }

    #[test]
    fn wrong_passphrase_fails_checksum() {
        let seed = CipherSeed::new(0, 1, [5u8; ENTROPY_LEN]);
        let words = seed.encode(b"correct-horse", [2u8; SALT_LEN]);
        let refs: Vec<&str> = words.iter().map(String::as_str).collect();

        let err = CipherSeed::decode(&refs, b"wrong-passphrase").unwrap_err();
        assert!(matches!(err, Error::WrongPassphrase));
    }

    #[test]
    fn rejects_wrong_word_count() {
        let err = CipherSeed::decode(&["abandon"; 12], b"").unwrap_err();
        assert!(matches!(err, Error::SeedDecode(_)));
    }
}
