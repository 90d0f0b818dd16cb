//! Salsa20 stream cipher
//!
//! CASC uses 16-byte keys with the "expand 16-byte k" constants and a
//! 64-bit nonce. Two nonce derivations exist:
//! - BLTE blocks carry a 4 or 8 byte IV whose first 4 bytes are XORed with
//!   the block index
//! - DB2 rows use the little-endian 64-bit record id directly

use crate::error::CryptoError;

/// Salsa20 cipher with a 128-bit key
pub struct Salsa20Cipher {
    state: [u32; 16],
    keystream: [u8; 64],
    keystream_pos: usize,
}

impl Salsa20Cipher {
    /// Create a cipher from a key and an 8-byte nonce, block counter at 0
    pub fn new(key: &[u8; 16], nonce: [u8; 8]) -> Self {
        let k = |i: usize| u32::from_le_bytes([key[i], key[i + 1], key[i + 2], key[i + 3]]);
        let n = |i: usize| u32::from_le_bytes([nonce[i], nonce[i + 1], nonce[i + 2], nonce[i + 3]]);

        // "expand 16-byte k"
        let state = [
            0x6170_7865,
            k(0),
            k(4),
            k(8),
            k(12),
            0x3120_646e,
            n(0),
            n(4),
            0,
            0,
            0x7962_2d36,
            k(0),
            k(4),
            k(8),
            k(12),
            0x6b20_6574,
        ];

        Self {
            state,
            keystream: [0; 64],
            keystream_pos: 64,
        }
    }

    /// Create a cipher for a BLTE encrypted block
    ///
    /// The IV is zero-extended to 8 bytes and its first 4 bytes are XORed
    /// with the block index.
    pub fn for_blte_block(key: &[u8; 16], iv: &[u8], block_index: usize) -> Result<Self, CryptoError> {
        if iv.len() != 4 && iv.len() != 8 {
            return Err(CryptoError::InvalidNonceSize(iv.len()));
        }

        let mut nonce = [0u8; 8];
        nonce[..iv.len()].copy_from_slice(iv);

        #[allow(clippy::cast_possible_truncation)]
        let block_bytes = (block_index as u32).to_le_bytes();
        for (n, b) in nonce.iter_mut().zip(block_bytes) {
            *n ^= b;
        }

        Ok(Self::new(key, nonce))
    }

    /// Create a cipher for a DB2 record keyed by its 64-bit id
    pub fn for_record(key: &[u8; 16], record_id: u64) -> Self {
        Self::new(key, record_id.to_le_bytes())
    }

    fn generate_keystream(&mut self) {
        let mut x = self.state;

        for _ in 0..10 {
            // Column round
            Self::quarter_round(&mut x, 0, 4, 8, 12);
            Self::quarter_round(&mut x, 5, 9, 13, 1);
            Self::quarter_round(&mut x, 10, 14, 2, 6);
            Self::quarter_round(&mut x, 15, 3, 7, 11);

            // Row round
            Self::quarter_round(&mut x, 0, 1, 2, 3);
            Self::quarter_round(&mut x, 5, 6, 7, 4);
            Self::quarter_round(&mut x, 10, 11, 8, 9);
            Self::quarter_round(&mut x, 15, 12, 13, 14);
        }

        for (i, (word, initial)) in x.iter().zip(self.state.iter()).enumerate() {
            self.keystream[i * 4..(i + 1) * 4].copy_from_slice(&word.wrapping_add(*initial).to_le_bytes());
        }

        self.state[8] = self.state[8].wrapping_add(1);
        if self.state[8] == 0 {
            self.state[9] = self.state[9].wrapping_add(1);
        }

        self.keystream_pos = 0;
    }

    fn quarter_round(state: &mut [u32; 16], a: usize, b: usize, c: usize, d: usize) {
        state[b] ^= state[a].wrapping_add(state[d]).rotate_left(7);
        state[c] ^= state[b].wrapping_add(state[a]).rotate_left(9);
        state[d] ^= state[c].wrapping_add(state[b]).rotate_left(13);
        state[a] ^= state[d].wrapping_add(state[c]).rotate_left(18);
    }

    /// XOR the keystream into `data` in place (encrypts or decrypts)
    pub fn apply_keystream(&mut self, data: &mut [u8]) {
        for byte in data.iter_mut() {
            if self.keystream_pos >= 64 {
                self.generate_keystream();
            }
            *byte ^= self.keystream[self.keystream_pos];
            self.keystream_pos += 1;
        }
    }
}

impl Drop for Salsa20Cipher {
    fn drop(&mut self) {
        self.state.fill(0);
        self.keystream.fill(0);
    }
}
