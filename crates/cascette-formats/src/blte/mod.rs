//! BLTE (Block Table Encoded) decoding
//!
//! BLTE is NGDP's container format for compressed and optionally encrypted
//! content. A file is a header followed by one or more blocks, each starting
//! with a mode byte.
//!
//! # Features
//!
//! - Single and multi-chunk files, standard and extended chunk tables
//! - Compression modes: None, `ZLib`, LZ4
//! - Salsa20 encrypted blocks, zero-filled when the key is unknown
//! - Per-block MD5 verification

mod chunk;
mod compression;
mod encryption;
mod error;
mod header;

pub use chunk::CompressionMode;
pub use compression::{MAX_DECOMPRESSION_SIZE, decompress_lz4, decompress_zlib};
pub use encryption::{EncryptedHeader, EncryptionType};
pub use error::{BlteError, BlteResult};
pub use header::{BLTE_MAGIC, BlteHeader, ChunkInfo, HeaderFlags};

use cascette_crypto::{Salsa20Cipher, TactKeyProvider};
use tracing::{debug, warn};

/// Blocks that could not be decoded faithfully
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DecodeReport {
    /// Indices of encrypted blocks replaced by zeros
    pub zero_filled_blocks: Vec<usize>,
    /// Key names that were not available, in block order
    pub missing_keys: Vec<u64>,
}

impl DecodeReport {
    /// Whether every block was decoded
    pub fn is_complete(&self) -> bool {
        self.zero_filled_blocks.is_empty()
    }
}

/// BLTE decoder
///
/// ```no_run
/// use cascette_crypto::TactKeyStore;
/// use cascette_formats::blte::BlteDecoder;
///
/// # fn example(data: &[u8]) -> Result<(), Box<dyn std::error::Error>> {
/// let keys = TactKeyStore::new();
/// let (content, report) = BlteDecoder::new(&keys).decode_with_report(data)?;
/// if !report.is_complete() {
///     eprintln!("{} blocks zero-filled", report.zero_filled_blocks.len());
/// }
/// # Ok(())
/// # }
/// ```
pub struct BlteDecoder<'k> {
    keys: &'k dyn TactKeyProvider,
    verify_checksums: bool,
    max_size: usize,
}

impl std::fmt::Debug for BlteDecoder<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BlteDecoder")
            .field("verify_checksums", &self.verify_checksums)
            .field("max_size", &self.max_size)
            .finish_non_exhaustive()
    }
}

impl<'k> BlteDecoder<'k> {
    /// Create a decoder that resolves keys through `keys`
    pub fn new(keys: &'k dyn TactKeyProvider) -> Self {
        Self {
            keys,
            verify_checksums: true,
            max_size: MAX_DECOMPRESSION_SIZE,
        }
    }

    /// Enable or disable per-block MD5 verification
    pub const fn verify_checksums(mut self, verify: bool) -> Self {
        self.verify_checksums = verify;
        self
    }

    /// Limit the decoded size of a single block
    pub const fn max_block_size(mut self, max_size: usize) -> Self {
        self.max_size = max_size;
        self
    }

    /// Decode a BLTE file
    pub fn decode(&self, data: &[u8]) -> BlteResult<Vec<u8>> {
        self.decode_with_report(data).map(|(content, _)| content)
    }

    /// Decode a BLTE file, reporting zero-filled blocks
    pub fn decode_with_report(&self, data: &[u8]) -> BlteResult<(Vec<u8>, DecodeReport)> {
        let header = BlteHeader::parse(data)?;
        let mut report = DecodeReport::default();

        if header.is_single_chunk() {
            let mut output = Vec::new();
            self.decode_block(0, &data[header.data_offset()..], None, &mut output, &mut report)?;
            return Ok((output, report));
        }

        let mut output = Vec::with_capacity(header.total_decompressed_size());
        let mut offset = header.data_offset();

        for (index, chunk) in header.chunks.iter().enumerate() {
            let size = chunk.compressed_size as usize;
            let block = data.get(offset..offset + size).ok_or(BlteError::Truncated {
                structure: "BLTE block",
                needed: offset + size,
                available: data.len(),
            })?;
            offset += size;

            if self.verify_checksums {
                let actual = md5::compute(block);
                if actual.0 != chunk.checksum {
                    return Err(BlteError::ChecksumMismatch {
                        block: index,
                        expected: hex::encode(chunk.checksum),
                        actual: hex::encode(actual.0),
                    });
                }
            }

            let logical = chunk.decompressed_size as usize;
            let before = output.len();
            self.decode_block(index, block, Some(logical), &mut output, &mut report)?;

            let decoded = output.len() - before;
            if decoded != logical {
                return Err(BlteError::SizeMismatch {
                    block: index,
                    expected: logical,
                    actual: decoded,
                });
            }
        }

        debug!(
            "decoded BLTE: {} blocks, {} bytes, {} zero-filled",
            header.chunks.len(),
            output.len(),
            report.zero_filled_blocks.len()
        );

        Ok((output, report))
    }

    fn decode_block(
        &self,
        index: usize,
        block: &[u8],
        logical: Option<usize>,
        output: &mut Vec<u8>,
        report: &mut DecodeReport,
    ) -> BlteResult<()> {
        let (&mode, payload) = block.split_first().ok_or(BlteError::EmptyChunk(index))?;

        match CompressionMode::from_byte(mode) {
            Some(CompressionMode::Encrypted) => {
                self.decode_encrypted(index, payload, logical, output, report)
            }
            _ => self.decode_plain(mode, payload, output),
        }
    }

    /// Decode a block that is not encrypted
    fn decode_plain(&self, mode: u8, payload: &[u8], output: &mut Vec<u8>) -> BlteResult<()> {
        match CompressionMode::from_byte(mode) {
            Some(CompressionMode::None) => output.extend_from_slice(payload),
            Some(CompressionMode::ZLib) => {
                output.extend_from_slice(&decompress_zlib(payload, self.max_size)?);
            }
            Some(CompressionMode::LZ4) => {
                output.extend_from_slice(&decompress_lz4(payload, self.max_size)?);
            }
            _ => return Err(BlteError::UnsupportedCompressionMode(mode)),
        }
        Ok(())
    }

    fn decode_encrypted(
        &self,
        index: usize,
        payload: &[u8],
        logical: Option<usize>,
        output: &mut Vec<u8>,
        report: &mut DecodeReport,
    ) -> BlteResult<()> {
        let (header, ciphertext) = EncryptedHeader::parse(payload)?;
        if header.encryption_type != EncryptionType::Salsa20 {
            return Err(BlteError::UnsupportedEncryption(
                header.encryption_type.as_byte(),
            ));
        }

        let Some(key) = self.keys.get_key(header.key_name) else {
            warn!(
                "block {} encrypted with unknown key {:016X}, zero-filling",
                index, header.key_name
            );
            report.zero_filled_blocks.push(index);
            report.missing_keys.push(header.key_name);
            output.resize(output.len() + logical.unwrap_or(0), 0);
            return Ok(());
        };

        let mut plain = ciphertext.to_vec();
        Salsa20Cipher::for_blte_block(&key, &header.iv, index)?.apply_keystream(&mut plain);

        let (&mode, inner) = plain.split_first().ok_or(BlteError::EmptyChunk(index))?;
        if matches!(
            CompressionMode::from_byte(mode),
            Some(CompressionMode::Encrypted | CompressionMode::Frame)
        ) {
            return Err(BlteError::NestedEncryption(index));
        }
        self.decode_plain(mode, inner, output)
    }
}

#[cfg(test)]
#[allow(clippy::expect_used, clippy::unwrap_used)]
mod tests {
    use super::compression::tests::{lz4_container, zlib};
    use super::*;
    use cascette_crypto::{TactKey, TactKeyStore};
    use pretty_assertions::assert_eq;

    const KEY_NAME: u64 = 0xFA50_5078_126A_CB3E;
    const KEY: [u8; 16] = [0x42; 16];

    fn single(block: &[u8]) -> Vec<u8> {
        let mut data = b"BLTE\0\0\0\0".to_vec();
        data.extend_from_slice(block);
        data
    }

    fn multi(blocks: &[(Vec<u8>, usize)]) -> Vec<u8> {
        let header_size = 12 + blocks.len() * 24;
        let mut data = b"BLTE".to_vec();
        data.extend_from_slice(&(header_size as u32).to_be_bytes());
        data.push(0x0F);
        data.extend_from_slice(&(blocks.len() as u32).to_be_bytes()[1..]);
        for (block, logical) in blocks {
            data.extend_from_slice(&(block.len() as u32).to_be_bytes());
            data.extend_from_slice(&(*logical as u32).to_be_bytes());
            data.extend_from_slice(&md5::compute(block).0);
        }
        for (block, _) in blocks {
            data.extend_from_slice(block);
        }
        data
    }

    fn mode(mode: u8, payload: &[u8]) -> Vec<u8> {
        let mut block = vec![mode];
        block.extend_from_slice(payload);
        block
    }

    fn encrypted(inner: &[u8], index: usize) -> Vec<u8> {
        let iv = [1, 2, 3, 4];
        let mut body = inner.to_vec();
        Salsa20Cipher::for_blte_block(&KEY, &iv, index)
            .unwrap()
            .apply_keystream(&mut body);

        let mut block = vec![b'E', 8];
        block.extend_from_slice(&KEY_NAME.to_le_bytes());
        block.push(4);
        block.extend_from_slice(&iv);
        block.push(b'S');
        block.extend_from_slice(&body);
        block
    }

    fn keys() -> TactKeyStore {
        let mut keys = TactKeyStore::empty();
        keys.add(TactKey::new(KEY_NAME, KEY));
        keys
    }

    #[test]
    fn test_single_chunk_none() {
        let keys = TactKeyStore::empty();
        let data = single(&mode(b'N', b"Hello, BLTE!"));
        assert_eq!(BlteDecoder::new(&keys).decode(&data).unwrap(), b"Hello, BLTE!");
    }

    #[test]
    fn test_multi_chunk_mixed_modes() {
        let keys = TactKeyStore::empty();
        let first = b"first block ".repeat(20);
        let second = b"second block".repeat(30);
        let third = b"third";

        let data = multi(&[
            (mode(b'Z', &zlib(&first)), first.len()),
            (mode(b'4', &lz4_container(&second, 6)), second.len()),
            (mode(b'N', third), third.len()),
        ]);

        let (content, report) = BlteDecoder::new(&keys).decode_with_report(&data).unwrap();
        let mut expected = first;
        expected.extend_from_slice(&second);
        expected.extend_from_slice(third);
        assert_eq!(content, expected);
        assert!(report.is_complete());
    }

    #[test]
    fn test_checksum_mismatch() {
        let keys = TactKeyStore::empty();
        let mut data = multi(&[(mode(b'N', b"abcd"), 4)]);
        let last = data.len() - 1;
        data[last] ^= 0xFF;

        assert!(matches!(
            BlteDecoder::new(&keys).decode(&data),
            Err(BlteError::ChecksumMismatch { block: 0, .. })
        ));
        assert!(
            BlteDecoder::new(&keys)
                .verify_checksums(false)
                .decode(&data)
                .is_ok()
        );
    }

    #[test]
    fn test_logical_size_mismatch() {
        let keys = TactKeyStore::empty();
        let data = multi(&[(mode(b'N', b"abcd"), 5)]);
        assert!(matches!(
            BlteDecoder::new(&keys).decode(&data),
            Err(BlteError::SizeMismatch {
                block: 0,
                expected: 5,
                actual: 4
            })
        ));
    }

    #[test]
    fn test_unsupported_modes() {
        let keys = TactKeyStore::empty();
        for byte in [b'F', b'X'] {
            let data = single(&mode(byte, b"data"));
            assert!(matches!(
                BlteDecoder::new(&keys).decode(&data),
                Err(BlteError::UnsupportedCompressionMode(b)) if b == byte
            ));
        }
    }

    #[test]
    fn test_encrypted_block_with_key() {
        let keys = keys();
        let plain = b"secret content".to_vec();
        let data = multi(&[
            (mode(b'N', b"clear"), 5),
            (encrypted(&mode(b'N', &plain), 1), plain.len()),
        ]);

        let (content, report) = BlteDecoder::new(&keys).decode_with_report(&data).unwrap();
        assert_eq!(content, b"clearsecret content");
        assert!(report.is_complete());
    }

    #[test]
    fn test_encrypted_block_without_key_is_zero_filled() {
        let keys = TactKeyStore::empty();
        let plain = b"secret content".to_vec();
        let data = multi(&[
            (encrypted(&mode(b'N', &plain), 0), plain.len()),
            (mode(b'N', b"tail"), 4),
        ]);

        let (content, report) = BlteDecoder::new(&keys).decode_with_report(&data).unwrap();
        let mut expected = vec![0u8; plain.len()];
        expected.extend_from_slice(b"tail");
        assert_eq!(content, expected);
        assert_eq!(report.zero_filled_blocks, vec![0]);
        assert_eq!(report.missing_keys, vec![KEY_NAME]);
    }

    #[test]
    fn test_nested_encryption_rejected() {
        let keys = keys();
        let inner = encrypted(&mode(b'N', b"x"), 0);
        let data = single(&encrypted(&inner, 0));
        assert!(matches!(
            BlteDecoder::new(&keys).decode(&data),
            Err(BlteError::NestedEncryption(0))
        ));
    }

    #[test]
    fn test_arc4_unsupported() {
        let keys = keys();
        let mut block = encrypted(&mode(b'N', b"x"), 0);
        // encryption type byte follows mode, key name and IV
        block[1 + 1 + 8 + 1 + 4] = b'A';
        let data = single(&block);
        assert!(matches!(
            BlteDecoder::new(&keys).decode(&data),
            Err(BlteError::UnsupportedEncryption(b'A'))
        ));
    }
}
