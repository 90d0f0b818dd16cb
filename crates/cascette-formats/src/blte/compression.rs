//! BLTE block decompression

use super::error::{BlteError, BlteResult};
use flate2::read::ZlibDecoder;
use std::io::Read;

/// Maximum allowed decompression size (1 GB)
///
/// Security: Limits decompression output to prevent denial of service via
/// compression bombs.
pub const MAX_DECOMPRESSION_SIZE: usize = 1024 * 1024 * 1024;

/// Only version of the LZ4 container header
const LZ4_CONTAINER_VERSION: u8 = 1;

/// Container header: version, u64 BE decoded size, block shift
const LZ4_HEADER_SIZE: usize = 10;

/// Inflate a zlib stream, bounded by `limit` output bytes
pub fn decompress_zlib(data: &[u8], limit: usize) -> BlteResult<Vec<u8>> {
    let mut decoder = ZlibDecoder::new(data);
    let mut decompressed = Vec::new();

    // Read in chunks to enforce size limit
    let mut buffer = [0u8; 8192];
    loop {
        let bytes_read = decoder.read(&mut buffer).map_err(|e| {
            BlteError::DecompressionFailed(format!("ZLib decompression failed: {e}"))
        })?;

        if bytes_read == 0 {
            break;
        }

        if decompressed.len() + bytes_read > limit {
            return Err(BlteError::DecompressionFailed(format!(
                "Decompressed size exceeds limit of {} bytes",
                limit
            )));
        }

        decompressed.extend_from_slice(&buffer[..bytes_read]);
    }

    Ok(decompressed)
}

/// Decode an LZ4 container
///
/// ```text
/// [u8 version = 1][u64 BE decoded size][u8 block shift]
/// repeat: [u32 BE compressed size][LZ4 block]
/// ```
///
/// Each block decodes to `min(1 << shift, remaining)` bytes.
pub fn decompress_lz4(data: &[u8], limit: usize) -> BlteResult<Vec<u8>> {
    if data.len() < LZ4_HEADER_SIZE {
        return Err(BlteError::Truncated {
            structure: "LZ4 container header",
            needed: LZ4_HEADER_SIZE,
            available: data.len(),
        });
    }

    if data[0] != LZ4_CONTAINER_VERSION {
        return Err(BlteError::DecompressionFailed(format!(
            "unsupported LZ4 container version {}",
            data[0]
        )));
    }

    let mut size_bytes = [0u8; 8];
    size_bytes.copy_from_slice(&data[1..9]);
    let decoded_size = usize::try_from(u64::from_be_bytes(size_bytes))
        .ok()
        .filter(|&size| size <= limit)
        .ok_or_else(|| {
            BlteError::DecompressionFailed(format!(
                "LZ4 decoded size exceeds limit of {limit} bytes"
            ))
        })?;

    let shift = u32::from(data[9]);
    if shift >= usize::BITS {
        return Err(BlteError::DecompressionFailed(format!(
            "LZ4 block shift {shift} too large"
        )));
    }
    let block_size = 1usize << shift;

    let mut output = Vec::with_capacity(decoded_size);
    let mut position = LZ4_HEADER_SIZE;

    while output.len() < decoded_size {
        let Some(prefix) = data.get(position..position + 4) else {
            return Err(BlteError::Truncated {
                structure: "LZ4 block size",
                needed: position + 4,
                available: data.len(),
            });
        };
        let compressed_size =
            u32::from_be_bytes([prefix[0], prefix[1], prefix[2], prefix[3]]) as usize;
        position += 4;

        let Some(block) = data.get(position..position + compressed_size) else {
            return Err(BlteError::Truncated {
                structure: "LZ4 block",
                needed: position + compressed_size,
                available: data.len(),
            });
        };
        position += compressed_size;

        let expected = block_size.min(decoded_size - output.len());
        let decoded = lz4_flex::block::decompress(block, expected)
            .map_err(|e| BlteError::DecompressionFailed(format!("LZ4 decompression failed: {e}")))?;
        if decoded.len() != expected {
            return Err(BlteError::DecompressionFailed(format!(
                "LZ4 block decoded to {} bytes, expected {expected}",
                decoded.len()
            )));
        }
        output.extend_from_slice(&decoded);
    }

    Ok(output)
}
