//! BLTE header structures and parsing

use binrw::io::{Cursor, Read, Seek};
use binrw::{BinRead, BinResult};

use super::error::{BlteError, BlteResult};

/// BLTE magic bytes
pub const BLTE_MAGIC: [u8; 4] = *b"BLTE";

/// Magic plus the big-endian header size
pub const PREAMBLE_SIZE: usize = 8;

/// Header flags for chunk table format
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum HeaderFlags {
    /// Standard chunk info (24 bytes per chunk)
    Standard = 0x0F,
    /// Extended chunk info (40 bytes per chunk)
    Extended = 0x10,
}

impl HeaderFlags {
    /// Parse from byte value
    pub fn from_byte(byte: u8) -> Option<Self> {
        match byte {
            0x0F => Some(Self::Standard),
            0x10 => Some(Self::Extended),
            _ => None,
        }
    }

    /// Get the size of each chunk info entry
    pub fn chunk_info_size(&self) -> usize {
        match self {
            Self::Standard => 24,
            Self::Extended => 40,
        }
    }
}

/// Chunk table entry
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkInfo {
    /// Stored block size including the mode byte
    pub compressed_size: u32,
    /// Logical size after decoding
    pub decompressed_size: u32,
    /// MD5 of the stored block
    pub checksum: [u8; 16],
}

impl BinRead for ChunkInfo {
    type Args<'a> = (HeaderFlags,);

    fn read_options<R: Read + Seek>(
        reader: &mut R,
        _endian: binrw::Endian,
        args: Self::Args<'_>,
    ) -> BinResult<Self> {
        let (flags,) = args;

        let compressed_size = u32::read_options(reader, binrw::Endian::Big, ())?;
        let decompressed_size = u32::read_options(reader, binrw::Endian::Big, ())?;

        let mut checksum = [0u8; 16];
        reader.read_exact(&mut checksum)?;

        // Extended entries carry a checksum of the decoded data we do not use
        if flags == HeaderFlags::Extended {
            let mut ignored = [0u8; 16];
            reader.read_exact(&mut ignored)?;
        }

        Ok(Self {
            compressed_size,
            decompressed_size,
            checksum,
        })
    }
}

/// BLTE file header
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlteHeader {
    /// Header size (0 = single chunk, >0 = offset of the first block)
    pub header_size: u32,
    /// Chunk table format, absent for single-chunk files
    pub flags: Option<HeaderFlags>,
    /// Chunk table
    pub chunks: Vec<ChunkInfo>,
}

impl BlteHeader {
    /// Parse the header from the start of a BLTE file
    pub fn parse(data: &[u8]) -> BlteResult<Self> {
        if data.len() < PREAMBLE_SIZE {
            return Err(BlteError::Truncated {
                structure: "BLTE header",
                needed: PREAMBLE_SIZE,
                available: data.len(),
            });
        }

        let mut magic = [0u8; 4];
        magic.copy_from_slice(&data[..4]);
        if magic != BLTE_MAGIC {
            return Err(BlteError::InvalidMagic(magic));
        }

        let header_size = u32::from_be_bytes([data[4], data[5], data[6], data[7]]);
        if header_size == 0 {
            return Ok(Self {
                header_size,
                flags: None,
                chunks: Vec::new(),
            });
        }

        if data.len() < PREAMBLE_SIZE + 4 {
            return Err(BlteError::Truncated {
                structure: "chunk table header",
                needed: PREAMBLE_SIZE + 4,
                available: data.len(),
            });
        }

        let flags = HeaderFlags::from_byte(data[8]).ok_or_else(|| {
            BlteError::InvalidHeader(format!("unknown chunk table format 0x{:02X}", data[8]))
        })?;
        let chunk_count = u32::from_be_bytes([0, data[9], data[10], data[11]]) as usize;
        if chunk_count == 0 {
            return Err(BlteError::InvalidHeader("chunk table is empty".to_string()));
        }

        let expected = PREAMBLE_SIZE + 4 + chunk_count * flags.chunk_info_size();
        if header_size as usize != expected {
            return Err(BlteError::InvalidHeader(format!(
                "header size {header_size} does not match {chunk_count} entries ({expected} bytes)"
            )));
        }
        if data.len() < expected {
            return Err(BlteError::Truncated {
                structure: "chunk table",
                needed: expected,
                available: data.len(),
            });
        }

        let mut cursor = Cursor::new(&data[PREAMBLE_SIZE + 4..expected]);
        let chunks = (0..chunk_count)
            .map(|_| ChunkInfo::read_options(&mut cursor, binrw::Endian::Big, (flags,)))
            .collect::<BinResult<Vec<_>>>()?;

        Ok(Self {
            header_size,
            flags: Some(flags),
            chunks,
        })
    }

    /// Check if this is a single-chunk file
    pub fn is_single_chunk(&self) -> bool {
        self.header_size == 0
    }

    /// Get the number of chunks
    pub fn chunk_count(&self) -> usize {
        if self.is_single_chunk() {
            1
        } else {
            self.chunks.len()
        }
    }

    /// Get the data offset (where chunk data starts)
    pub fn data_offset(&self) -> usize {
        if self.is_single_chunk() {
            PREAMBLE_SIZE
        } else {
            // header_size already includes the 8-byte preamble
            self.header_size as usize
        }
    }

    /// Sum of the logical chunk sizes
    pub fn total_decompressed_size(&self) -> usize {
        self.chunks
            .iter()
            .map(|c| c.decompressed_size as usize)
            .sum()
    }
}
