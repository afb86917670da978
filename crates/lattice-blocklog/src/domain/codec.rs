//! The on-disk record codec.
//!
//! One committed block serializes to one self-contained record:
//!
//! ```text
//! Header (20 bytes, little-endian):
//!   u32 version | u32 fixed_size | u32 receipts_size | u32 diffs_size | u32 txs_size
//! Chunks (each: u32 length | payload), in fixed order:
//!   tx-header, tx-metadata, tx-proof, results-header, results-proof,
//!   results-bloom-filter, receipts[0..N), diffs[0..M), txs[0..K)
//! Trailer:
//!   u32 CRC32-C over header + all chunks
//! ```
//!
//! The size fields count chunk length prefixes plus payloads for their
//! group. N, M and K come from the counts the section headers declare. The
//! log file is a back-to-back concatenation of such records for heights
//! 1, 2, 3, …

use std::io::{self, Read, Write};

use crc32fast::Hasher;

use lattice_types::{
    BlockPair, ContractStateDiff, ResultsBlockContainer, ResultsBlockHeader, ResultsBlockProof,
    ResultsBloomFilter, SignedTransaction, TransactionReceipt, TransactionsBlockContainer,
    TransactionsBlockHeader, TransactionsBlockMetadata, TransactionsBlockProof,
};

use crate::domain::errors::CodecError;

/// Version stamped into every record header. A mismatch on read is treated
/// as corruption, not as an upgrade path.
pub const CODEC_VERSION: u32 = 0;

/// Serialized record header length.
pub const RECORD_HEADER_LEN: usize = 20;

const CHUNK_LEN_PREFIX: usize = 4;
const CHECKSUM_LEN: usize = 4;

fn chunk_disk_size(payload: &[u8]) -> u32 {
    (CHUNK_LEN_PREFIX + payload.len()) as u32
}

/// The fixed-size record header.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub(crate) struct RecordHeader {
    pub version: u32,
    pub fixed_size: u32,
    pub receipts_size: u32,
    pub diffs_size: u32,
    pub txs_size: u32,
}

impl RecordHeader {
    /// Total bytes of all chunks (length prefixes included), excluding the
    /// header itself and the trailing checksum.
    fn total_chunk_bytes(&self) -> usize {
        self.fixed_size as usize
            + self.receipts_size as usize
            + self.diffs_size as usize
            + self.txs_size as usize
    }

    fn to_bytes(self) -> [u8; RECORD_HEADER_LEN] {
        let mut buf = [0u8; RECORD_HEADER_LEN];
        buf[0..4].copy_from_slice(&self.version.to_le_bytes());
        buf[4..8].copy_from_slice(&self.fixed_size.to_le_bytes());
        buf[8..12].copy_from_slice(&self.receipts_size.to_le_bytes());
        buf[12..16].copy_from_slice(&self.diffs_size.to_le_bytes());
        buf[16..20].copy_from_slice(&self.txs_size.to_le_bytes());
        buf
    }

    fn from_bytes(buf: &[u8; RECORD_HEADER_LEN]) -> Self {
        let u32_at = |i: usize| {
            u32::from_le_bytes(buf[i..i + 4].try_into().expect("4-byte window"))
        };
        Self {
            version: u32_at(0),
            fixed_size: u32_at(4),
            receipts_size: u32_at(8),
            diffs_size: u32_at(12),
            txs_size: u32_at(16),
        }
    }
}

/// Encoder/decoder bounded by a maximum record size. Cheap to copy; every
/// reader and the writing tip carry their own.
#[derive(Debug, Clone, Copy)]
pub struct Codec {
    max_record_size: usize,
}

impl Codec {
    pub fn new(max_record_size: usize) -> Self {
        Self { max_record_size }
    }

    /// Serializes one block into `w` and returns the total bytes written
    /// (header + chunks + checksum).
    ///
    /// The record size is computed before anything is written, so a
    /// [`CodecError::SizeLimitExceeded`] never leaves a partial record
    /// behind. The size bound covers header + chunks, matching the bound
    /// `decode` enforces from the header fields.
    pub fn encode(&self, block: &BlockPair, w: &mut impl Write) -> Result<usize, CodecError> {
        let tb = &block.transactions_block;
        let rb = &block.results_block;

        let fixed_chunks: [Vec<u8>; 6] = [
            tb.header.to_bytes(),
            tb.metadata.to_bytes(),
            tb.block_proof.to_bytes(),
            rb.header.to_bytes(),
            rb.block_proof.to_bytes(),
            rb.bloom_filter.to_bytes(),
        ];
        let receipt_chunks: Vec<Vec<u8>> =
            rb.transaction_receipts.iter().map(|r| r.to_bytes()).collect();
        let diff_chunks: Vec<Vec<u8>> =
            rb.contract_state_diffs.iter().map(|d| d.to_bytes()).collect();
        let tx_chunks: Vec<Vec<u8>> =
            tb.signed_transactions.iter().map(|t| t.to_bytes()).collect();

        let mut header = RecordHeader {
            version: CODEC_VERSION,
            ..RecordHeader::default()
        };
        for chunk in &fixed_chunks {
            header.fixed_size += chunk_disk_size(chunk);
        }
        for chunk in &receipt_chunks {
            header.receipts_size += chunk_disk_size(chunk);
        }
        for chunk in &diff_chunks {
            header.diffs_size += chunk_disk_size(chunk);
        }
        for chunk in &tx_chunks {
            header.txs_size += chunk_disk_size(chunk);
        }

        let bounded_size = RECORD_HEADER_LEN + header.total_chunk_bytes();
        if bounded_size > self.max_record_size {
            return Err(CodecError::SizeLimitExceeded {
                size: bounded_size,
                max: self.max_record_size,
            });
        }

        let mut hasher = Hasher::new();
        let header_bytes = header.to_bytes();
        hasher.update(&header_bytes);
        w.write_all(&header_bytes)?;

        let all_chunks = fixed_chunks
            .iter()
            .chain(receipt_chunks.iter())
            .chain(diff_chunks.iter())
            .chain(tx_chunks.iter());
        for chunk in all_chunks {
            let len = (chunk.len() as u32).to_le_bytes();
            hasher.update(&len);
            w.write_all(&len)?;
            hasher.update(chunk);
            w.write_all(chunk)?;
        }

        w.write_all(&hasher.finalize().to_le_bytes())?;

        Ok(bounded_size + CHECKSUM_LEN)
    }

    /// Reads one record from `r`, returning the block and the exact number
    /// of bytes consumed (header + chunks + checksum).
    ///
    /// The checksum is re-derived while reading; any disagreement between
    /// the stream and the header's declared sizes, any short read and any
    /// checksum mismatch surfaces as a corruption-class error carrying the
    /// consumed byte count. A clean end of input before the first header
    /// byte is [`CodecError::Eof`].
    pub fn decode(&self, r: &mut impl Read) -> Result<(BlockPair, usize), CodecError> {
        let mut header_buf = [0u8; RECORD_HEADER_LEN];
        read_header_or_eof(r, &mut header_buf)?;

        let mut hasher = Hasher::new();
        hasher.update(&header_buf);

        let header = RecordHeader::from_bytes(&header_buf);
        if header.version != CODEC_VERSION {
            return Err(CodecError::UnsupportedVersion {
                version: header.version,
                consumed: RECORD_HEADER_LEN,
            });
        }

        let declared = RECORD_HEADER_LEN + header.total_chunk_bytes();
        if declared > self.max_record_size {
            return Err(CodecError::DeclaredTooLarge {
                declared,
                max: self.max_record_size,
            });
        }

        let mut budget = ReadingBudget {
            declared,
            consumed: RECORD_HEADER_LEN,
        };

        // Fixed section, in write order.
        let tx_header_chunk = read_chunk(r, &mut hasher, &mut budget)?;
        let tx_metadata_chunk = read_chunk(r, &mut hasher, &mut budget)?;
        let tx_proof_chunk = read_chunk(r, &mut hasher, &mut budget)?;
        let rs_header_chunk = read_chunk(r, &mut hasher, &mut budget)?;
        let rs_proof_chunk = read_chunk(r, &mut hasher, &mut budget)?;
        let rs_bloom_chunk = read_chunk(r, &mut hasher, &mut budget)?;

        let tx_header = parse_chunk(&tx_header_chunk, TransactionsBlockHeader::from_bytes, &budget)?;
        let rs_header = parse_chunk(&rs_header_chunk, ResultsBlockHeader::from_bytes, &budget)?;

        // The declared counts are trusted only enough to pre-size the
        // reads; any shortfall in the stream fails as corruption below.
        let receipts = read_group(
            r,
            &mut hasher,
            &mut budget,
            rs_header.num_transaction_receipts,
            TransactionReceipt::from_bytes,
        )?;
        let diffs = read_group(
            r,
            &mut hasher,
            &mut budget,
            rs_header.num_contract_state_diffs,
            ContractStateDiff::from_bytes,
        )?;
        let txs = read_group(
            r,
            &mut hasher,
            &mut budget,
            tx_header.num_signed_transactions,
            SignedTransaction::from_bytes,
        )?;

        if budget.consumed != budget.declared {
            return Err(CodecError::DeclaredSizeMismatch {
                declared: budget.declared,
                consumed: budget.consumed,
            });
        }

        let mut checksum_buf = [0u8; CHECKSUM_LEN];
        read_exact_tracked(r, &mut checksum_buf, budget.consumed)?;
        let stored = u32::from_le_bytes(checksum_buf);
        let computed = hasher.finalize();
        if stored != computed {
            return Err(CodecError::ChecksumMismatch {
                computed,
                stored,
                consumed: budget.consumed + CHECKSUM_LEN,
            });
        }

        let block = BlockPair {
            transactions_block: TransactionsBlockContainer {
                header: tx_header,
                metadata: parse_chunk(
                    &tx_metadata_chunk,
                    TransactionsBlockMetadata::from_bytes,
                    &budget,
                )?,
                signed_transactions: txs,
                block_proof: parse_chunk(
                    &tx_proof_chunk,
                    TransactionsBlockProof::from_bytes,
                    &budget,
                )?,
            },
            results_block: ResultsBlockContainer {
                header: rs_header,
                bloom_filter: parse_chunk(&rs_bloom_chunk, ResultsBloomFilter::from_bytes, &budget)?,
                transaction_receipts: receipts,
                contract_state_diffs: diffs,
                block_proof: parse_chunk(&rs_proof_chunk, ResultsBlockProof::from_bytes, &budget)?,
            },
        };

        // A record whose sections disagree could only come from a writer
        // this codec never was; treat it as corruption.
        block
            .check_consistency()
            .map_err(|source| CodecError::InvalidChunk {
                source,
                consumed: budget.consumed + CHECKSUM_LEN,
            })?;

        Ok((block, budget.consumed + CHECKSUM_LEN))
    }
}

struct ReadingBudget {
    declared: usize,
    consumed: usize,
}

/// Reads the header, mapping zero-bytes-available to `Eof` and a partial
/// header to `TruncatedRecord`.
fn read_header_or_eof(r: &mut impl Read, buf: &mut [u8]) -> Result<(), CodecError> {
    let mut filled = 0;
    while filled < buf.len() {
        match r.read(&mut buf[filled..]) {
            Ok(0) => {
                return Err(if filled == 0 {
                    CodecError::Eof
                } else {
                    CodecError::TruncatedRecord { consumed: filled }
                });
            }
            Ok(n) => filled += n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(CodecError::Io(e)),
        }
    }
    Ok(())
}

fn read_exact_tracked(
    r: &mut impl Read,
    buf: &mut [u8],
    consumed: usize,
) -> Result<(), CodecError> {
    r.read_exact(buf).map_err(|e| {
        if e.kind() == io::ErrorKind::UnexpectedEof {
            CodecError::TruncatedRecord { consumed }
        } else {
            CodecError::Io(e)
        }
    })
}

fn read_chunk(
    r: &mut impl Read,
    hasher: &mut Hasher,
    budget: &mut ReadingBudget,
) -> Result<Vec<u8>, CodecError> {
    let mut len_buf = [0u8; CHUNK_LEN_PREFIX];
    read_exact_tracked(r, &mut len_buf, budget.consumed)?;
    hasher.update(&len_buf);
    budget.consumed += CHUNK_LEN_PREFIX;

    let len = u32::from_le_bytes(len_buf) as usize;
    if budget.declared < budget.consumed + len {
        return Err(CodecError::ChunkOverrun {
            chunk_len: len,
            declared: budget.declared,
            consumed: budget.consumed,
        });
    }

    let mut chunk = vec![0u8; len];
    read_exact_tracked(r, &mut chunk, budget.consumed)?;
    hasher.update(&chunk);
    budget.consumed += len;
    Ok(chunk)
}

fn read_group<T>(
    r: &mut impl Read,
    hasher: &mut Hasher,
    budget: &mut ReadingBudget,
    count: u32,
    parse: impl Fn(&[u8]) -> Result<T, lattice_types::TypesError>,
) -> Result<Vec<T>, CodecError> {
    if count as usize > budget.declared {
        return Err(CodecError::ImplausibleCount {
            count,
            declared: budget.declared,
            consumed: budget.consumed,
        });
    }
    let mut out = Vec::with_capacity(count as usize);
    for _ in 0..count {
        let chunk = read_chunk(r, hasher, budget)?;
        out.push(parse_chunk(&chunk, &parse, budget)?);
    }
    Ok(out)
}

fn parse_chunk<T>(
    chunk: &[u8],
    parse: impl Fn(&[u8]) -> Result<T, lattice_types::TypesError>,
    budget: &ReadingBudget,
) -> Result<T, CodecError> {
    parse(chunk).map_err(|source| CodecError::InvalidChunk {
        source,
        consumed: budget.consumed,
    })
}
