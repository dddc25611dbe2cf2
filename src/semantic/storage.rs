//! Binary storage for vector indexes.
//!
//! File format:
//!
//! Header (54 bytes):
//! - magic: [u8; 4] (`RMVI`)
//! - version: u8 (1)
//! - backend: u8 (0 = exact, 1 = ivf)
//! - model_id: [u8; 32] (SHA256 hash of model name)
//! - dimensions: u32 (little-endian)
//! - entry_count: u64 (little-endian)
//! - checksum: u32 (CRC32 of header fields before checksum)
//!
//! Body (backend specific), followed by a CRC32 of the body bytes.
//!
//! Entries are encoded the same way by every backend:
//! - id_len: u32 (little-endian)
//! - id: [u8; id_len] (UTF-8)
//! - embedding: [f32; dimensions] (little-endian)
//!
//! The ivf body starts with nlist, nscan, iterations and the centroid count
//! (all u32), then the centroids, then entries each followed by their list
//! number (u32, `u32::MAX` when unassigned).

use std::fs::File;
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::{Path, PathBuf};

use crate::semantic::index::{FlatIndex, IndexKind, VectorIndex};
use crate::semantic::ivf::IvfIndex;
use crate::semantic::EmbeddingVector;

const MAGIC: &[u8; 4] = b"RMVI";

/// Current file format version
const FORMAT_VERSION: u8 = 1;

/// Header size in bytes: magic(4) + version(1) + backend(1) + model_id(32)
/// + dimensions(4) + entry_count(8) + checksum(4)
const HEADER_SIZE: usize = 54;

/// Longest entry id accepted when reading.
const MAX_ID_LEN: usize = 64 * 1024;

/// Errors that can occur during storage operations.
#[derive(Debug, thiserror::Error)]
pub enum VectorStorageError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid file format: {0}")]
    InvalidFormat(String),

    #[error("Version mismatch: file version {0}, supported version {1}")]
    VersionMismatch(u8, u8),

    #[error("Model mismatch: file uses different model")]
    ModelMismatch,

    #[error("Checksum mismatch: file may be corrupted")]
    ChecksumMismatch,

    #[error("Dimension mismatch: expected {expected}, file has {got}")]
    DimensionMismatch { expected: usize, got: usize },

    #[error("Backend mismatch: expected {expected:?}, file has {got:?}")]
    BackendMismatch { expected: IndexKind, got: IndexKind },
}

/// Storage manager for vector indexes.
#[derive(Debug, Clone)]
pub struct VectorStorage {
    path: PathBuf,
}

impl VectorStorage {
    /// Create a new storage manager for the given path.
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    /// Get the storage file path.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Check if the storage file exists.
    pub fn exists(&self) -> bool {
        self.path.exists()
    }

    /// Load an index of whatever backend the file holds.
    ///
    /// # Arguments
    /// * `expected_model_id` - SHA256 hash of the expected model name
    /// * `expected_dimensions` - Expected embedding dimensions
    pub fn load(
        &self,
        expected_model_id: &[u8; 32],
        expected_dimensions: usize,
    ) -> Result<Box<dyn VectorIndex>, VectorStorageError> {
        let file = File::open(&self.path)?;
        let mut reader = BufReader::new(file);

        let header = read_header(&mut reader)?;
        validate_header(&header, expected_model_id, expected_dimensions)?;

        let mut rest = Vec::new();
        reader.read_to_end(&mut rest)?;
        if rest.len() < 4 {
            return Err(VectorStorageError::InvalidFormat(
                "missing body checksum".to_string(),
            ));
        }

        let (body, checksum) = rest.split_at(rest.len() - 4);
        let stored_checksum = u32::from_le_bytes([checksum[0], checksum[1], checksum[2], checksum[3]]);
        if crc32fast::hash(body) != stored_checksum {
            return Err(VectorStorageError::ChecksumMismatch);
        }

        let mut input: &[u8] = body;
        let dimensions = header.dimensions as usize;
        let index: Box<dyn VectorIndex> = match header.kind {
            IndexKind::Exact => Box::new(FlatIndex::decode_body(&mut input, dimensions, header.entry_count)?),
            IndexKind::Ivf => Box::new(IvfIndex::decode_body(&mut input, dimensions, header.entry_count)?),
        };

        if !input.is_empty() {
            return Err(VectorStorageError::InvalidFormat(format!(
                "{} unexpected trailing bytes",
                input.len()
            )));
        }

        log::debug!(
            "loaded {:?} index with {} entries from {}",
            header.kind,
            index.len(),
            self.path.display()
        );

        Ok(index)
    }

    /// Load and require a specific backend.
    pub fn load_kind(
        &self,
        kind: IndexKind,
        expected_model_id: &[u8; 32],
        expected_dimensions: usize,
    ) -> Result<Box<dyn VectorIndex>, VectorStorageError> {
        let index = self.load(expected_model_id, expected_dimensions)?;
        if index.kind() != kind {
            return Err(VectorStorageError::BackendMismatch {
                expected: kind,
                got: index.kind(),
            });
        }
        Ok(index)
    }

    /// Save the vector index to storage.
    ///
    /// Uses atomic write: temp file -> fsync -> rename
    pub fn save(&self, index: &dyn VectorIndex, model_id: &[u8; 32]) -> Result<(), VectorStorageError> {
        let temp_path = self.path.with_extension("tmp");

        let result = self.write_to_file(&temp_path, index, model_id);

        if result.is_err() {
            // Clean up temp file on error
            let _ = std::fs::remove_file(&temp_path);
            return result;
        }

        std::fs::rename(&temp_path, &self.path)?;

        log::debug!(
            "saved {:?} index with {} entries to {}",
            index.kind(),
            index.len(),
            self.path.display()
        );

        Ok(())
    }

    /// Delete the storage file if it exists.
    pub fn delete(&self) -> Result<(), VectorStorageError> {
        if self.path.exists() {
            std::fs::remove_file(&self.path)?;
        }
        Ok(())
    }

    fn write_to_file(
        &self,
        path: &Path,
        index: &dyn VectorIndex,
        model_id: &[u8; 32],
    ) -> Result<(), VectorStorageError> {
        let dimensions = u32::try_from(index.dimensions()).map_err(|_| {
            VectorStorageError::InvalidFormat(format!(
                "{} dimensions do not fit the file format",
                index.dimensions()
            ))
        })?;

        let header = Header {
            kind: index.kind(),
            model_id: *model_id,
            dimensions,
            entry_count: index.len() as u64,
        };

        // The body is checksummed as a whole, so build it in memory first.
        let mut body = Vec::new();
        index.encode_body(&mut body)?;

        let file = File::create(path)?;
        let mut writer = BufWriter::new(file);

        write_header(&mut writer, &header)?;
        writer.write_all(&body)?;
        writer.write_all(&crc32fast::hash(&body).to_le_bytes())?;

        // Flush and sync
        writer.flush()?;
        let file = writer
            .into_inner()
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::Other, e))?;
        file.sync_all()?;

        Ok(())
    }
}

/// File header structure.
#[derive(Debug)]
struct Header {
    kind: IndexKind,
    model_id: [u8; 32],
    dimensions: u32,
    entry_count: u64,
}

fn read_header(reader: &mut impl Read) -> Result<Header, VectorStorageError> {
    let mut header_bytes = [0u8; HEADER_SIZE];
    read_exact(reader, &mut header_bytes)?;

    if &header_bytes[0..4] != MAGIC {
        return Err(VectorStorageError::InvalidFormat(
            "not a vector index file".to_string(),
        ));
    }

    let version = header_bytes[4];
    if version > FORMAT_VERSION {
        return Err(VectorStorageError::VersionMismatch(version, FORMAT_VERSION));
    }

    let stored_checksum = u32::from_le_bytes([
        header_bytes[50],
        header_bytes[51],
        header_bytes[52],
        header_bytes[53],
    ]);
    if crc32fast::hash(&header_bytes[0..50]) != stored_checksum {
        return Err(VectorStorageError::ChecksumMismatch);
    }

    let kind = IndexKind::from_tag(header_bytes[5]).ok_or_else(|| {
        VectorStorageError::InvalidFormat(format!("unknown backend tag {}", header_bytes[5]))
    })?;

    let mut model_id = [0u8; 32];
    model_id.copy_from_slice(&header_bytes[6..38]);

    let mut dimensions = [0u8; 4];
    dimensions.copy_from_slice(&header_bytes[38..42]);
    let mut entry_count = [0u8; 8];
    entry_count.copy_from_slice(&header_bytes[42..50]);

    Ok(Header {
        kind,
        model_id,
        dimensions: u32::from_le_bytes(dimensions),
        entry_count: u64::from_le_bytes(entry_count),
    })
}

fn validate_header(
    header: &Header,
    expected_model_id: &[u8; 32],
    expected_dimensions: usize,
) -> Result<(), VectorStorageError> {
    if header.model_id != *expected_model_id {
        return Err(VectorStorageError::ModelMismatch);
    }

    if header.dimensions as usize != expected_dimensions {
        return Err(VectorStorageError::DimensionMismatch {
            expected: expected_dimensions,
            got: header.dimensions as usize,
        });
    }

    Ok(())
}

fn write_header(writer: &mut impl Write, header: &Header) -> Result<(), VectorStorageError> {
    let mut header_bytes = [0u8; HEADER_SIZE];

    header_bytes[0..4].copy_from_slice(MAGIC);
    header_bytes[4] = FORMAT_VERSION;
    header_bytes[5] = header.kind.tag();
    header_bytes[6..38].copy_from_slice(&header.model_id);
    header_bytes[38..42].copy_from_slice(&header.dimensions.to_le_bytes());
    header_bytes[42..50].copy_from_slice(&header.entry_count.to_le_bytes());

    let checksum = crc32fast::hash(&header_bytes[0..50]);
    header_bytes[50..54].copy_from_slice(&checksum.to_le_bytes());

    writer.write_all(&header_bytes)?;
    Ok(())
}

/// `read_exact` that reports a short read as a format error.
fn read_exact(input: &mut (impl Read + ?Sized), buf: &mut [u8]) -> Result<(), VectorStorageError> {
    input.read_exact(buf).map_err(|e| match e.kind() {
        std::io::ErrorKind::UnexpectedEof => {
            VectorStorageError::InvalidFormat("unexpected end of file".to_string())
        }
        _ => VectorStorageError::Io(e),
    })
}

pub(crate) fn write_u32(out: &mut dyn Write, value: u32) -> Result<(), VectorStorageError> {
    out.write_all(&value.to_le_bytes())?;
    Ok(())
}

pub(crate) fn read_u32(input: &mut dyn Read) -> Result<u32, VectorStorageError> {
    let mut bytes = [0u8; 4];
    read_exact(input, &mut bytes)?;
    Ok(u32::from_le_bytes(bytes))
}

pub(crate) fn write_vector(out: &mut dyn Write, vector: &EmbeddingVector) -> Result<(), VectorStorageError> {
    for &value in vector.values() {
        out.write_all(&value.to_le_bytes())?;
    }
    Ok(())
}

/// Read `dimensions` floats; rejects anything that is not unit length or zero.
pub(crate) fn read_vector(
    input: &mut dyn Read,
    dimensions: usize,
) -> Result<EmbeddingVector, VectorStorageError> {
    let mut values = Vec::with_capacity(dimensions);
    for _ in 0..dimensions {
        let mut float_bytes = [0u8; 4];
        read_exact(input, &mut float_bytes)?;
        values.push(f32::from_le_bytes(float_bytes));
    }

    EmbeddingVector::from_stored(values)
        .ok_or_else(|| VectorStorageError::InvalidFormat("vector is not normalized".to_string()))
}

pub(crate) fn write_entry(
    out: &mut dyn Write,
    id: &str,
    vector: &EmbeddingVector,
) -> Result<(), VectorStorageError> {
    let id_len = u32::try_from(id.len())
        .map_err(|_| VectorStorageError::InvalidFormat(format!("id too long: {} bytes", id.len())))?;
    write_u32(out, id_len)?;
    out.write_all(id.as_bytes())?;
    write_vector(out, vector)
}

pub(crate) fn read_entry(
    input: &mut dyn Read,
    dimensions: usize,
) -> Result<(String, EmbeddingVector), VectorStorageError> {
    let id_len = read_u32(input)? as usize;
    if id_len > MAX_ID_LEN {
        return Err(VectorStorageError::InvalidFormat(format!(
            "id length {} exceeds limit",
            id_len
        )));
    }

    let mut id_bytes = vec![0u8; id_len];
    read_exact(input, &mut id_bytes)?;
    let id = String::from_utf8(id_bytes)
        .map_err(|_| VectorStorageError::InvalidFormat("id is not valid UTF-8".to_string()))?;

    let vector = read_vector(input, dimensions)?;
    Ok((id, vector))
}
