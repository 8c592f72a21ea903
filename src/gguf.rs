//! Minimal GGUF header reader used to vet model files before the runtime
//! touches them.
//!
//! Reads the magic, version, tensor count, and the `general.*` string
//! metadata needed for display. Tensor data and non-string values are
//! skipped by size; large arrays (tokenizer vocabularies) are never
//! materialized.

use std::fs::File;
use std::io::{BufReader, Read, Seek};
use std::path::Path;

use byteorder::{LittleEndian, ReadBytesExt};
use thiserror::Error;

/// "GGUF" in little-endian ASCII.
const GGUF_MAGIC: u32 = 0x4655_4747;

/// Upper bound for any single metadata string; anything longer means a
/// corrupt length field.
const MAX_STRING_LEN: u64 = 1 << 24;

/// Upper bound for array lengths, to keep skip arithmetic in range on
/// corrupt files.
const MAX_ARRAY_LEN: u64 = 1 << 32;

// GGUF metadata value type ids.
const T_UINT8: u32 = 0;
const T_INT8: u32 = 1;
const T_UINT16: u32 = 2;
const T_INT16: u32 = 3;
const T_UINT32: u32 = 4;
const T_INT32: u32 = 5;
const T_FLOAT32: u32 = 6;
const T_BOOL: u32 = 7;
const T_STRING: u32 = 8;
const T_ARRAY: u32 = 9;
const T_UINT64: u32 = 10;
const T_INT64: u32 = 11;
const T_FLOAT64: u32 = 12;

#[derive(Debug, Error)]
pub enum GgufError {
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),
    #[error("invalid GGUF file: {0}")]
    InvalidFormat(String),
}

/// Header facts about a GGUF model file.
#[derive(Debug, Clone)]
pub struct GgufInfo {
    pub version: u32,
    pub tensor_count: u64,
    pub name: Option<String>,
    pub architecture: Option<String>,
}

impl GgufInfo {
    /// Parses the file header and scans metadata for `general.name` and
    /// `general.architecture`, stopping as soon as both are found.
    pub fn read(path: &Path) -> Result<Self, GgufError> {
        let mut file = BufReader::new(File::open(path)?);

        let magic = file.read_u32::<LittleEndian>()?;
        if magic != GGUF_MAGIC {
            return Err(GgufError::InvalidFormat("bad magic number".to_string()));
        }
        let version = file.read_u32::<LittleEndian>()?;
        let tensor_count = read_count(&mut file, version)?;
        let metadata_count = read_count(&mut file, version)?;

        let mut info = GgufInfo {
            version,
            tensor_count,
            name: None,
            architecture: None,
        };

        for _ in 0..metadata_count {
            let key = read_string(&mut file, version)?;
            let value_type = file.read_u32::<LittleEndian>()?;
            if value_type == T_STRING {
                let value = read_string(&mut file, version)?;
                match key.as_str() {
                    "general.name" => info.name = Some(value),
                    "general.architecture" => info.architecture = Some(value),
                    _ => {}
                }
            } else {
                skip_value(&mut file, version, value_type)?;
            }
            if info.name.is_some() && info.architecture.is_some() {
                break;
            }
        }

        Ok(info)
    }
}

/// Counts and string lengths widened to u64 in version 3.
fn read_count<R: Read>(reader: &mut R, version: u32) -> Result<u64, GgufError> {
    if version >= 3 {
        Ok(reader.read_u64::<LittleEndian>()?)
    } else {
        Ok(reader.read_u32::<LittleEndian>()? as u64)
    }
}

fn read_string<R: Read>(reader: &mut R, version: u32) -> Result<String, GgufError> {
    let len = read_count(reader, version)?;
    if len > MAX_STRING_LEN {
        return Err(GgufError::InvalidFormat(format!(
            "metadata string length {} exceeds limit",
            len
        )));
    }
    let mut bytes = vec![0u8; len as usize];
    reader.read_exact(&mut bytes)?;
    Ok(String::from_utf8_lossy(&bytes).into_owned())
}

fn skip_value<R: Read + Seek>(
    reader: &mut BufReader<R>,
    version: u32,
    value_type: u32,
) -> Result<(), GgufError> {
    match value_type {
        T_UINT8 | T_INT8 | T_BOOL => skip_bytes(reader, 1),
        T_UINT16 | T_INT16 => skip_bytes(reader, 2),
        T_UINT32 | T_INT32 | T_FLOAT32 => skip_bytes(reader, 4),
        T_UINT64 | T_INT64 | T_FLOAT64 => skip_bytes(reader, 8),
        T_STRING => {
            read_string(reader, version)?;
            Ok(())
        }
        T_ARRAY => {
            let element_type = reader.read_u32::<LittleEndian>()?;
            let len = read_count(reader, version)?;
            if len > MAX_ARRAY_LEN {
                return Err(GgufError::InvalidFormat(format!(
                    "array length {} exceeds limit",
                    len
                )));
            }
            match element_type {
                T_UINT8 | T_INT8 | T_BOOL => skip_bytes(reader, len),
                T_UINT16 | T_INT16 => skip_bytes(reader, len * 2),
                T_UINT32 | T_INT32 | T_FLOAT32 => skip_bytes(reader, len * 4),
                T_UINT64 | T_INT64 | T_FLOAT64 => skip_bytes(reader, len * 8),
                // Strings and nested arrays have per-element lengths.
                _ => {
                    for _ in 0..len {
                        skip_value(reader, version, element_type)?;
                    }
                    Ok(())
                }
            }
        }
        other => Err(GgufError::InvalidFormat(format!(
            "unknown metadata value type {}",
            other
        ))),
    }
}

fn skip_bytes<R: Read + Seek>(reader: &mut BufReader<R>, count: u64) -> Result<(), GgufError> {
    reader.seek_relative(count as i64)?;
    Ok(())
}
