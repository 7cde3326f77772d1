//! Simulator keywords.
//!
//! An [`EclKeyword`] is a named, typed vector as the simulator exchanges it.
//! Two encodings exist:
//! - the at-rest buffer encoding used when a static keyword is checkpointed
//!   (little-endian, via [`BufferWriter`]);
//! - the keyword file format handed to the simulator: a sequence of records
//!   `name[8] count:i32 type[4] data`, big-endian, names space-padded.

use std::fs;
use std::path::Path;

use ensnode_buffer::{BufferReader, BufferWriter};
use ensnode_error::{EnsError, Result};

/// Maximum keyword name length in the file format.
pub const KEYWORD_NAME_LEN: usize = 8;
const KEYWORD_TYPE_LEN: usize = 4;

const TYPE_TAG_INT: i32 = 1;
const TYPE_TAG_FLOAT: i32 = 2;
const TYPE_TAG_DOUBLE: i32 = 3;

/// Element storage of a keyword.
#[derive(Debug, Clone, PartialEq)]
pub enum KeywordData {
    Int(Vec<i32>),
    Float(Vec<f32>),
    Double(Vec<f64>),
}

impl KeywordData {
    #[must_use]
    pub fn len(&self) -> usize {
        match self {
            Self::Int(v) => v.len(),
            Self::Float(v) => v.len(),
            Self::Double(v) => v.len(),
        }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Element `index` widened to `f64`.
    #[must_use]
    pub fn get_f64(&self, index: usize) -> Option<f64> {
        match self {
            Self::Int(v) => v.get(index).map(|&x| f64::from(x)),
            Self::Float(v) => v.get(index).map(|&x| f64::from(x)),
            Self::Double(v) => v.get(index).copied(),
        }
    }

    /// All elements widened to `f64`.
    #[must_use]
    pub fn to_f64_vec(&self) -> Vec<f64> {
        match self {
            Self::Int(v) => v.iter().map(|&x| f64::from(x)).collect(),
            Self::Float(v) => v.iter().map(|&x| f64::from(x)).collect(),
            Self::Double(v) => v.clone(),
        }
    }

    const fn type_name(&self) -> &'static [u8; KEYWORD_TYPE_LEN] {
        match self {
            Self::Int(_) => b"INTE",
            Self::Float(_) => b"REAL",
            Self::Double(_) => b"DOUB",
        }
    }

    const fn type_tag(&self) -> i32 {
        match self {
            Self::Int(_) => TYPE_TAG_INT,
            Self::Float(_) => TYPE_TAG_FLOAT,
            Self::Double(_) => TYPE_TAG_DOUBLE,
        }
    }
}

/// A named simulator keyword.
#[derive(Debug, Clone, PartialEq)]
pub struct EclKeyword {
    name: String,
    data: KeywordData,
}

impl EclKeyword {
    /// Create a keyword; the name must be 1..=8 ASCII characters.
    pub fn new(name: impl Into<String>, data: KeywordData) -> Result<Self> {
        let name = name.into();
        validate_keyword_name(&name)?;
        Ok(Self { name, data })
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub const fn data(&self) -> &KeywordData {
        &self.data
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.data.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Append the at-rest encoding to `writer`.
    pub fn buffer_store(&self, writer: &mut BufferWriter) -> Result<()> {
        writer.write_str(&self.name)?;
        writer.write_i32(self.data.type_tag());
        match &self.data {
            KeywordData::Int(values) => {
                writer.write_i32(len_i32(values.len())?);
                for &v in values {
                    writer.write_i32(v);
                }
            }
            KeywordData::Float(values) => {
                let widened: Vec<f64> = values.iter().map(|&v| f64::from(v)).collect();
                writer.write_f64_slice(&widened)?;
            }
            KeywordData::Double(values) => writer.write_f64_slice(values)?,
        }
        Ok(())
    }

    /// Decode the at-rest encoding.
    pub fn buffer_load(reader: &mut BufferReader<'_>) -> Result<Self> {
        let name = reader.read_string("keyword name")?;
        let type_tag = reader.read_i32("keyword type")?;
        let data = match type_tag {
            TYPE_TAG_INT => {
                let count = reader.read_i32("keyword count")?;
                let count = usize::try_from(count)
                    .map_err(|_| EnsError::corrupt(format!("negative keyword count {count}")))?;
                if count.saturating_mul(4) > reader.remaining() {
                    return Err(EnsError::corrupt(format!(
                        "keyword {name} declares {count} ints but only {} bytes remain",
                        reader.remaining()
                    )));
                }
                let mut values = Vec::with_capacity(count);
                for _ in 0..count {
                    values.push(reader.read_i32("keyword int")?);
                }
                KeywordData::Int(values)
            }
            // Narrowing is exact: the values were widened from f32 on store.
            TYPE_TAG_FLOAT => KeywordData::Float(
                reader
                    .read_f64_vec("keyword floats")?
                    .into_iter()
                    .map(|v| v as f32)
                    .collect(),
            ),
            TYPE_TAG_DOUBLE => KeywordData::Double(reader.read_f64_vec("keyword doubles")?),
            other => {
                return Err(EnsError::corrupt(format!(
                    "keyword {name} has unknown element type tag {other}"
                )));
            }
        };
        validate_keyword_name(&name).map_err(|err| EnsError::corrupt(err.to_string()))?;
        Ok(Self { name, data })
    }
}

/// Reject names the keyword file format cannot hold.
pub fn validate_keyword_name(name: &str) -> Result<()> {
    if name.is_empty() || name.len() > KEYWORD_NAME_LEN || !name.is_ascii() {
        return Err(EnsError::config(format!(
            "keyword name {name:?} must be 1..={KEYWORD_NAME_LEN} ASCII characters"
        )));
    }
    Ok(())
}

/// Encode keywords in the keyword file format.
pub fn encode_keyword_file(keywords: &[EclKeyword]) -> Result<Vec<u8>> {
    let mut bytes = Vec::new();
    for keyword in keywords {
        let mut padded = [b' '; KEYWORD_NAME_LEN];
        padded[..keyword.name.len()].copy_from_slice(keyword.name.as_bytes());
        bytes.extend_from_slice(&padded);
        bytes.extend_from_slice(&len_i32(keyword.len())?.to_be_bytes());
        bytes.extend_from_slice(keyword.data.type_name());
        match &keyword.data {
            KeywordData::Int(values) => {
                for v in values {
                    bytes.extend_from_slice(&v.to_be_bytes());
                }
            }
            KeywordData::Float(values) => {
                for v in values {
                    bytes.extend_from_slice(&v.to_be_bytes());
                }
            }
            KeywordData::Double(values) => {
                for v in values {
                    bytes.extend_from_slice(&v.to_be_bytes());
                }
            }
        }
    }
    Ok(bytes)
}

/// Decode a keyword file.
pub fn decode_keyword_file(bytes: &[u8]) -> Result<Vec<EclKeyword>> {
    let mut cursor = 0usize;
    let mut keywords = Vec::new();
    while cursor < bytes.len() {
        let raw_name = take(bytes, &mut cursor, KEYWORD_NAME_LEN, "keyword name")?;
        let name = std::str::from_utf8(raw_name)
            .map_err(|_| EnsError::corrupt("keyword name is not ASCII"))?
            .trim_end()
            .to_owned();
        let count_raw = take(bytes, &mut cursor, 4, "keyword count")?;
        let count = i32::from_be_bytes([count_raw[0], count_raw[1], count_raw[2], count_raw[3]]);
        let count = usize::try_from(count)
            .map_err(|_| EnsError::corrupt(format!("keyword {name} has negative count {count}")))?;
        let type_name = take(bytes, &mut cursor, KEYWORD_TYPE_LEN, "keyword type")?;
        let data = match type_name {
            b"INTE" => KeywordData::Int(
                take_chunks::<4>(bytes, &mut cursor, count, &name)?
                    .map(i32::from_be_bytes)
                    .collect(),
            ),
            b"REAL" => KeywordData::Float(
                take_chunks::<4>(bytes, &mut cursor, count, &name)?
                    .map(f32::from_be_bytes)
                    .collect(),
            ),
            b"DOUB" => KeywordData::Double(
                take_chunks::<8>(bytes, &mut cursor, count, &name)?
                    .map(f64::from_be_bytes)
                    .collect(),
            ),
            other => {
                return Err(EnsError::corrupt(format!(
                    "keyword {name} has unknown type {:?}",
                    String::from_utf8_lossy(other)
                )));
            }
        };
        keywords.push(EclKeyword::new(name, data).map_err(|e| EnsError::corrupt(e.to_string()))?);
    }
    Ok(keywords)
}

/// Write keywords to `path`, replacing any previous content.
pub fn write_keyword_file(path: &Path, keywords: &[EclKeyword]) -> Result<()> {
    let bytes = encode_keyword_file(keywords)?;
    fs::write(path, bytes).map_err(|err| {
        EnsError::external(format!("writing keyword file {}: {err}", path.display()))
    })
}

/// Read every keyword in `path`.
pub fn read_keyword_file(path: &Path) -> Result<Vec<EclKeyword>> {
    let bytes = fs::read(path).map_err(|err| {
        EnsError::external(format!("reading keyword file {}: {err}", path.display()))
    })?;
    decode_keyword_file(&bytes)
}

fn len_i32(len: usize) -> Result<i32> {
    i32::try_from(len)
        .map_err(|_| EnsError::invalid_state(format!("keyword with {len} elements is too large")))
}

fn take<'a>(bytes: &'a [u8], cursor: &mut usize, len: usize, field: &str) -> Result<&'a [u8]> {
    let end = cursor
        .checked_add(len)
        .filter(|&end| end <= bytes.len())
        .ok_or_else(|| {
            EnsError::corrupt(format!(
                "keyword file truncated reading {field} at offset {}",
                *cursor
            ))
        })?;
    let out = &bytes[*cursor..end];
    *cursor = end;
    Ok(out)
}

fn take_chunks<'a, const N: usize>(
    bytes: &'a [u8],
    cursor: &mut usize,
    count: usize,
    name: &str,
) -> Result<impl Iterator<Item = [u8; N]> + 'a> {
    let len = count
        .checked_mul(N)
        .ok_or_else(|| EnsError::corrupt(format!("keyword {name} count overflows")))?;
    let raw = take(bytes, cursor, len, name)?;
    Ok(raw.chunks_exact(N).map(|chunk| {
        let mut out = [0u8; N];
        out.copy_from_slice(chunk);
        out
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_keywords() -> Vec<EclKeyword> {
        vec![
            EclKeyword::new("SWAT", KeywordData::Float(vec![0.25, 0.5, 0.75])).unwrap(),
            EclKeyword::new("ACTNUM", KeywordData::Int(vec![1, 0, 1])).unwrap(),
            EclKeyword::new("PRESSURE", KeywordData::Double(vec![250.125])).unwrap(),
        ]
    }

    #[test]
    fn file_format_layout() {
        let kw = EclKeyword::new("PORO", KeywordData::Int(vec![7])).unwrap();
        let bytes = encode_keyword_file(&[kw]).unwrap();
        assert_eq!(&bytes[..8], b"PORO    ");
        assert_eq!(&bytes[8..12], &[0, 0, 0, 1]);
        assert_eq!(&bytes[12..16], b"INTE");
        assert_eq!(&bytes[16..], &[0, 0, 0, 7]);
    }

    #[test]
    fn file_round_trip_keeps_order() {
        let keywords = sample_keywords();
        let decoded = decode_keyword_file(&encode_keyword_file(&keywords).unwrap()).unwrap();
        assert_eq!(decoded, keywords);
    }

    #[test]
    fn truncated_file_is_corrupt() {
        let bytes = encode_keyword_file(&sample_keywords()).unwrap();
        let err = decode_keyword_file(&bytes[..bytes.len() - 3]).unwrap_err();
        assert!(matches!(err, EnsError::CorruptRecord { .. }));
    }

    #[test]
    fn names_longer_than_eight_rejected() {
        let err = EclKeyword::new("TOOLONGNAME", KeywordData::Int(vec![])).unwrap_err();
        assert!(matches!(err, EnsError::Config { .. }));
        assert!(EclKeyword::new("", KeywordData::Int(vec![])).is_err());
    }

    #[test]
    fn buffer_encoding_round_trip() {
        let mut writer = BufferWriter::new();
        for kw in sample_keywords() {
            kw.buffer_store(&mut writer).unwrap();
        }
        let bytes = writer.into_bytes();
        let mut reader = BufferReader::new(&bytes);
        for expected in sample_keywords() {
            assert_eq!(EclKeyword::buffer_load(&mut reader).unwrap(), expected);
        }
        reader.expect_end().unwrap();
    }

    #[test]
    fn widened_access() {
        let data = KeywordData::Float(vec![1.5, 2.5]);
        assert_eq!(data.get_f64(1), Some(2.5));
        assert_eq!(data.get_f64(2), None);
        assert_eq!(KeywordData::Int(vec![3]).to_f64_vec(), vec![3.0]);
    }
}
