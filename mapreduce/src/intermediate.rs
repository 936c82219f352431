//! On-disk contract between the map and reduce phases.
//!
//! 4-byte magic, `u32` version, length-prefixed key/value records.

use std::path::Path;

use crate::Error;

const MRIM_MAGIC: &[u8; 4] = b"MRIM";
const MRIM_VERSION: u32 = 1;

/// Chooses the reduce bucket for `key`, using FNV-1a — the same hash the
/// lab this spec was distilled from uses (`hash/fnv`'s 32a variant in
/// `mr/worker.go`'s `ihash`), so a given key always lands in the same
/// bucket regardless of which worker processes it.
pub fn bucket_of(key: &str, n_reduce: u32) -> u32 {
    const FNV_OFFSET_BASIS: u32 = 0x811c9dc5;
    const FNV_PRIME: u32 = 0x01000193;

    let mut hash = FNV_OFFSET_BASIS;
    for byte in key.as_bytes() {
        hash ^= *byte as u32;
        hash = hash.wrapping_mul(FNV_PRIME);
    }
    (hash & 0x7fffffff) % n_reduce
}

/// Encodes a sequence of key/value records into the MRIM wire format.
pub fn encode_records(records: &[(String, String)]) -> Vec<u8> {
    let mut buf = Vec::new();
    buf.extend_from_slice(MRIM_MAGIC);
    buf.extend_from_slice(&MRIM_VERSION.to_le_bytes());
    buf.extend_from_slice(&(records.len() as u32).to_le_bytes());

    for (key, value) in records {
        let key_bytes = key.as_bytes();
        buf.extend_from_slice(&(key_bytes.len() as u32).to_le_bytes());
        buf.extend_from_slice(key_bytes);

        let value_bytes = value.as_bytes();
        buf.extend_from_slice(&(value_bytes.len() as u32).to_le_bytes());
        buf.extend_from_slice(value_bytes);
    }

    buf
}

/// Decodes the MRIM wire format produced by [`encode_records`].
pub fn decode_records(data: &[u8]) -> Result<Vec<(String, String)>, Error> {
    if data.is_empty() {
        return Ok(Vec::new());
    }
    if data.len() < 12 || &data[0..4] != MRIM_MAGIC {
        return Err(Error::Decode("invalid intermediate file magic".into()));
    }

    let version = u32::from_le_bytes(data[4..8].try_into().unwrap());
    if version != MRIM_VERSION {
        return Err(Error::Decode(format!("unsupported intermediate file version {version}")));
    }

    let count = u32::from_le_bytes(data[8..12].try_into().unwrap()) as usize;
    let mut offset = 12;
    let mut records = Vec::with_capacity(count);

    for _ in 0..count {
        let key_len = read_u32(data, &mut offset)? as usize;
        let key = read_string(data, &mut offset, key_len)?;
        let value_len = read_u32(data, &mut offset)? as usize;
        let value = read_string(data, &mut offset, value_len)?;
        records.push((key, value));
    }

    Ok(records)
}

fn read_u32(data: &[u8], offset: &mut usize) -> Result<u32, Error> {
    if *offset + 4 > data.len() {
        return Err(Error::Decode("intermediate file truncated (length)".into()));
    }
    let v = u32::from_le_bytes(data[*offset..*offset + 4].try_into().unwrap());
    *offset += 4;
    Ok(v)
}

fn read_string(data: &[u8], offset: &mut usize, len: usize) -> Result<String, Error> {
    if *offset + len > data.len() {
        return Err(Error::Decode("intermediate file truncated (payload)".into()));
    }
    let s = String::from_utf8_lossy(&data[*offset..*offset + len]).into_owned();
    *offset += len;
    Ok(s)
}

/// Writes `data` to `path` atomically: the temp file is created in `path`'s
/// own directory (so the final rename is on the same filesystem) and
/// `persist`ed, never leaving a partial file visible under the final name.
pub fn write_atomic(path: &Path, data: &[u8]) -> Result<(), Error> {
    let dir = path.parent().unwrap_or_else(|| Path::new("."));
    let mut temp = tempfile::NamedTempFile::new_in(dir)?;
    std::io::Write::write_all(&mut temp, data)?;
    temp.persist(path).map_err(|e| Error::Io(e.error))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_records() {
        let records = vec![
            ("hello".to_string(), "1".to_string()),
            ("world".to_string(), "1".to_string()),
            ("hello".to_string(), "1".to_string()),
        ];
        let encoded = encode_records(&records);
        let decoded = decode_records(&encoded).unwrap();
        assert_eq!(decoded, records);
    }

    #[test]
    fn empty_records_round_trip_to_empty() {
        let encoded = encode_records(&[]);
        let decoded = decode_records(&encoded).unwrap();
        assert!(decoded.is_empty());
    }

    #[test]
    fn bucket_assignment_is_deterministic() {
        let n_reduce = 4;
        for key in ["hello", "world", "foo", "bar"] {
            assert_eq!(bucket_of(key, n_reduce), bucket_of(key, n_reduce));
            assert!(bucket_of(key, n_reduce) < n_reduce);
        }
    }

    #[test]
    fn write_atomic_never_leaves_partial_file_under_final_name() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("mr-out-0");
        write_atomic(&path, b"final content").unwrap();
        assert_eq!(std::fs::read(&path).unwrap(), b"final content");
    }

    #[test]
    fn decode_rejects_bad_magic() {
        let err = decode_records(b"BAD!\x01\x00\x00\x00\x00\x00\x00\x00");
        assert!(matches!(err, Err(Error::Decode(_))));
    }
}
