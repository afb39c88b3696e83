//! Commit log records.
//!
//! Every committed write transaction becomes one framed record:
//!
//! ```text
//! | magic (4) | version (2) | length (4) | payload (N) | crc32 (4) |
//! ```
//!
//! The payload is an op count followed by the ops in commit order. Each op is
//! a tag byte and length-prefixed byte strings:
//!
//! ```text
//! 1 CreateBucket | bucket
//! 2 Put          | bucket | key | value
//! 3 Delete       | bucket | key
//! 4 ClearBucket  | bucket
//! ```
//!
//! ## Recovery policy
//!
//! A record cut short at the end of the log (crash before the append
//! completed) is treated as a clean end of log. A record whose declared
//! length overruns the log while a complete record still follows it is not
//! a torn tail but a damaged length, and is fatal. So are a bad magic, an
//! unknown version or op tag, and a checksum mismatch.

use crate::error::{StorageError, StorageResult};

/// Magic bytes at the start of every commit record.
pub const LOG_MAGIC: [u8; 4] = *b"SKVB";

/// Current commit record format version.
pub const LOG_VERSION: u16 = 1;

/// magic (4) + version (2) + length (4)
const HEADER_SIZE: usize = 10;

const CRC_SIZE: usize = 4;

/// A single mutation inside a commit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Mutation {
    /// Create a bucket if it does not already exist.
    CreateBucket {
        /// Bucket name.
        bucket: Vec<u8>,
    },
    /// Insert or overwrite a key.
    Put {
        /// Bucket name.
        bucket: Vec<u8>,
        /// Key bytes.
        key: Vec<u8>,
        /// Value bytes.
        value: Vec<u8>,
    },
    /// Remove a key.
    Delete {
        /// Bucket name.
        bucket: Vec<u8>,
        /// Key bytes.
        key: Vec<u8>,
    },
    /// Remove every key of a bucket, keeping the bucket.
    ClearBucket {
        /// Bucket name.
        bucket: Vec<u8>,
    },
}

impl Mutation {
    fn tag(&self) -> u8 {
        match self {
            Self::CreateBucket { .. } => 1,
            Self::Put { .. } => 2,
            Self::Delete { .. } => 3,
            Self::ClearBucket { .. } => 4,
        }
    }
}

fn put_bytes(buf: &mut Vec<u8>, bytes: &[u8]) -> StorageResult<()> {
    let len = u32::try_from(bytes.len()).map_err(|_| StorageError::TooLarge { len: bytes.len() })?;
    buf.extend_from_slice(&len.to_le_bytes());
    buf.extend_from_slice(bytes);
    Ok(())
}

/// Encodes a commit into a framed, checksummed log record.
///
/// # Errors
///
/// Returns [`StorageError::TooLarge`] if any component exceeds the 4-byte
/// length fields.
pub fn encode_commit(mutations: &[Mutation]) -> StorageResult<Vec<u8>> {
    let mut payload = Vec::new();
    let count = u32::try_from(mutations.len()).map_err(|_| StorageError::TooLarge {
        len: mutations.len(),
    })?;
    payload.extend_from_slice(&count.to_le_bytes());

    for mutation in mutations {
        payload.push(mutation.tag());
        match mutation {
            Mutation::CreateBucket { bucket } | Mutation::ClearBucket { bucket } => {
                put_bytes(&mut payload, bucket)?;
            }
            Mutation::Put { bucket, key, value } => {
                put_bytes(&mut payload, bucket)?;
                put_bytes(&mut payload, key)?;
                put_bytes(&mut payload, value)?;
            }
            Mutation::Delete { bucket, key } => {
                put_bytes(&mut payload, bucket)?;
                put_bytes(&mut payload, key)?;
            }
        }
    }

    let len = u32::try_from(payload.len()).map_err(|_| StorageError::TooLarge {
        len: payload.len(),
    })?;

    let mut record = Vec::with_capacity(HEADER_SIZE + payload.len() + CRC_SIZE);
    record.extend_from_slice(&LOG_MAGIC);
    record.extend_from_slice(&LOG_VERSION.to_le_bytes());
    record.extend_from_slice(&len.to_le_bytes());
    record.extend_from_slice(&payload);
    let crc = crc32fast::hash(&record);
    record.extend_from_slice(&crc.to_le_bytes());
    Ok(record)
}

/// Result of scanning a raw commit log.
#[derive(Debug, Default)]
pub struct Replay {
    /// Decoded commits in log order.
    pub commits: Vec<Vec<Mutation>>,
    /// Length of the log prefix made of complete records.
    pub valid_len: u64,
}

impl Replay {
    /// Returns true if the scanned log ended in a partial record.
    #[must_use]
    pub fn has_torn_tail(&self, log_len: u64) -> bool {
        self.valid_len < log_len
    }
}

struct PayloadReader<'a> {
    data: &'a [u8],
    pos: usize,
    offset: u64,
}

impl<'a> PayloadReader<'a> {
    fn take(&mut self, n: usize) -> StorageResult<&'a [u8]> {
        let end = self
            .pos
            .checked_add(n)
            .filter(|end| *end <= self.data.len())
            .ok_or_else(|| StorageError::corrupted(self.offset, "payload shorter than declared"))?;
        let slice = &self.data[self.pos..end];
        self.pos = end;
        Ok(slice)
    }

    fn u32(&mut self) -> StorageResult<u32> {
        let bytes = self.take(4)?;
        Ok(u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
    }

    fn bytes(&mut self) -> StorageResult<Vec<u8>> {
        let len = self.u32()? as usize;
        Ok(self.take(len)?.to_vec())
    }
}

fn decode_payload(payload: &[u8], offset: u64) -> StorageResult<Vec<Mutation>> {
    let mut reader = PayloadReader {
        data: payload,
        pos: 0,
        offset,
    };
    let count = reader.u32()? as usize;
    let mut mutations = Vec::with_capacity(count.min(1024));

    for _ in 0..count {
        let tag = reader.take(1)?[0];
        let mutation = match tag {
            1 => Mutation::CreateBucket {
                bucket: reader.bytes()?,
            },
            2 => Mutation::Put {
                bucket: reader.bytes()?,
                key: reader.bytes()?,
                value: reader.bytes()?,
            },
            3 => Mutation::Delete {
                bucket: reader.bytes()?,
                key: reader.bytes()?,
            },
            4 => Mutation::ClearBucket {
                bucket: reader.bytes()?,
            },
            other => {
                return Err(StorageError::corrupted(
                    offset,
                    format!("unknown op tag {other}"),
                ))
            }
        };
        mutations.push(mutation);
    }

    if reader.pos != payload.len() {
        return Err(StorageError::corrupted(offset, "trailing bytes in payload"));
    }
    Ok(mutations)
}

/// Returns true if a complete, checksummed record starts at `pos`.
fn complete_record_at(data: &[u8], pos: usize) -> bool {
    let Some(header) = data.get(pos..pos.saturating_add(HEADER_SIZE)) else {
        return false;
    };
    if header[0..4] != LOG_MAGIC || u16::from_le_bytes([header[4], header[5]]) != LOG_VERSION {
        return false;
    }
    let len = u32::from_le_bytes([header[6], header[7], header[8], header[9]]) as usize;
    let body_end = pos.saturating_add(HEADER_SIZE).saturating_add(len);
    let Some(crc) = data.get(body_end..body_end.saturating_add(CRC_SIZE)) else {
        return false;
    };
    u32::from_le_bytes([crc[0], crc[1], crc[2], crc[3]]) == crc32fast::hash(&data[pos..body_end])
}

/// Scans a raw log into commits.
///
/// # Errors
///
/// Returns [`StorageError::Corrupted`] on bad magic, unknown version,
/// checksum mismatch, a malformed payload, or a length that overruns the
/// log ahead of a complete record.
pub fn replay(data: &[u8]) -> StorageResult<Replay> {
    let mut replay = Replay::default();
    let mut pos = 0usize;

    while pos < data.len() {
        let offset = pos as u64;
        let remaining = data.len() - pos;
        if remaining < HEADER_SIZE {
            break;
        }

        let header = &data[pos..pos + HEADER_SIZE];
        if header[0..4] != LOG_MAGIC {
            return Err(StorageError::corrupted(offset, "bad record magic"));
        }
        let version = u16::from_le_bytes([header[4], header[5]]);
        if version != LOG_VERSION {
            return Err(StorageError::corrupted(
                offset,
                format!("unsupported record version {version}"),
            ));
        }
        let len = u32::from_le_bytes([header[6], header[7], header[8], header[9]]) as usize;

        let total = HEADER_SIZE + len + CRC_SIZE;
        if remaining < total {
            if let Some(next) = (pos + 1..data.len()).find(|&p| complete_record_at(data, p)) {
                return Err(StorageError::corrupted(
                    offset,
                    format!("record length {len} overruns the log; a complete record follows at {next}"),
                ));
            }
            break;
        }

        let body_end = pos + HEADER_SIZE + len;
        let stored = u32::from_le_bytes([
            data[body_end],
            data[body_end + 1],
            data[body_end + 2],
            data[body_end + 3],
        ]);
        let computed = crc32fast::hash(&data[pos..body_end]);
        if stored != computed {
            return Err(StorageError::corrupted(
                offset,
                format!("checksum mismatch: expected {stored:08x}, got {computed:08x}"),
            ));
        }

        let payload = &data[pos + HEADER_SIZE..body_end];
        replay.commits.push(decode_payload(payload, offset)?);
        pos += total;
        replay.valid_len = pos as u64;
    }

    Ok(replay)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Vec<Mutation> {
        vec![
            Mutation::CreateBucket {
                bucket: b"Type.Widget".to_vec(),
            },
            Mutation::Put {
                bucket: b"Type.Widget".to_vec(),
                key: b"3e9-1".to_vec(),
                value: b"{}".to_vec(),
            },
            Mutation::Delete {
                bucket: b"Type.Widget".to_vec(),
                key: b"3e9-0".to_vec(),
            },
            Mutation::ClearBucket {
                bucket: b"Index.Widget.Sku".to_vec(),
            },
        ]
    }

    #[test]
    fn replay_reads_back_commits() {
        let mut log = encode_commit(&sample()).unwrap();
        log.extend(encode_commit(&sample()[..1]).unwrap());

        let replay = replay(&log).unwrap();
        assert_eq!(replay.commits.len(), 2);
        assert_eq!(replay.commits[0], sample());
        assert_eq!(replay.valid_len, log.len() as u64);
        assert!(!replay.has_torn_tail(log.len() as u64));
    }

    #[test]
    fn torn_tail_is_tolerated() {
        let first = encode_commit(&sample()).unwrap();
        let second = encode_commit(&sample()).unwrap();
        let mut log = first.clone();
        log.extend_from_slice(&second[..second.len() - 3]);

        let replay = replay(&log).unwrap();
        assert_eq!(replay.commits.len(), 1);
        assert_eq!(replay.valid_len, first.len() as u64);
        assert!(replay.has_torn_tail(log.len() as u64));
    }

    #[test]
    fn overrunning_length_before_complete_records_is_fatal() {
        let mut log = encode_commit(&sample()).unwrap();
        let second = log.len();
        log.extend(encode_commit(&sample()).unwrap());
        log.extend(encode_commit(&sample()[..1]).unwrap());
        log[9] = 0x7f;

        let err = replay(&log).unwrap_err();
        assert!(matches!(err, StorageError::Corrupted { offset: 0, .. }));
        assert!(err.to_string().contains(&second.to_string()));
    }

    #[test]
    fn torn_tail_containing_magic_bytes_is_tolerated() {
        let first = encode_commit(&sample()).unwrap();
        let second = encode_commit(&[Mutation::Put {
            bucket: b"b".to_vec(),
            key: b"k".to_vec(),
            value: b"SKVB\x01\x00SKVB".to_vec(),
        }])
        .unwrap();
        let mut log = first.clone();
        log.extend_from_slice(&second[..second.len() - 2]);

        let replay = replay(&log).unwrap();
        assert_eq!(replay.commits.len(), 1);
        assert_eq!(replay.valid_len, first.len() as u64);
    }

    #[test]
    fn flipped_byte_is_fatal() {
        let mut log = encode_commit(&sample()).unwrap();
        let mid = log.len() / 2;
        log[mid] ^= 0xFF;

        assert!(matches!(replay(&log), Err(StorageError::Corrupted { .. })));
    }

    #[test]
    fn bad_magic_is_fatal() {
        let mut log = encode_commit(&sample()).unwrap();
        log[0] = b'X';
        assert!(matches!(replay(&log), Err(StorageError::Corrupted { offset: 0, .. })));
    }

    #[test]
    fn empty_log_replays_nothing() {
        let replay = replay(&[]).unwrap();
        assert!(replay.commits.is_empty());
        assert_eq!(replay.valid_len, 0);
    }

    proptest::proptest! {
        #[test]
        fn replay_never_panics_on_garbage(data in proptest::collection::vec(proptest::prelude::any::<u8>(), 0..256)) {
            let _ = replay(&data);
        }

        #[test]
        fn any_prefix_of_valid_log_replays(cut in 0usize..200) {
            let mut log = encode_commit(&sample()).unwrap();
            log.extend(encode_commit(&sample()[1..2]).unwrap());
            let cut = cut.min(log.len());
            let replay = replay(&log[..cut]).unwrap();
            proptest::prop_assert!(replay.valid_len <= cut as u64);
        }
    }
}
