//! Fixed-width status record layout
//!
//! The status buffer is a sequence of 80-byte ASCII records, each holding
//! `KEY=VALUE` right-padded with spaces. A record reading `END` followed by
//! 77 spaces terminates the sequence.

use crate::map::StatusMap;
use crate::value::Value;
use crate::{Error, Result};

/// Size of one record in bytes
pub const RECORD_SIZE: usize = 80;

/// End-of-data sentinel record
pub const END_RECORD: &[u8; RECORD_SIZE] = &END_RECORD_BYTES;

const END_RECORD_BYTES: [u8; RECORD_SIZE] = {
    let mut record = [b' '; RECORD_SIZE];
    record[0] = b'E';
    record[1] = b'N';
    record[2] = b'D';
    record
};

/// Parse records from the start of `bytes` up to the END record.
///
/// Stops with [`Error::UnterminatedBuffer`] when `bytes` runs out or
/// `max_records` records have been read without meeting the sentinel. Any
/// bad record aborts the whole parse, a misaligned record would shift every
/// record after it.
pub fn parse_records(bytes: &[u8], max_records: Option<usize>) -> Result<StatusMap> {
    let mut map = StatusMap::new();
    let mut offset = 0;
    let mut records = 0;

    loop {
        let record = bytes
            .get(offset..offset + RECORD_SIZE)
            .ok_or(Error::UnterminatedBuffer { offset, records })?;
        if record == END_RECORD {
            break;
        }
        if max_records.is_some_and(|max| records >= max) {
            return Err(Error::UnterminatedBuffer { offset, records });
        }

        let (key, value) = split_record(record, offset)?;
        map.insert(key.trim(), Value::decode(value));

        offset += RECORD_SIZE;
        records += 1;
    }

    tracing::trace!(records, keys = map.len(), "parsed status records");
    Ok(map)
}

fn split_record(record: &[u8], offset: usize) -> Result<(&str, &str)> {
    let text = std::str::from_utf8(record).map_err(|_| Error::RecordDecodeError {
        offset,
        raw: record.to_vec(),
    })?;
    text.split_once('=').ok_or_else(|| Error::MalformedRecord {
        offset,
        record: text.to_string(),
    })
}

/// Lay out `KEY=VALUE` as one space-padded record
pub fn encode_record(key: &str, value: &str) -> Result<[u8; RECORD_SIZE]> {
    let len = key.len() + 1 + value.len();
    if key.contains('=') || len > RECORD_SIZE {
        return Err(Error::MalformedRecord {
            offset: 0,
            record: format!("{key}={value}"),
        });
    }

    let mut record = [b' '; RECORD_SIZE];
    record[..key.len()].copy_from_slice(key.as_bytes());
    record[key.len()] = b'=';
    record[key.len() + 1..len].copy_from_slice(value.as_bytes());
    Ok(record)
}
