//! Fixed-record text format of the ring files.
//!
//! Every record, the header included, is exactly [`RECLEN`] bytes so slot `i`
//! lives at byte offset `i * RECLEN`:
//!
//! ```text
//! YYMMDDHH;      EDT1;      EDT2;      ERT1;      ERT2;       GDT;<pad>\n
//! 24101813;  1234.567;  2345.678;     0.000;     0.000;   456.789;<pad>\n
//! ```

pub mod queries;

use crate::domain::{Decimal3, Granularity, SlotRecord};

pub const RECLEN: usize = 75;
const LINE_WIDTH: usize = RECLEN - 1;
const FIELD_NAMES: [&str; 5] = ["EDT1", "EDT2", "ERT1", "ERT2", "GDT"];

#[derive(thiserror::Error, Debug)]
pub enum RingFileError {
    #[error("value {0} does not fit a 10-column field")]
    Overflow(Decimal3),
    #[error("ring file is {actual} bytes, expected {expected}")]
    Length { actual: usize, expected: usize },
    #[error("ring header does not match the {0} layout")]
    Header(Granularity),
    #[error("malformed record: {0}")]
    Malformed(String),
    #[error("'{0}' is not a valid {1} label")]
    Label(String, Granularity),
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),
}

/// Decoded ring file. `slots[0]` is always `None` (header record).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RingImage {
    pub slots: Vec<Option<SlotRecord>>,
    /// Records that could not be parsed or sat at the wrong index.
    pub discarded: usize,
}

/// Slot index that window `label` occupies.
pub fn slot_index(granularity: Granularity, label: u32) -> usize {
    (label as usize % granularity.live_slots()) + 1
}

fn pad_line(line: String) -> Vec<u8> {
    let mut bytes = line.into_bytes();
    bytes.resize(LINE_WIDTH, b' ');
    bytes.push(b'\n');
    bytes
}

fn data_line(label: &str, fields: [Decimal3; 5]) -> Result<Vec<u8>, RingFileError> {
    if let Some(wide) = fields.iter().find(|v| v.to_string().len() > 10) {
        return Err(RingFileError::Overflow(*wide));
    }
    let [a, b, c, d, e] = fields;
    Ok(pad_line(format!(
        "{label:<8.8};{a:>10};{b:>10};{c:>10};{d:>10};{e:>10};"
    )))
}

pub fn header_record(granularity: Granularity) -> Vec<u8> {
    let [a, b, c, d, e] = FIELD_NAMES;
    pad_line(format!(
        "{:<8.8};{a:>10};{b:>10};{c:>10};{d:>10};{e:>10};",
        granularity.label_column()
    ))
}

/// Encode one slot; `None` is an empty slot (blank label, zero fields).
pub fn encode_record(
    granularity: Granularity,
    record: Option<&SlotRecord>,
) -> Result<Vec<u8>, RingFileError> {
    match record {
        None => data_line("", [Decimal3::ZERO; 5]),
        Some(r) => {
            let label = granularity
                .label_text(r.label)
                .ok_or_else(|| RingFileError::Label(r.label.to_string(), granularity))?;
            data_line(&label, r.fields())
        }
    }
}

pub fn decode_record(
    granularity: Granularity,
    bytes: &[u8],
) -> Result<Option<SlotRecord>, RingFileError> {
    if bytes.len() != RECLEN || bytes[LINE_WIDTH] != b'\n' {
        return Err(RingFileError::Malformed(format!("record length {}", bytes.len())));
    }
    let line = std::str::from_utf8(&bytes[..LINE_WIDTH])
        .map_err(|e| RingFileError::Malformed(e.to_string()))?
        .trim_end();

    let parts: Vec<&str> = line.split(';').collect();
    if parts.len() != 7 || !parts[6].is_empty() {
        return Err(RingFileError::Malformed(format!("expected 6 fields in '{line}'")));
    }

    let label_text = parts[0].trim();
    if label_text.is_empty() {
        return Ok(None);
    }
    let label = granularity
        .parse_label(label_text)
        .ok_or_else(|| RingFileError::Label(label_text.to_string(), granularity))?;

    let mut fields = [Decimal3::ZERO; 5];
    for (slot, raw) in fields.iter_mut().zip(&parts[1..6]) {
        *slot = raw
            .parse()
            .map_err(|e: crate::domain::ParseDecimalError| RingFileError::Malformed(e.to_string()))?;
    }
    let [edt1, edt2, ert1, ert2, gdt] = fields;

    Ok(Some(SlotRecord {
        label,
        edt1,
        edt2,
        ert1,
        ert2,
        gdt,
    }))
}

/// Header followed by empty records, the state of a freshly created ring.
pub fn blank_ring(granularity: Granularity) -> Vec<u8> {
    let mut out = Vec::with_capacity(granularity.slots() * RECLEN);
    out.extend(header_record(granularity));
    for _ in 1..granularity.slots() {
        // An empty record has no label to render, it cannot overflow.
        if let Ok(rec) = encode_record(granularity, None) {
            out.extend(rec);
        }
    }
    out
}

/// Decode a whole ring file.
///
/// Structural problems (length, header) fail the whole file; a bad record
/// only empties its own slot.
pub fn decode_ring(granularity: Granularity, bytes: &[u8]) -> Result<RingImage, RingFileError> {
    let expected = granularity.slots() * RECLEN;
    if bytes.len() != expected {
        return Err(RingFileError::Length {
            actual: bytes.len(),
            expected,
        });
    }
    if bytes[..RECLEN] != header_record(granularity)[..] {
        return Err(RingFileError::Header(granularity));
    }

    let mut slots = vec![None; granularity.slots()];
    let mut discarded = 0;
    for (index, chunk) in bytes.chunks_exact(RECLEN).enumerate().skip(1) {
        match decode_record(granularity, chunk) {
            Ok(Some(rec)) if slot_index(granularity, rec.label) == index => slots[index] = Some(rec),
            Ok(Some(_)) | Err(_) => discarded += 1,
            Ok(None) => {}
        }
    }

    Ok(RingImage { slots, discarded })
}
