//! Декодер аннотаций `entries.log`
//!
//! Файл: заголовок фиксированной длины, затем записи фиксированного размера.
//! Длина, не укладывающаяся в `header + k × record`, означает неверную
//! версию схемы и считается фатальной ошибкой.

use std::{fs, path::Path};

use chrono::{DateTime, Datelike};
use log::debug;
use wmlog_types::{Entry, EntryGroup};

use crate::{
    binary::{field_bytes, read_u16_field, read_u32_field},
    error::{WmError, WmResult},
    schema::{select, Schema},
};

/// Имя файла аннотаций в каталоге исследования.
pub const ENTRIES_FILENAME: &str = "entries.log";

/// Максимальный год, который принимает декодер метки заголовка.
const MAX_YEAR: i32 = 9999;

/// Читает и декодирует файл аннотаций.
pub fn read_entries<P: AsRef<Path>>(
    path: P,
    version: Option<&str>,
) -> WmResult<Vec<Entry>> {
    let schema = select(version)?;
    let buf = fs::read(path)?;

    decode_entries(&buf, schema)
}

/// Декодирует аннотации из буфера, сохраняя порядок файла.
///
/// Пустой буфер — пустой список.
pub fn decode_entries(
    buf: &[u8],
    schema: &Schema,
) -> WmResult<Vec<Entry>> {
    if buf.is_empty() {
        return Ok(Vec::new());
    }

    let layout = &schema.entries;
    let header = layout.header.end;
    let record = layout.record_size;

    if buf.len() < header || (buf.len() - header) % record != 0 {
        return Err(WmError::CorruptEntriesLength {
            len: buf.len(),
            header,
            record,
        });
    }

    let timestamp = schema
        .timestamp_fmt
        .decode_secs(field_bytes(buf, layout.header_timestamp, 0)?);
    validate_timestamp(timestamp)?;

    let mut entries = Vec::with_capacity((buf.len() - header) / record);

    for base in (header..buf.len()).step_by(record) {
        let group = EntryGroup::from_code(read_u16_field(buf, layout.group, base)?);
        let fid = format!("{:08x}", read_u32_field(buf, layout.log_id, base)?);
        let timestamp = schema
            .timestamp_fmt
            .decode_fractional(field_bytes(buf, layout.timestamp, base)?);
        let message = printable_text(field_bytes(buf, layout.text, base)?);

        entries.push(Entry {
            fid,
            group,
            timestamp,
            message,
        });
    }

    debug!("Decoded {} entries (header timestamp {timestamp})", entries.len());

    Ok(entries)
}

/// Текст записи как Latin-1 без непечатаемых символов.
pub fn printable_text(bytes: &[u8]) -> String {
    bytes
        .iter()
        .map(|&b| b as char)
        .filter(|&c| is_printable(c))
        .collect()
}

/// Печатаемость символа Latin-1: пробел допустим, управляющие символы,
/// неразрывный пробел и мягкий перенос — нет.
pub fn is_printable(c: char) -> bool {
    !(c.is_control() || c == '\u{A0}' || c == '\u{AD}')
}

fn validate_timestamp(secs: u64) -> WmResult<()> {
    let valid = i64::try_from(secs)
        .ok()
        .and_then(|s| DateTime::from_timestamp(s, 0))
        .is_some_and(|dt| dt.year() <= MAX_YEAR);

    if valid {
        Ok(())
    } else {
        Err(WmError::InvalidTimestamp(secs))
    }
}
