//! Файл `MASTER` каталога исследования: идентификатор пациента.

use std::{fs, path::Path};

use crate::{error::WmResult, schema::Field};

/// Имя файла в каталоге исследования.
pub const MASTER_FILENAME: &str = "MASTER";

/// Поле идентификатора пациента.
pub const SUBJECT_ID: Field = Field {
    start: 0x43,
    end: 0x4F,
};

/// Читает идентификатор пациента из файла `MASTER`.
pub fn read_master<P: AsRef<Path>>(path: P) -> WmResult<String> {
    let buf = fs::read(path)?;

    Ok(decode_master(&buf))
}

/// ASCII-байты поля без NUL по краям; прочие байты игнорируются.
///
/// Короткий файл даёт усечённое (возможно пустое) значение.
pub fn decode_master(buf: &[u8]) -> String {
    let end = SUBJECT_ID.end.min(buf.len());
    let start = SUBJECT_ID.start.min(end);

    let id: String = buf[start..end]
        .iter()
        .filter(|b| b.is_ascii())
        .map(|&b| b as char)
        .collect();

    id.trim_matches('\0').to_string()
}
