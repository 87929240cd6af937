//! Декодер заголовка лога WorkMate
//!
//! Заголовок читается один раз на файл. Из него получаем метку времени,
//! число колонок блока данных, адрес блока данных, настройки усилителя и
//! таблицу каналов. Аномалии отдельных каналов (неактивный подблок,
//! повтор имени, нет ни одной ссылки) — штатные особенности прибора:
//! такие каналы молча отбрасываются.

use std::{
    collections::HashSet,
    fs::File,
    io::{ErrorKind, Read, Seek, SeekFrom},
    path::Path,
};

use log::debug;
use wmlog_types::{AmplifierSettings, Channel, Channels, Header, InputSource};

use crate::{
    binary::{field_bytes, read_pair_field, read_u16_field, read_u8_field},
    error::{WmError, WmResult},
    schema::{Schema, INACTIVE_REFERENCE, UNUSED_SLOT},
};

/// Символы, которые нельзя оставлять в имени (имя попадает в пути файлов).
const UNSAFE_NAME_CHARS: [char; 5] = [',', ';', '/', ':', '\\'];

/// Читает и декодирует заголовок файла по пути.
pub fn read_header<P: AsRef<Path>>(
    path: P,
    schema: &Schema,
) -> WmResult<Header> {
    let mut file = File::open(path)?;

    read_header_from(&mut file, schema)
}

/// Читает заголовок с начала потока. Короткое чтение — `MalformedHeader`.
pub fn read_header_from<R: Read + Seek>(
    reader: &mut R,
    schema: &Schema,
) -> WmResult<Header> {
    let mut buf = vec![0u8; schema.log.header.len()];

    reader.seek(SeekFrom::Start(schema.log.header.start as u64))?;
    reader.read_exact(&mut buf).map_err(|e| match e.kind() {
        ErrorKind::UnexpectedEof => WmError::malformed_header(format!(
            "file shorter than the {}-byte header",
            buf.len()
        )),
        _ => WmError::Io(e),
    })?;

    decode_header(&buf, schema)
}

/// Декодирует заголовок из буфера (смещения схемы — от начала буфера).
pub fn decode_header(
    buf: &[u8],
    schema: &Schema,
) -> WmResult<Header> {
    let log = &schema.log;

    if buf.len() < log.header.end {
        return Err(WmError::malformed_header(format!(
            "header is {} bytes, schema expects {}",
            buf.len(),
            log.header.end
        )));
    }

    let timestamp = schema
        .timestamp_fmt
        .decode_secs(field_bytes(buf, log.timestamp, 0)?);
    let num_channels = read_u16_field(buf, log.num_channels, 0)?;
    let datablock_address = read_u16_field(buf, log.start_address, 0)? as u64;
    let sample_mapping = field_bytes(buf, log.sample_mapping, 0)?;

    let amp = AmplifierSettings {
        resolution: read_u16_field(buf, log.amplifier.resolution, 0)?,
        highpass_freq: read_u16_field(buf, log.amplifier.highpass_freq, 0)?,
        notch_freq: read_u16_field(buf, log.amplifier.notch_freq, 0)?,
        sampling_freq: read_u16_field(buf, log.amplifier.sampling_freq, 0)?,
    };

    let channels = decode_channels(buf, schema, sample_mapping)?;

    Ok(Header {
        timestamp,
        num_channels,
        channels,
        amp,
        datablock_address,
    })
}

fn decode_channels(
    buf: &[u8],
    schema: &Schema,
    sample_mapping: &[u8],
) -> WmResult<Channels> {
    let layout = &schema.log.channel;
    let mut channels = Channels::new();
    let mut used_names = HashSet::new();

    for slot in 0..schema.channel_slots() {
        let base = schema.log.channels.start + slot * layout.subblock_size;

        // первый байт 0 — подблок не используется
        if read_u8_field(buf, layout.name, base)? == 0 {
            continue;
        }

        let name = sanitize_name(&decode_name(field_bytes(buf, layout.name, base)?));

        // первое вхождение имени побеждает
        if !used_names.insert(name.clone()) {
            debug!("slot {slot}: duplicate channel '{name}' skipped");
            continue;
        }

        let source = InputSource::from_u8(read_u8_field(buf, layout.input_source, base)?);
        let (pos_id, neg_id) = read_pair_field(buf, layout.ids, base)?;
        let positive = map_reference(pos_id, sample_mapping);
        let negative = map_reference(neg_id, sample_mapping);

        if let Err(e) = validate_reference(&name, positive, negative) {
            debug!("slot {slot}: {e}, channel dropped");
            continue;
        }

        let (pos_pin, neg_pin) = read_pair_field(buf, layout.jbox_pins, base)?;
        let pos_pin = (pos_pin != UNUSED_SLOT).then_some(pos_pin);
        let neg_pin = (neg_pin != UNUSED_SLOT).then_some(neg_pin);

        match (positive, negative) {
            (Some(p), Some(n)) => {
                let pos = Channel {
                    name: format!("u+{name}"),
                    reference: p,
                    source,
                    pin: pos_pin,
                };
                let neg = Channel {
                    name: format!("u-{name}"),
                    reference: n,
                    source,
                    pin: neg_pin,
                };

                channels.add_bipolar(name, pos, neg);
            }
            (Some(reference), None) => {
                let ch = Channel {
                    name: name.clone(),
                    reference,
                    source,
                    pin: pos_pin,
                };

                channels.add_unipolar(name, ch);
            }
            (None, Some(reference)) => {
                let ch = Channel {
                    name: name.clone(),
                    reference,
                    source,
                    pin: neg_pin,
                };

                channels.add_unipolar(name, ch);
            }
            (None, None) => {}
        }
    }

    Ok(channels)
}

/// Отображает id канала в позицию колонки через таблицу выборок.
fn map_reference(
    id: u8,
    sample_mapping: &[u8],
) -> Option<usize> {
    if id == UNUSED_SLOT {
        return None;
    }

    match sample_mapping.get(id as usize) {
        Some(&col) if col != UNUSED_SLOT => Some(col as usize),
        _ => None,
    }
}

/// Отведение без сигнала: обе ссылки пусты или одна из них — 140.
fn validate_reference(
    name: &str,
    positive: Option<usize>,
    negative: Option<usize>,
) -> WmResult<()> {
    let inactive = [positive, negative].contains(&Some(INACTIVE_REFERENCE));

    if inactive || (positive.is_none() && negative.is_none()) {
        return Err(WmError::InvalidReference(name.to_string()));
    }

    Ok(())
}

/// Байты имени как Latin-1, без NUL по краям.
fn decode_name(bytes: &[u8]) -> String {
    let raw: String = bytes.iter().map(|&b| b as char).collect();

    raw.trim_matches('\0').to_string()
}

/// Заменяет `, ; / : \` на `-`.
pub fn sanitize_name(name: &str) -> String {
    name.chars()
        .map(|c| if UNSAFE_NAME_CHARS.contains(&c) { '-' } else { c })
        .collect()
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use super::*;
    use crate::schema::{WMX32, WMX64};
    use wmlog_types::Mount;

    /// Заголовок с пустой таблицей каналов и тождественной таблицей выборок.
    fn blank_header(schema: &Schema) -> Vec<u8> {
        let log = &schema.log;
        let mut buf = vec![0u8; log.header.end];

        for (i, b) in buf[log.sample_mapping.start..log.sample_mapping.end]
            .iter_mut()
            .enumerate()
        {
            *b = i as u8;
        }

        buf
    }

    fn put_channel(
        buf: &mut [u8],
        schema: &Schema,
        slot: usize,
        name: &str,
        ids: (u8, u8),
        source: u8,
    ) {
        let layout = &schema.log.channel;
        let base = schema.log.channels.start + slot * layout.subblock_size;
        let name_bytes = name.as_bytes();

        buf[base..base + name_bytes.len()].copy_from_slice(name_bytes);
        buf[base + layout.ids.start] = ids.0;
        buf[base + layout.ids.start + 1] = ids.1;
        buf[base + layout.input_source.start] = source;
        buf[base + layout.jbox_pins.start] = 7;
        buf[base + layout.jbox_pins.start + 1] = UNUSED_SLOT;
    }

    #[test]
    fn test_decode_scalar_fields_x64() {
        let schema = &WMX64;
        let log = &schema.log;
        let mut buf = blank_header(schema);

        buf[0..8].copy_from_slice(&1_704_067_200_999u64.to_le_bytes());
        buf[log.num_channels.start..log.num_channels.end].copy_from_slice(&2u16.to_le_bytes());
        buf[log.start_address.start..log.start_address.end]
            .copy_from_slice(&0x393Cu16.to_le_bytes());
        buf[log.amplifier.resolution.start..log.amplifier.resolution.end]
            .copy_from_slice(&2u16.to_le_bytes());
        buf[log.amplifier.sampling_freq.start..log.amplifier.sampling_freq.end]
            .copy_from_slice(&2000u16.to_le_bytes());

        let header = decode_header(&buf, schema).unwrap();

        assert_eq!(header.timestamp, 1_704_067_200, "делитель 1000, целые секунды");
        assert_eq!(header.num_channels, 2);
        assert_eq!(header.datablock_address, 0x393C);
        assert_eq!(header.amp.resolution, 2);
        assert_eq!(header.amp.sampling_freq, 2000);
        assert!(header.channels.is_empty());
    }

    #[test]
    fn test_decode_scalar_fields_x32() {
        let schema = &WMX32;
        let mut buf = blank_header(schema);

        buf[0..4].copy_from_slice(&1_704_067_200u32.to_le_bytes());
        buf[4..6].copy_from_slice(&3u16.to_le_bytes());

        let header = decode_header(&buf, schema).unwrap();

        assert_eq!(header.timestamp, 1_704_067_200);
        assert_eq!(header.num_channels, 3);
    }

    #[test]
    fn test_single_reference_channel() {
        let schema = &WMX64;
        let mut buf = blank_header(schema);

        put_channel(&mut buf, schema, 0, "I", (UNUSED_SLOT, 5), 1);

        let header = decode_header(&buf, schema).unwrap();
        let content = header.channels.content();

        assert_eq!(content.len(), 1);
        assert_eq!(content[0].name, "I");
        assert_eq!(content[0].reference, 5);
        assert_eq!(content[0].source, InputSource::Ecg);
        assert_eq!(content[0].pin, None, "пин берётся со стороны присутствующей ссылки");
        assert_eq!(header.channels.get_mount("I"), Some(Mount::Unipolar(0)));
    }

    #[test]
    fn test_bipolar_channel_split() {
        let schema = &WMX32;
        let mut buf = blank_header(schema);

        put_channel(&mut buf, schema, 0, "II", (1, UNUSED_SLOT), 1);
        put_channel(&mut buf, schema, 3, "CS 1-2", (3, 5), 2);

        let header = decode_header(&buf, schema).unwrap();

        assert_eq!(header.channel_names(), vec!["II", "u+CS 1-2", "u-CS 1-2"]);
        assert_eq!(header.channels.content()[1].reference, 3);
        assert_eq!(header.channels.content()[2].reference, 5);
        assert_eq!(header.channels.content()[1].pin, Some(7));
        assert_eq!(header.channels.get_mount("CS 1-2"), Some(Mount::Bipolar(1, 2)));
    }

    #[test]
    fn test_inactive_and_duplicate_channels_dropped() {
        let schema = &WMX64;
        let mut buf = blank_header(schema);

        put_channel(&mut buf, schema, 0, "A", (UNUSED_SLOT, UNUSED_SLOT), 2);
        put_channel(&mut buf, schema, 1, "A", (4, UNUSED_SLOT), 2);
        put_channel(&mut buf, schema, 2, "B", (140, UNUSED_SLOT), 2);
        put_channel(&mut buf, schema, 3, "C", (6, UNUSED_SLOT), 2);

        let header = decode_header(&buf, schema).unwrap();

        // "A" занято первым (невалидным) вхождением, "B" ссылается на 140
        assert_eq!(header.channel_names(), vec!["C"]);
    }

    #[test]
    fn test_unused_sample_slot_is_absent() {
        let schema = &WMX64;
        let mut buf = blank_header(schema);

        buf[schema.log.sample_mapping.start + 9] = UNUSED_SLOT;
        put_channel(&mut buf, schema, 0, "D", (9, 2), 2);

        let header = decode_header(&buf, schema).unwrap();

        assert_eq!(header.channel_names(), vec!["D"]);
        assert_eq!(header.channels.content()[0].reference, 2);
    }

    #[test]
    fn test_name_sanitized_and_trimmed() {
        let schema = &WMX64;
        let mut buf = blank_header(schema);

        put_channel(&mut buf, schema, 0, "a/b:c;d,e\\", (0, UNUSED_SLOT), 0);

        let header = decode_header(&buf, schema).unwrap();

        assert_eq!(header.channel_names(), vec!["a-b-c-d-e-"]);
    }

    #[test]
    fn test_short_read_is_malformed() {
        let mut cursor = Cursor::new(vec![0u8; 100]);
        let err = read_header_from(&mut cursor, &WMX64).unwrap_err();

        assert!(matches!(err, WmError::MalformedHeader(_)));
        assert!(decode_header(&[0u8; 16], &WMX32).is_err());
    }
}
