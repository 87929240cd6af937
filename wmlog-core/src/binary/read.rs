use byteorder::{ByteOrder, LittleEndian};

use crate::{
    error::{WmError, WmResult},
    schema::Field,
};

/// Срез поля `field` относительно `base`.
///
/// Короткий буфер — это повреждённый заголовок, а не паника.
pub fn field_bytes<'a>(
    buf: &'a [u8],
    field: Field,
    base: usize,
) -> WmResult<&'a [u8]> {
    field.slice_at(buf, base).ok_or_else(|| {
        WmError::malformed_header(format!(
            "field {:#06x}..{:#06x} (+{base:#x}) beyond {} bytes",
            field.start,
            field.end,
            buf.len()
        ))
    })
}

pub fn read_u8_field(
    buf: &[u8],
    field: Field,
    base: usize,
) -> WmResult<u8> {
    Ok(field_bytes(buf, field, base)?[0])
}

pub fn read_u16_field(
    buf: &[u8],
    field: Field,
    base: usize,
) -> WmResult<u16> {
    Ok(LittleEndian::read_u16(field_bytes(buf, field, base)?))
}

pub fn read_u32_field(
    buf: &[u8],
    field: Field,
    base: usize,
) -> WmResult<u32> {
    Ok(LittleEndian::read_u32(field_bytes(buf, field, base)?))
}

/// Пара байт поля (например, ссылки или пины канала).
pub fn read_pair_field(
    buf: &[u8],
    field: Field,
    base: usize,
) -> WmResult<(u8, u8)> {
    let b = field_bytes(buf, field, base)?;

    Ok((b[0], b[1]))
}
