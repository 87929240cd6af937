//! Реестр байтовых схем WorkMate
//!
//! Две несовместимые раскладки: семейство x32 (WorkMate 4.1, 32-битные
//! метки времени в секундах) и семейство x64 (WorkMate 4.2/4.3, 64-битные
//! метки в миллисекундах). Все многобайтовые числа — little-endian.
//! Схемы — неизменяемые `'static` константы, выбираются по строке версии.

use byteorder::{ByteOrder, LittleEndian};

use crate::error::{WmError, WmResult};

/// Полуоткрытый диапазон байт `[start, end)` внутри блока.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Field {
    pub start: usize,
    pub end: usize,
}

/// Семейство схем
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchemaFamily {
    /// WorkMate ≤ 4.1
    X32,
    /// WorkMate 4.2, 4.3
    X64,
}

/// Кодирование метки времени: ширина целого и делитель до секунд.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimestampFormat {
    pub width: usize,
    pub divisor: u64,
}

/// Поля подблока канала (смещения относительно начала подблока).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChannelLayout {
    pub subblock_size: usize,
    pub name: Field,
    pub display_scale: Field,
    pub ids: Field,
    pub lowpass_freq: Field,
    pub highpass_freq: Field,
    pub display_color: Field,
    pub input_source: Field,
    pub jbox_pins: Field,
    pub analysis_type: Field,
    pub sync_type: Field,
}

/// Поля настроек усилителя (абсолютные смещения в заголовке).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AmplifierLayout {
    pub resolution: Field,
    pub highpass_freq: Field,
    pub notch_freq: Field,
    pub sampling_freq: Field,
}

/// Раскладка файла лога с данными.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LogLayout {
    /// Весь заголовок
    pub header: Field,
    pub timestamp: Field,
    pub num_channels: Field,
    /// Область подблоков каналов
    pub channels: Field,
    pub channel: ChannelLayout,
    pub amplifier: AmplifierLayout,
    /// Таблица: номер слота канала → позиция колонки (0xFF — не используется)
    pub sample_mapping: Field,
    /// Адрес первого байта блока данных
    pub start_address: Field,
    /// Байт на один отсчёт
    pub sample_size: usize,
}

/// Раскладка entries.log (смещения записи — относительно начала записи).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EntriesLayout {
    pub header: Field,
    pub header_timestamp: Field,
    pub header_date: Field,
    pub group: Field,
    pub log_id: Field,
    pub timestamp: Field,
    pub text: Field,
    pub record_size: usize,
}

/// Дескриптор схемы одного семейства.
#[derive(Debug, PartialEq, Eq)]
pub struct Schema {
    pub family: SchemaFamily,
    pub supported_versions: &'static [&'static str],
    pub timestamp_fmt: TimestampFormat,
    pub log: LogLayout,
    pub entries: EntriesLayout,
}

/// Значение слота, отмечающее неиспользуемый канал/пин.
pub const UNUSED_SLOT: u8 = 0xFF;

/// Ссылка, которой прибор помечает неактивное отведение.
pub const INACTIVE_REFERENCE: usize = 140;

/// Минимальный размер чанка (строк на один pull).
pub const MIN_CHUNK_SAMPLES: usize = 1024;

const fn f(
    start: usize,
    end: usize,
) -> Field {
    Field { start, end }
}

// Подблок канала одинаков в обоих семействах, отличается только размер.
const fn channel_layout(subblock_size: usize) -> ChannelLayout {
    ChannelLayout {
        subblock_size,
        name: f(0x0, 0xC),
        display_scale: f(0xC, 0xE),
        ids: f(0xE, 0x10),
        lowpass_freq: f(0x10, 0x12),
        highpass_freq: f(0x12, 0x14),
        display_color: f(0x14, 0x15),
        input_source: f(0x15, 0x16),
        jbox_pins: f(0x16, 0x18),
        analysis_type: f(0x18, 0x19),
        sync_type: f(0x19, 0x1A),
    }
}

pub static WMX32: Schema = Schema {
    family: SchemaFamily::X32,
    supported_versions: &["4.1"],
    timestamp_fmt: TimestampFormat {
        width: 4,
        divisor: 1,
    },
    log: LogLayout {
        header: f(0x0000, 0x35B8),
        timestamp: f(0x0, 0x4),
        num_channels: f(0x4, 0x6),
        channels: f(0x2E, 0x34AE),
        channel: channel_layout(0x1E),
        amplifier: AmplifierLayout {
            resolution: f(0x34AE, 0x34B0),
            highpass_freq: f(0x34B0, 0x34B2),
            notch_freq: f(0x34B2, 0x34B4),
            sampling_freq: f(0x34B4, 0x34B6),
        },
        sample_mapping: f(0x34B6, 0x35B6),
        start_address: f(0x35B6, 0x35B8),
        sample_size: 4,
    },
    entries: EntriesLayout {
        header: f(0x00, 0x20),
        header_timestamp: f(0x02, 0x06),
        header_date: f(0x06, 0x10),
        group: f(0x0, 0x2),
        log_id: f(0x2, 0x6),
        timestamp: f(0xA, 0xE),
        text: f(0xE, 0xC0),
        record_size: 0xD8,
    },
};

pub static WMX64: Schema = Schema {
    family: SchemaFamily::X64,
    supported_versions: &["4.2", "4.3"],
    timestamp_fmt: TimestampFormat {
        width: 8,
        divisor: 1000,
    },
    log: LogLayout {
        header: f(0x0000, 0x393C),
        timestamp: f(0x0, 0x8),
        num_channels: f(0x8, 0xA),
        channels: f(0x32, 0x3832),
        channel: channel_layout(0x20),
        amplifier: AmplifierLayout {
            resolution: f(0x3832, 0x3834),
            highpass_freq: f(0x3834, 0x3836),
            notch_freq: f(0x3836, 0x3838),
            sampling_freq: f(0x3838, 0x383A),
        },
        sample_mapping: f(0x383A, 0x393A),
        start_address: f(0x393A, 0x393C),
        sample_size: 4,
    },
    entries: EntriesLayout {
        header: f(0x00, 0x24),
        header_timestamp: f(0x02, 0x0A),
        header_date: f(0x0A, 0x14),
        group: f(0x0, 0x2),
        log_id: f(0x2, 0x6),
        timestamp: f(0xA, 0x12),
        text: f(0x12, 0xC2),
        record_size: 0xDC,
    },
};

impl Field {
    pub const fn len(&self) -> usize {
        self.end - self.start
    }

    pub const fn is_empty(&self) -> bool {
        self.end <= self.start
    }

    /// Срез поля, сдвинутый на `base`; `None` если буфер короче.
    pub fn slice_at<'a>(
        &self,
        buf: &'a [u8],
        base: usize,
    ) -> Option<&'a [u8]> {
        buf.get(base + self.start..base + self.end)
    }
}

impl TimestampFormat {
    /// Сырое целое значение метки (без деления).
    pub fn decode_raw(
        &self,
        bytes: &[u8],
    ) -> u64 {
        LittleEndian::read_uint(bytes, self.width)
    }

    /// Целые секунды (целочисленное деление).
    pub fn decode_secs(
        &self,
        bytes: &[u8],
    ) -> u64 {
        self.decode_raw(bytes) / self.divisor
    }

    /// Дробные секунды.
    pub fn decode_fractional(
        &self,
        bytes: &[u8],
    ) -> f64 {
        self.decode_raw(bytes) as f64 / self.divisor as f64
    }
}

impl Schema {
    /// Число подблоков каналов в заголовке.
    pub fn channel_slots(&self) -> usize {
        self.log.channels.len() / self.log.channel.subblock_size
    }
}

/// Выбирает схему по строке версии; `None` — семейство x64.
pub fn select(version: Option<&str>) -> WmResult<&'static Schema> {
    let Some(version) = version else {
        return Ok(&WMX64);
    };

    let version = version.trim();

    [&WMX32, &WMX64]
        .into_iter()
        .find(|s| s.supported_versions.iter().any(|v| *v == version))
        .ok_or_else(|| WmError::UnsupportedVersion(version.to_string()))
}
