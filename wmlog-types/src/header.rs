use crate::Channels;

/// Настройки усилителя из заголовка лога
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AmplifierSettings {
    /// Множитель перевода отсчётов АЦП в физические единицы
    pub resolution: u16,
    /// Частота ФВЧ, Гц
    pub highpass_freq: u16,
    /// Частота режекторного фильтра, Гц
    pub notch_freq: u16,
    /// Частота дискретизации, Гц
    pub sampling_freq: u16,
}

/// Заголовок лога WorkMate.
///
/// Создаётся один раз при открытии файла и далее не изменяется.
#[derive(Debug, Clone, PartialEq)]
pub struct Header {
    /// Время начала записи (Unix timestamp, секунды)
    pub timestamp: u64,
    /// Количество колонок в блоке данных
    pub num_channels: u16,
    /// Таблица каналов и отведений
    pub channels: Channels,
    /// Настройки усилителя
    pub amp: AmplifierSettings,
    /// Адрес первого байта блока данных
    pub datablock_address: u64,
}

impl Header {
    /// Имена каналов в порядке хранения.
    pub fn channel_names(&self) -> Vec<&str> {
        self.channels
            .content()
            .iter()
            .map(|ch| ch.name.as_str())
            .collect()
    }
}
