use chrono::{DateTime, Utc};

/// Категория аннотации (код группы записи entries.log)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EntryGroup {
    Protocol,
    Event,
    /// Коды 3 и 5
    Note,
    Idk,
    Pace,
    Rate,
    /// Код вне таблицы
    Unknown,
}

/// Аннотация из entries.log
#[derive(Debug, Clone, PartialEq)]
pub struct Entry {
    /// Идентификатор лога, 8 шестнадцатеричных цифр в нижнем регистре
    pub fid: String,
    pub group: EntryGroup,
    /// Unix timestamp, секунды (дробные для схемы x64)
    pub timestamp: f64,
    /// Текст без непечатаемых символов
    pub message: String,
}

impl EntryGroup {
    pub fn from_code(code: u16) -> Self {
        match code {
            1 => EntryGroup::Protocol,
            2 => EntryGroup::Event,
            3 | 5 => EntryGroup::Note,
            4 => EntryGroup::Idk,
            6 => EntryGroup::Pace,
            17 => EntryGroup::Rate,
            _ => EntryGroup::Unknown,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            EntryGroup::Protocol => "PROTOCOL",
            EntryGroup::Event => "EVENT",
            EntryGroup::Note => "NOTE",
            EntryGroup::Idk => "IDK",
            EntryGroup::Pace => "PACE",
            EntryGroup::Rate => "RATE",
            EntryGroup::Unknown => "UNKNOWN",
        }
    }
}

impl std::str::FromStr for EntryGroup {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_uppercase().as_str() {
            "PROTOCOL" => Ok(EntryGroup::Protocol),
            "EVENT" => Ok(EntryGroup::Event),
            "NOTE" => Ok(EntryGroup::Note),
            "IDK" => Ok(EntryGroup::Idk),
            "PACE" => Ok(EntryGroup::Pace),
            "RATE" => Ok(EntryGroup::Rate),
            "UNKNOWN" => Ok(EntryGroup::Unknown),
            _ => Err(format!("Unknown annotation group: '{s}'")),
        }
    }
}

impl std::fmt::Display for EntryGroup {
    fn fmt(
        &self,
        f: &mut std::fmt::Formatter<'_>,
    ) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Entry {
    /// Момент аннотации в UTC; `None` если метка вне диапазона chrono.
    pub fn datetime(&self) -> Option<DateTime<Utc>> {
        timestamp_to_datetime(self.timestamp)
    }
}

/// Переводит дробный Unix timestamp в `DateTime<Utc>`.
pub fn timestamp_to_datetime(ts: f64) -> Option<DateTime<Utc>> {
    if !ts.is_finite() {
        return None;
    }

    let secs = ts.floor();
    let nanos = ((ts - secs) * 1e9).round().min(999_999_999.0) as u32;

    DateTime::from_timestamp(secs as i64, nanos)
}
