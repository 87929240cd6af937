use thiserror::Error;

/// Результат для операций wmlog
pub type WmResult<T> = std::result::Result<T, WmError>;

/// Типы ошибок декодера WorkMate.
#[derive(Debug, Error)]
pub enum WmError {
    /// Строка версии не относится ни к одному семейству схем
    #[error("Unsupported version: '{0}' (expected one of 4.1, 4.2, 4.3)")]
    UnsupportedVersion(String),

    /// Заголовок короче схемы или содержит недопустимые значения
    #[error("Malformed header: {0}")]
    MalformedHeader(String),

    /// У канала нет ни одной пригодной ссылки на колонку
    #[error("Invalid reference for channel '{0}'")]
    InvalidReference(String),

    /// Некорректная пользовательская схема отведений
    #[error("Invalid mount: {0}")]
    InvalidMount(#[from] MountError),

    /// Длина entries.log не кратна размеру записи
    #[error(
        "Corrupt entries length: {len} bytes, header {header} + k × {record}. Check byte schema version"
    )]
    CorruptEntriesLength {
        len: usize,
        header: usize,
        record: usize,
    },

    /// Метка времени в заголовке entries.log не декодируется в дату
    #[error("Invalid timestamp: {0}")]
    InvalidTimestamp(u64),

    /// Недопустимый параметр чтения (размер чанка, границы)
    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    /// Операция недопустима в текущем состоянии читателя
    #[error("Reader state: {0}")]
    ReaderState(String),

    /// Ошибки ввода/вывода (автоконвертируются из std::io::Error)
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Ошибки проверки пользовательских отведений.
///
/// Три вида повторяют классы исключений исходной утилиты: индекс вне
/// диапазона, нецелый индекс и слишком много источников для одного
/// отведения.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MountError {
    #[error("lead '{lead}': index {index} out of bounds (max {max})")]
    IndexOutOfBounds {
        lead: String,
        index: usize,
        max: usize,
    },

    #[error("lead '{lead}': source index must be a non-negative integer, got {found}")]
    NotAnInteger { lead: String, found: String },

    #[error("lead '{lead}': expected 1 or 2 sources, got {count}")]
    InvalidArity { lead: String, count: usize },

    #[error("custom mount must be an object of lead → [indices], got {0}")]
    NotAMapping(String),

    #[error("column {column} is outside of a {columns}-column chunk")]
    ColumnOutOfRange { column: usize, columns: usize },

    #[error("cannot join a {found}-column chunk to a {expected}-column chunk")]
    ColumnCountMismatch { expected: usize, found: usize },
}

impl WmError {
    /// Удобные конструкторы
    pub fn malformed_header<S: Into<String>>(s: S) -> Self {
        Self::MalformedHeader(s.into())
    }

    pub fn invalid_parameter<S: Into<String>>(s: S) -> Self {
        Self::InvalidParameter(s.into())
    }

    pub fn reader_state<S: Into<String>>(s: S) -> Self {
        Self::ReaderState(s.into())
    }

    /// Ошибки, после которых пакетная обработка не продолжается.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            WmError::CorruptEntriesLength { .. } | WmError::InvalidTimestamp(_)
        )
    }
}
