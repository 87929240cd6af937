use thiserror::Error;
use wmlog_types::{MountError, WmError};

pub type ConvertResult<T> = std::result::Result<T, ConvertError>;

#[derive(Debug, Error)]
pub enum ConvertError {
    /// Ошибка декодера WorkMate
    #[error("WorkMate error: {0}")]
    Wm(#[from] WmError),

    /// Некорректная пользовательская схема отведений
    #[error("Mount error: {0}")]
    Mount(#[from] MountError),

    /// Ошибка чтения/записи файлов
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Файл конфигурации не разбирается
    #[error("Config parse error: {0}")]
    Json(#[from] serde_json::Error),

    /// Недопустимое значение конфигурации
    #[error("Config error: {0}")]
    Config(String),

    /// Число колонок чанка не совпадает с заголовком выходного файла
    #[error("Column count mismatch: expected {expected}, got {found}")]
    ColumnMismatch { expected: usize, found: usize },
}

impl ConvertError {
    pub fn config<S: Into<String>>(s: S) -> Self {
        Self::Config(s.into())
    }

    /// Ошибки, после которых процесс завершается с кодом 1.
    pub fn is_fatal(&self) -> bool {
        match self {
            ConvertError::Wm(e) => e.is_fatal(),
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fatal_only_for_corrupt_entries() {
        let corrupt: ConvertError = WmError::CorruptEntriesLength {
            len: 100,
            header: 36,
            record: 220,
        }
        .into();

        assert!(corrupt.is_fatal());
        assert!(!ConvertError::config("bad leads").is_fatal());
        assert!(!ConvertError::from(WmError::malformed_header("short")).is_fatal());
    }
}
