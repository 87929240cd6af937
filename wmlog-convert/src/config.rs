use std::{
    env, fs,
    path::{Path, PathBuf},
};

use log::info;
use serde::{Deserialize, Serialize};
use wmlog_core::{parse_custom_mount, select, ReaderOptions, MIN_CHUNK_SAMPLES};
use wmlog_types::{CustomMount, EntryGroup};

use crate::{ConvertError, ConvertResult};

/// Переменная окружения с путём к файлу конфигурации.
pub const CONFIG_ENV: &str = "WMLOG_CONFIG";

/// Какие отведения выгружать.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LeadsMode {
    /// Схема монтажа прибора (биполярные отведения вычисляются)
    Computed,
    /// Каждый канал отдельной колонкой
    Raw,
}

/// Формат выгрузки данных.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    Csv,
}

/// Формат выгрузки аннотаций по файлу.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntriesFormat {
    Csv,
    /// Текстовые выделения SignalPlant
    Sel,
}

/// Полная конфигурация пакетной конвертации.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct ConvertConfig {
    pub global_settings: GlobalSettings,
    pub paths: PathsConfig,
    pub data: DataConfig,
    pub entries: EntriesConfig,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GlobalSettings {
    /// Версия WorkMate: 4.1, 4.2, 4.3
    pub workmate_version: String,
    pub processing: Processing,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Processing {
    /// Строк (выборок) на чанк
    pub chunk_size: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PathsConfig {
    /// Каталог с каталогами исследований
    pub input_folder: PathBuf,
    pub output_folder: PathBuf,
    /// Исследования для выгрузки (пусто = все)
    pub studies: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DataConfig {
    pub output_format: OutputFormat,
    /// Идентификаторы логов для выгрузки (пусто = все)
    pub data_files: Vec<String>,
    /// Отведения для выгрузки (пусто = все)
    pub channels: Vec<String>,
    pub leads: LeadsMode,
    /// Пользовательские отведения `{"lead": [i] | [i, j]}`
    pub custom_channels: serde_json::Value,
    pub delimiter: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EntriesConfig {
    /// Выгружать аннотации
    pub convert: bool,
    pub output_format: EntriesFormat,
    /// Сводный `entries_summary.csv` на исследование
    pub summary_csv: bool,
    /// Группы аннотаций (пусто = все)
    pub filter_annotation_type: Vec<String>,
}

/// Значения из командной строки, перекрывающие файл конфигурации.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConfigOverrides {
    pub input_folder: Option<PathBuf>,
    pub output_folder: Option<PathBuf>,
    pub studies: Option<Vec<String>>,
    pub output_format: Option<OutputFormat>,
    pub entries: Option<bool>,
    pub entries_format: Option<EntriesFormat>,
    pub workmate_version: Option<String>,
    pub chunk_size: Option<usize>,
}

////////////////////////////////////////////////////////////////////////////////
// Собственные методы
////////////////////////////////////////////////////////////////////////////////

impl ConvertConfig {
    /// Читает конфигурацию из JSON-файла.
    pub fn load<P: AsRef<Path>>(path: P) -> ConvertResult<Self> {
        let text = fs::read_to_string(path)?;

        Ok(serde_json::from_str(&text)?)
    }

    /// Путь из `--config`, иначе из `WMLOG_CONFIG`, иначе значения по
    /// умолчанию.
    pub fn resolve(cli_path: Option<&Path>) -> ConvertResult<Self> {
        let path = cli_path
            .map(Path::to_path_buf)
            .or_else(|| env::var_os(CONFIG_ENV).map(PathBuf::from));

        match path {
            Some(path) => {
                info!("Loading config {path:?}");
                Self::load(&path)
            }
            None => Ok(Self::default()),
        }
    }

    /// Применяет значения из командной строки.
    pub fn apply(
        &mut self,
        overrides: &ConfigOverrides,
    ) {
        let o = overrides.clone();

        if let Some(v) = o.input_folder {
            self.paths.input_folder = v;
        }
        if let Some(v) = o.output_folder {
            self.paths.output_folder = v;
        }
        if let Some(v) = o.studies {
            self.paths.studies = v;
        }
        if let Some(v) = o.output_format {
            self.data.output_format = v;
        }
        if let Some(v) = o.entries {
            self.entries.convert = v;
        }
        if let Some(v) = o.entries_format {
            self.entries.output_format = v;
        }
        if let Some(v) = o.workmate_version {
            self.global_settings.workmate_version = v;
        }
        if let Some(v) = o.chunk_size {
            self.global_settings.processing.chunk_size = v;
        }
    }

    /// Проверяет значения до начала конвертации.
    pub fn validate(&self) -> ConvertResult<()> {
        select(Some(self.global_settings.workmate_version.as_str()))?;

        if self.global_settings.processing.chunk_size < MIN_CHUNK_SAMPLES {
            return Err(ConvertError::config(format!(
                "chunk_size must be >= {MIN_CHUNK_SAMPLES}, got {}",
                self.global_settings.processing.chunk_size
            )));
        }

        if self.data.delimiter.is_empty() {
            return Err(ConvertError::config("delimiter must not be empty"));
        }

        self.custom_mount()?;
        self.entry_groups()?;

        Ok(())
    }

    /// Параметры чтения для каждого лога.
    pub fn reader_options(&self) -> ReaderOptions {
        ReaderOptions::default()
            .with_version(self.global_settings.workmate_version.clone())
            .with_chunk_samples(self.global_settings.processing.chunk_size)
    }

    pub fn custom_mount(&self) -> ConvertResult<CustomMount> {
        Ok(parse_custom_mount(&self.data.custom_channels)?)
    }

    /// Группы аннотаций из `filter_annotation_type`.
    pub fn entry_groups(&self) -> ConvertResult<Vec<EntryGroup>> {
        self.entries
            .filter_annotation_type
            .iter()
            .map(|s| s.parse::<EntryGroup>().map_err(ConvertError::Config))
            .collect()
    }
}

////////////////////////////////////////////////////////////////////////////////
// Общие реализации трейтов
////////////////////////////////////////////////////////////////////////////////

impl Default for GlobalSettings {
    fn default() -> Self {
        Self {
            workmate_version: "4.3".to_string(),
            processing: Processing::default(),
        }
    }
}

impl Default for Processing {
    fn default() -> Self {
        Self {
            chunk_size: MIN_CHUNK_SAMPLES,
        }
    }
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            input_folder: PathBuf::from("."),
            output_folder: PathBuf::from("export"),
            studies: Vec::new(),
        }
    }
}

impl Default for DataConfig {
    fn default() -> Self {
        Self {
            output_format: OutputFormat::Csv,
            data_files: Vec::new(),
            channels: Vec::new(),
            leads: LeadsMode::Computed,
            custom_channels: serde_json::Value::Null,
            delimiter: ",".to_string(),
        }
    }
}

impl Default for EntriesConfig {
    fn default() -> Self {
        Self {
            convert: true,
            output_format: EntriesFormat::Csv,
            summary_csv: true,
            filter_annotation_type: Vec::new(),
        }
    }
}

impl std::fmt::Display for OutputFormat {
    fn fmt(
        &self,
        f: &mut std::fmt::Formatter<'_>,
    ) -> std::fmt::Result {
        match self {
            OutputFormat::Csv => write!(f, "csv"),
        }
    }
}

impl std::str::FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "csv" => Ok(OutputFormat::Csv),
            _ => Err(format!("Unknown output format: '{s}'. Use: csv")),
        }
    }
}

impl std::fmt::Display for EntriesFormat {
    fn fmt(
        &self,
        f: &mut std::fmt::Formatter<'_>,
    ) -> std::fmt::Result {
        match self {
            EntriesFormat::Csv => write!(f, "csv"),
            EntriesFormat::Sel => write!(f, "sel"),
        }
    }
}

impl std::str::FromStr for EntriesFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "csv" => Ok(EntriesFormat::Csv),
            "sel" => Ok(EntriesFormat::Sel),
            _ => Err(format!("Unknown entries format: '{s}'. Use: csv, sel")),
        }
    }
}

////////////////////////////////////////////////////////////////////////////////
// Тесты
////////////////////////////////////////////////////////////////////////////////
