//! Запись результатов: CSV с отсчётами и файлы аннотаций (CSV, `.sel`).

use std::{
    collections::HashSet,
    fs::{self, File},
    io::{BufWriter, Write},
    path::Path,
};

use wmlog_types::{timestamp_to_datetime, Entry, EntryGroup, SampleChunk};

use crate::{ConvertError, ConvertResult, OutputFormat};

const MICROS_PER_SEC: i64 = 1_000_000;
const MICROS_PER_DAY: i64 = 86_400 * MICROS_PER_SEC;

/// Формат абсолютного времени аннотации.
const ABSOLUTE_TIME_FMT: &str = "%Y-%m-%d_%H:%M:%S";

/// Версия SignalPlant в заголовке `.sel`.
const SIGNALPLANT_VERSION: &str = "1.2.7.3";

/// Выходной файл отведений одного формата.
pub trait DataPlanter {
    /// Дописывает строки чанка.
    fn write(
        &mut self,
        chunk: &SampleChunk,
    ) -> ConvertResult<()>;

    fn rows_written(&self) -> u64;

    /// Сбрасывает буферы и закрывает файл, возвращает число строк.
    fn finish(self: Box<Self>) -> ConvertResult<u64>;
}

/// Создаёт planter для `format` по пути `path`.
pub fn create_planter<P: AsRef<Path>>(
    format: OutputFormat,
    path: P,
    column_names: Vec<String>,
    delimiter: &str,
) -> ConvertResult<Box<dyn DataPlanter>> {
    match format {
        OutputFormat::Csv => Ok(Box::new(CsvPlanter::create(path, column_names, delimiter)?)),
    }
}

/// Построчная запись чанков в CSV.
///
/// Первая строка — имена колонок, далее целые значения через разделитель.
pub struct CsvPlanter<W: Write> {
    writer: BufWriter<W>,
    column_names: Vec<String>,
    delimiter: String,
    header_written: bool,
    rows_written: u64,
}

/// Отбор аннотаций по идентификаторам логов и группам.
///
/// Пустое множество критерия пропускает всё.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EntryFilter {
    fids: HashSet<String>,
    groups: HashSet<EntryGroup>,
}

impl<W: Write> DataPlanter for CsvPlanter<W> {
    fn write(
        &mut self,
        chunk: &SampleChunk,
    ) -> ConvertResult<()> {
        CsvPlanter::write(self, chunk)
    }

    fn rows_written(&self) -> u64 {
        CsvPlanter::rows_written(self)
    }

    fn finish(self: Box<Self>) -> ConvertResult<u64> {
        (*self).finish()
    }
}

impl CsvPlanter<File> {
    /// Создаёт (перезаписывает) файл `path`.
    pub fn create<P: AsRef<Path>>(
        path: P,
        column_names: Vec<String>,
        delimiter: &str,
    ) -> ConvertResult<Self> {
        Ok(Self::new(File::create(path)?, column_names, delimiter))
    }
}

impl<W: Write> CsvPlanter<W> {
    /// Пустой `column_names` — имена `0, 1, 2, …` по первому чанку.
    pub fn new(
        inner: W,
        column_names: Vec<String>,
        delimiter: &str,
    ) -> Self {
        Self {
            writer: BufWriter::new(inner),
            column_names,
            delimiter: delimiter.to_string(),
            header_written: false,
            rows_written: 0,
        }
    }

    /// Дописывает строки чанка.
    pub fn write(
        &mut self,
        chunk: &SampleChunk,
    ) -> ConvertResult<()> {
        if self.column_names.is_empty() {
            self.column_names = (0..chunk.columns()).map(|i| i.to_string()).collect();
        }

        if chunk.columns() != self.column_names.len() {
            return Err(ConvertError::ColumnMismatch {
                expected: self.column_names.len(),
                found: chunk.columns(),
            });
        }

        self.write_header()?;

        for row in chunk.rows_iter() {
            let line = row
                .iter()
                .map(|v| v.to_string())
                .collect::<Vec<_>>()
                .join(&self.delimiter);

            writeln!(self.writer, "{line}")?;
        }

        self.rows_written += chunk.rows() as u64;

        Ok(())
    }

    pub fn rows_written(&self) -> u64 {
        self.rows_written
    }

    /// Сбрасывает буфер. Файл без данных получает только строку заголовка.
    pub fn finish(mut self) -> ConvertResult<u64> {
        if !self.column_names.is_empty() {
            self.write_header()?;
        }

        self.writer.flush()?;

        Ok(self.rows_written)
    }

    fn write_header(&mut self) -> ConvertResult<()> {
        if !self.header_written {
            writeln!(self.writer, "{}", self.column_names.join(&self.delimiter))?;
            self.header_written = true;
        }

        Ok(())
    }
}

impl EntryFilter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_fids<I, S>(
        mut self,
        fids: I,
    ) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.fids = fids.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_groups<I: IntoIterator<Item = EntryGroup>>(
        mut self,
        groups: I,
    ) -> Self {
        self.groups = groups.into_iter().collect();
        self
    }

    pub fn matches(
        &self,
        entry: &Entry,
    ) -> bool {
        (self.fids.is_empty() || self.fids.contains(&entry.fid))
            && (self.groups.is_empty() || self.groups.contains(&entry.group))
    }

    /// Аннотации, прошедшие отбор, в исходном порядке.
    pub fn apply<'a>(
        &self,
        entries: &'a [Entry],
    ) -> Vec<&'a Entry> {
        entries.iter().filter(|e| self.matches(e)).collect()
    }
}

/// Текст CSV с аннотациями.
///
/// Без `ref_timestamp` время абсолютное (UTC, `Y-m-d_H:M:S`), иначе —
/// смещение от начала записи в виде `H:MM:SS[.ffffff]`. Разделитель
/// удаляется из текста аннотации.
pub fn entries_to_csv(
    entries: &[&Entry],
    ref_timestamp: Option<f64>,
    sep: &str,
) -> String {
    let time_col = match ref_timestamp {
        None => "Time(Y-m-d_H:M:S)",
        Some(_) => "Time(H:M:S)",
    };
    let mut out = format!("Group{sep}FileId{sep}{time_col}{sep}Annotation\n");

    for entry in entries {
        let time = match ref_timestamp {
            None => format_absolute(entry.timestamp),
            Some(reference) => format_timedelta(to_micros(entry.timestamp) - to_micros(reference)),
        };
        let row = [
            entry.group.as_str().to_string(),
            entry.fid.clone(),
            time,
            entry.message.replace(sep, ""),
        ]
        .join(sep);

        out.push_str(row.trim_end_matches(sep));
        out.push('\n');
    }

    out
}

/// Текст файла выделений SignalPlant (`.sel`).
///
/// Начальная выборка — секундная часть смещения от начала записи,
/// умноженная на частоту дискретизации; все метки привязаны к первому
/// каналу.
pub fn entries_to_sel(
    entries: &[&Entry],
    ref_timestamp: f64,
    sampling_freq: u16,
    channel_names: &[String],
    file_name: &str,
) -> String {
    let first_channel = channel_names.first().map(String::as_str).unwrap_or("");
    let channels: String = channel_names.iter().map(|n| format!("%{n}\t1\n")).collect();
    let mut data = String::new();

    for (idx, entry) in entries.iter().enumerate() {
        let delta = to_micros(entry.timestamp) - to_micros(ref_timestamp);
        let seconds = delta.rem_euclid(MICROS_PER_DAY) / MICROS_PER_SEC;
        let sample = seconds * sampling_freq as i64;

        data.push_str(&format!(
            "{}\t{sample}\t{sample}\t{}\t1\t0\t{first_channel}\t{}\n",
            idx + 1,
            entry.group,
            entry.message
        ));
    }

    format!(
        "%SignalPlant ver.:{SIGNALPLANT_VERSION}\n\
         %Selection export from file:\n\
         %{file_name}.csv\n\
         %SAMPLING_FREQ [Hz]:{sampling_freq}\n\
         %CHANNELS_VALIDITY-----------------------\n\
         {channels}\
         %----------------------------------------\n\
         %Structure:\n\
         %Index[-], Start[sample], End[sample], Group[-], Validity[-], Channel Index[-], Channel name[string], Info[string]\n\
         %Divided by: ASCII char no. 9\n\
         %DATA------------------------------------\n\
         {data}\n"
    )
}

/// Записывает CSV аннотаций, возвращает число записанных строк.
pub fn write_entries_csv<P: AsRef<Path>>(
    path: P,
    entries: &[Entry],
    filter: &EntryFilter,
    ref_timestamp: Option<f64>,
) -> ConvertResult<usize> {
    let selected = filter.apply(entries);

    fs::write(path, entries_to_csv(&selected, ref_timestamp, ","))?;

    Ok(selected.len())
}

/// Записывает `.sel`, возвращает число записанных меток.
pub fn write_entries_sel<P: AsRef<Path>>(
    path: P,
    entries: &[Entry],
    filter: &EntryFilter,
    ref_timestamp: f64,
    sampling_freq: u16,
    channel_names: &[String],
) -> ConvertResult<usize> {
    let path = path.as_ref();
    let file_name = path
        .file_stem()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let selected = filter.apply(entries);

    fs::write(
        path,
        entries_to_sel(&selected, ref_timestamp, sampling_freq, channel_names, &file_name),
    )?;

    Ok(selected.len())
}

/// Длительность в виде `[D day[s], ]H:MM:SS[.ffffff]`.
///
/// Отрицательные значения нормализуются как `-1 day, 23:59:59`.
pub fn format_timedelta(micros: i64) -> String {
    let days = micros.div_euclid(MICROS_PER_DAY);
    let rem = micros.rem_euclid(MICROS_PER_DAY);
    let secs = rem / MICROS_PER_SEC;
    let frac = rem % MICROS_PER_SEC;

    let mut out = String::new();

    if days != 0 {
        let plural = if days.abs() == 1 { "" } else { "s" };
        out.push_str(&format!("{days} day{plural}, "));
    }

    out.push_str(&format!(
        "{}:{:02}:{:02}",
        secs / 3600,
        secs % 3600 / 60,
        secs % 60
    ));

    if frac != 0 {
        out.push_str(&format!(".{frac:06}"));
    }

    out
}

fn format_absolute(ts: f64) -> String {
    match timestamp_to_datetime(ts) {
        Some(dt) => dt.format(ABSOLUTE_TIME_FMT).to_string(),
        None => ts.to_string(),
    }
}

fn to_micros(ts: f64) -> i64 {
    (ts * MICROS_PER_SEC as f64).round() as i64
}
