//! Потоковое чтение блока отсчётов
//!
//! [`LogReader`] — сессия чтения одного файла лога. Заголовок декодируется
//! при открытии, затем блок данных отдаётся чанками по `chunk_samples` строк
//! (итератор) или целиком одним вызовом [`LogReader::read`].
//!
//! ```text
//! Unopened ──open──▶ Open ──stop/EOF/ошибка──▶ Exhausted
//!                     │
//!                     └──────close───────────▶ Closed
//! ```
//!
//! Исчерпание и ошибка чтения закрывают сессию так же, как `close`:
//! дескриптор файла освобождается, ссылка на заголовок сбрасывается.
//! Заголовок, нужный после чтения, следует клонировать заранее.

use std::{
    fs::File,
    io::{BufReader, Read, Seek, SeekFrom},
    path::{Path, PathBuf},
};

use byteorder::{ByteOrder, LittleEndian};
use log::{debug, info};
use wmlog_types::{Header, SampleChunk};

use crate::{
    error::{WmError, WmResult},
    header::read_header_from,
    schema::{select, Schema, MIN_CHUNK_SAMPLES},
};

/// Верхняя граница буфера `BufReader`, байт.
const MAX_BUFFER_BYTES: u64 = 8 * 1024 * 1024;

/// Параметры сессии чтения.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReaderOptions {
    /// Версия WorkMate (`None` — семейство x64)
    pub version: Option<String>,
    /// Строк (выборок) на один чанк, не меньше [`MIN_CHUNK_SAMPLES`]
    pub chunk_samples: usize,
    /// Первая читаемая строка
    pub start: u64,
    /// Строка, на которой чтение останавливается (не включительно)
    pub end: Option<u64>,
}

/// Состояние сессии чтения.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReaderState {
    Unopened,
    Open,
    Exhausted,
    Closed,
}

/// Статистика, накопленная [`LogReader`] в процессе чтения.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ReadStats {
    pub chunks: u64,
    pub rows: u64,
    pub bytes: u64,
}

/// Сессия чтения файла лога WorkMate.
pub struct LogReader {
    path: PathBuf,
    schema: &'static Schema,
    options: ReaderOptions,
    state: ReaderState,
    file: Option<BufReader<File>>,
    header: Option<Header>,
    row_bytes: u64,
    position: u64,
    stop: u64,
    stats: ReadStats,
}

impl Default for ReaderOptions {
    fn default() -> Self {
        Self {
            version: None,
            chunk_samples: MIN_CHUNK_SAMPLES,
            start: 0,
            end: None,
        }
    }
}

impl ReaderOptions {
    pub fn with_version<S: Into<String>>(
        mut self,
        version: S,
    ) -> Self {
        self.version = Some(version.into());
        self
    }

    pub fn with_chunk_samples(
        mut self,
        chunk_samples: usize,
    ) -> Self {
        self.chunk_samples = chunk_samples;
        self
    }

    /// Диапазон строк `[start, end)`.
    pub fn with_range(
        mut self,
        start: u64,
        end: Option<u64>,
    ) -> Self {
        self.start = start;
        self.end = end;
        self
    }

    pub fn validate(&self) -> WmResult<()> {
        if self.chunk_samples < MIN_CHUNK_SAMPLES {
            return Err(WmError::invalid_parameter(format!(
                "chunk size {} is below the minimum of {MIN_CHUNK_SAMPLES} samples",
                self.chunk_samples
            )));
        }

        if let Some(end) = self.end {
            if end < self.start {
                return Err(WmError::invalid_parameter(format!(
                    "end sample {end} precedes start sample {}",
                    self.start
                )));
            }
        }

        Ok(())
    }
}

impl LogReader {
    /// Создаёт сессию в состоянии `Unopened`: проверяет параметры и версию,
    /// файл не трогает.
    pub fn new<P: AsRef<Path>>(
        path: P,
        options: ReaderOptions,
    ) -> WmResult<Self> {
        options.validate()?;

        let schema = select(options.version.as_deref())?;

        Ok(Self {
            path: path.as_ref().to_path_buf(),
            schema,
            options,
            state: ReaderState::Unopened,
            file: None,
            header: None,
            row_bytes: 0,
            position: 0,
            stop: 0,
            stats: ReadStats::default(),
        })
    }

    /// Создаёт сессию и сразу открывает файл.
    pub fn open<P: AsRef<Path>>(
        path: P,
        options: ReaderOptions,
    ) -> WmResult<Self> {
        let mut reader = Self::new(path, options)?;

        reader.start()?;

        Ok(reader)
    }

    /// Открывает файл, декодирует заголовок и позиционируется на первую
    /// строку диапазона.
    pub fn start(&mut self) -> WmResult<()> {
        if self.state != ReaderState::Unopened {
            return Err(WmError::reader_state(format!(
                "cannot open a session in state {:?}",
                self.state
            )));
        }

        let mut file = File::open(&self.path)?;
        let file_len = file.metadata()?.len();
        let header = read_header_from(&mut file, self.schema)?;

        if header.num_channels == 0 {
            return Err(WmError::malformed_header("channel count is zero"));
        }

        let row_bytes = header.num_channels as u64 * self.schema.log.sample_size as u64;
        let address = header.datablock_address;
        let start = address.saturating_add(self.options.start.saturating_mul(row_bytes));
        let end = self
            .options
            .end
            .map(|e| address.saturating_add(e.saturating_mul(row_bytes)))
            .unwrap_or(u64::MAX)
            .min(file_len);

        // только целые строки
        let stop = if end >= address {
            address + (end - address) / row_bytes * row_bytes
        } else {
            end
        };

        // пустой диапазон: файл не нужен, первый pull исчерпает сессию
        let file = if start < stop {
            file.seek(SeekFrom::Start(start))?;

            let capacity = (self.options.chunk_samples as u64)
                .saturating_mul(row_bytes)
                .min(stop - start)
                .min(MAX_BUFFER_BYTES);

            Some(BufReader::with_capacity(capacity as usize, file))
        } else {
            debug!("{:?}: empty range {start}..{stop}", self.path);
            None
        };

        info!(
            "Opened {:?}: {} columns, {} channels, fs {} Hz, data at {address:#x}",
            self.path,
            header.num_channels,
            header.channels.len(),
            header.amp.sampling_freq,
        );

        self.header = Some(header);
        self.row_bytes = row_bytes;
        self.position = start;
        self.stop = stop;
        self.file = file;
        self.state = ReaderState::Open;

        Ok(())
    }

    /// Следующий чанк или `None` после исчерпания.
    pub fn next_chunk(&mut self) -> Option<WmResult<SampleChunk>> {
        match self.state {
            ReaderState::Open => {}
            ReaderState::Unopened => {
                return Some(Err(WmError::reader_state("session is not opened")))
            }
            ReaderState::Exhausted | ReaderState::Closed => return None,
        }

        let chunk_bytes = (self.options.chunk_samples as u64).saturating_mul(self.row_bytes);

        match self.pull(chunk_bytes) {
            Ok(Some(chunk)) => Some(Ok(chunk)),
            Ok(None) => None,
            Err(e) => Some(Err(e)),
        }
    }

    /// Читает весь оставшийся диапазон одним чанком.
    ///
    /// `Ok(None)`, если читать больше нечего.
    pub fn read(&mut self) -> WmResult<Option<SampleChunk>> {
        match self.state {
            ReaderState::Open => self.pull(u64::MAX),
            ReaderState::Unopened => Err(WmError::reader_state("session is not opened")),
            ReaderState::Exhausted | ReaderState::Closed => Ok(None),
        }
    }

    /// Освобождает файл и сбрасывает заголовок. Повторный вызов безопасен.
    pub fn close(&mut self) {
        self.file = None;
        self.header = None;
        self.state = ReaderState::Closed;
    }

    /// Заголовок открытого файла (`None` до открытия, после исчерпания и
    /// после `close`).
    pub fn header(&self) -> Option<&Header> {
        self.header.as_ref()
    }

    pub fn state(&self) -> ReaderState {
        self.state
    }

    pub fn schema(&self) -> &'static Schema {
        self.schema
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Накопленная статистика чтения.
    pub fn stats(&self) -> &ReadStats {
        &self.stats
    }

    fn pull(
        &mut self,
        max_bytes: u64,
    ) -> WmResult<Option<SampleChunk>> {
        if self.position >= self.stop {
            self.exhaust();
            return Ok(None);
        }

        let want = max_bytes.min(self.stop - self.position);

        let bytes = match self.read_span(want) {
            Ok(bytes) => bytes,
            Err(e) => {
                self.exhaust();
                return Err(e);
            }
        };

        if bytes.is_empty() {
            self.exhaust();
            return Ok(None);
        }

        self.position += bytes.len() as u64;

        let (columns, resolution) = match &self.header {
            Some(h) => (h.num_channels as usize, h.amp.resolution),
            None => return Err(WmError::reader_state("header is not available")),
        };

        let chunk = decode_samples(&bytes, self.schema.log.sample_size, resolution, columns);

        if chunk.is_empty() {
            // усечённый хвост короче одной строки
            self.exhaust();
            return Ok(None);
        }

        self.stats.chunks += 1;
        self.stats.rows += chunk.rows() as u64;
        self.stats.bytes += bytes.len() as u64;

        if self.position >= self.stop {
            self.exhaust();
        }

        Ok(Some(chunk))
    }

    fn read_span(
        &mut self,
        len: u64,
    ) -> WmResult<Vec<u8>> {
        let file = self
            .file
            .as_mut()
            .ok_or_else(|| WmError::reader_state("file handle is released"))?;
        let mut buf = Vec::with_capacity(len.min(MAX_BUFFER_BYTES) as usize);

        file.by_ref().take(len).read_to_end(&mut buf)?;

        Ok(buf)
    }

    fn exhaust(&mut self) {
        if self.state == ReaderState::Open {
            debug!(
                "{:?}: exhausted after {} rows in {} chunks",
                self.path, self.stats.rows, self.stats.chunks
            );
        }

        self.file = None;
        self.header = None;
        self.state = ReaderState::Exhausted;
    }
}

impl Iterator for LogReader {
    type Item = WmResult<SampleChunk>;

    fn next(&mut self) -> Option<Self::Item> {
        self.next_chunk()
    }
}

impl Drop for LogReader {
    fn drop(&mut self) {
        self.file.take();
    }
}

/// Convenience: открывает файл и читает весь диапазон.
///
/// Возвращает заголовок и матрицу отсчётов (пустую, если данных нет).
pub fn read_log<P: AsRef<Path>>(
    path: P,
    options: ReaderOptions,
) -> WmResult<(Header, SampleChunk)> {
    let mut reader = LogReader::open(path, options)?;
    let header = reader
        .header()
        .cloned()
        .ok_or_else(|| WmError::reader_state("header is not available"))?;
    let chunk = reader.read()?.unwrap_or_default();

    reader.close();

    Ok((header, chunk))
}

/// Декодирует сырые байты блока данных в матрицу `rows × columns`.
///
/// Отсчёт — знаковое LE целое ширины `sample_size`; после коррекции
/// [`twos_complement_correct`] умножается на `resolution`.
pub fn decode_samples(
    bytes: &[u8],
    sample_size: usize,
    resolution: u16,
    columns: usize,
) -> SampleChunk {
    let resolution = resolution as i64;
    let values = bytes
        .chunks_exact(sample_size)
        .map(|b| twos_complement_correct(LittleEndian::read_int(b, sample_size), sample_size) * resolution)
        .collect();

    SampleChunk::from_flat(values, columns)
}

/// Коррекция прибора: `v ≥ (2^(8n) − 1) div 2 − 1` ⇒ `v − (2^(8n) − 1)`.
///
/// Считается точно в `i64`; ширина отсчёта не больше 7 байт.
pub fn twos_complement_correct(
    value: i64,
    sample_size: usize,
) -> i64 {
    debug_assert!((1..=7).contains(&sample_size));

    let twos = (1i64 << (8 * sample_size)) - 1;
    let threshold = twos / 2 - 1;

    if value >= threshold {
        value - twos
    } else {
        value
    }
}
