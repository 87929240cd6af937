use std::{
    fs,
    path::{Path, PathBuf},
    time::Instant,
};

use log::{error, info, warn};
use wmlog_core::{mount_channels, read_entries, LogReader, ENTRIES_FILENAME};
use wmlog_types::{CustomMount, Entry, EntryGroup, WmError};

use crate::{
    create_planter, write_entries_csv, write_entries_sel, ConvertConfig, ConvertResult,
    EntriesFormat, EntryFilter, LeadsMode,
};

/// Сводный файл аннотаций исследования.
pub const SUMMARY_FILENAME: &str = "entries_summary.csv";

/// Пакетная конвертация каталога исследований (single-threaded).
pub struct ConvertSession {
    config: ConvertConfig,
    custom_mount: CustomMount,
    groups: Vec<EntryGroup>,
}

/// Итог сессии.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SessionSummary {
    pub duration_secs: f64,
    pub studies: u64,
    pub studies_failed: u64,
    pub files_converted: u64,
    pub files_failed: u64,
    pub rows_written: u64,
    pub entries_written: u64,
}

/// Результат конвертации одного лога.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DatalogOutcome {
    pub rows: u64,
    pub leads: usize,
    pub entries: usize,
}

impl ConvertSession {
    /// Создаёт сессию, проверяя конфигурацию.
    pub fn new(config: ConvertConfig) -> ConvertResult<Self> {
        config.validate()?;

        let custom_mount = config.custom_mount()?;
        let groups = config.entry_groups()?;

        Ok(Self {
            config,
            custom_mount,
            groups,
        })
    }

    pub fn config(&self) -> &ConvertConfig {
        &self.config
    }

    /// Конвертирует все исследования входного каталога.
    ///
    /// Ошибки отдельных логов и исследований пропускаются с записью в лог;
    /// фатальные ошибки прерывают сессию.
    pub fn run(&self) -> ConvertResult<SessionSummary> {
        let start = Instant::now();
        let paths = &self.config.paths;
        let mut summary = SessionSummary::default();

        fs::create_dir_all(&paths.output_folder)?;

        for study_path in list_studies(&paths.input_folder)? {
            let study_id = file_name(&study_path);

            if !paths.studies.is_empty() && !paths.studies.contains(&study_id) {
                continue;
            }

            summary.studies += 1;

            match self.convert_study(&study_path, &study_id, &mut summary) {
                Ok(()) => {}
                Err(e) if e.is_fatal() => return Err(e),
                Err(e) => {
                    error!("Study {study_id}: {e}");
                    summary.studies_failed += 1;
                }
            }
        }

        summary.duration_secs = start.elapsed().as_secs_f64();

        Ok(summary)
    }

    fn convert_study(
        &self,
        study_path: &Path,
        study_id: &str,
        summary: &mut SessionSummary,
    ) -> ConvertResult<()> {
        let cfg = &self.config;
        let out_dir = cfg.paths.output_folder.join(study_id);

        fs::create_dir_all(&out_dir)?;

        let entries = if cfg.entries.convert {
            self.load_entries(study_path)?
        } else {
            Vec::new()
        };

        if cfg.entries.summary_csv && !entries.is_empty() {
            let filter = EntryFilter::new()
                .with_fids(cfg.data.data_files.iter().cloned())
                .with_groups(self.groups.iter().copied());

            summary.entries_written +=
                write_entries_csv(out_dir.join(SUMMARY_FILENAME), &entries, &filter, None)? as u64;
        }

        info!("Converting study {study_id}");

        for datalog_path in list_datalogs(study_path)? {
            let datalog_id = file_stem(&datalog_path);

            if !cfg.data.data_files.is_empty() && !cfg.data.data_files.contains(&datalog_id) {
                continue;
            }

            match self.convert_datalog(&datalog_path, &datalog_id, &out_dir, &entries) {
                Ok(outcome) => {
                    info!(
                        "Converted {study_id}/{datalog_id}: {} rows × {} leads, {} entries",
                        outcome.rows, outcome.leads, outcome.entries
                    );
                    summary.files_converted += 1;
                    summary.rows_written += outcome.rows;
                    summary.entries_written += outcome.entries as u64;
                }
                Err(e) if e.is_fatal() => return Err(e),
                Err(e) => {
                    warn!("Skipping {study_id}/{datalog_id}: {e}");
                    summary.files_failed += 1;
                }
            }
        }

        Ok(())
    }

    /// Аннотации исследования; отсутствующий файл — пустой список.
    fn load_entries(
        &self,
        study_path: &Path,
    ) -> ConvertResult<Vec<Entry>> {
        let path = study_path.join(ENTRIES_FILENAME);

        match read_entries(&path, Some(self.config.global_settings.workmate_version.as_str())) {
            Ok(entries) => Ok(entries),
            Err(WmError::Io(e)) => {
                warn!("Could not read {path:?} ({e}). Annotation export will be skipped");
                Ok(Vec::new())
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Конвертирует один лог и его аннотации.
    pub fn convert_datalog(
        &self,
        path: &Path,
        datalog_id: &str,
        out_dir: &Path,
        entries: &[Entry],
    ) -> ConvertResult<DatalogOutcome> {
        let cfg = &self.config;
        let mut reader = LogReader::open(path, cfg.reader_options())?;
        let mut header = reader
            .header()
            .cloned()
            .ok_or_else(|| WmError::reader_state("header is not available"))?;

        header.channels.add_custom_mount(&self.custom_mount, false)?;

        let mut mappings = match cfg.data.leads {
            LeadsMode::Computed => header.channels.computed_mappings(),
            LeadsMode::Raw => header.channels.raw_mappings(),
        };

        if !cfg.data.channels.is_empty() {
            mappings.retain(|lead| cfg.data.channels.iter().any(|c| c == lead));
        }

        let column_names: Vec<String> = mappings.names().into_iter().map(String::from).collect();
        let out_path = out_dir.join(format!("{datalog_id}.{}", cfg.data.output_format));
        let mut planter = create_planter(
            cfg.data.output_format,
            &out_path,
            column_names.clone(),
            &cfg.data.delimiter,
        )?;

        for chunk in &mut reader {
            planter.write(&mount_channels(&chunk?, &mappings)?)?;
        }

        let rows = planter.finish()?;
        reader.close();

        let mut written = 0;

        if cfg.entries.convert && !entries.is_empty() {
            let filter = EntryFilter::new()
                .with_fids([datalog_id])
                .with_groups(self.groups.iter().copied());
            let ref_timestamp = header.timestamp as f64;

            written = match cfg.entries.output_format {
                EntriesFormat::Csv => write_entries_csv(
                    out_dir.join(format!("{datalog_id}_entries.csv")),
                    entries,
                    &filter,
                    Some(ref_timestamp),
                )?,
                EntriesFormat::Sel => write_entries_sel(
                    out_dir.join(format!("{datalog_id}.sel")),
                    entries,
                    &filter,
                    ref_timestamp,
                    header.amp.sampling_freq,
                    &column_names,
                )?,
            };
        }

        Ok(DatalogOutcome {
            rows,
            leads: column_names.len(),
            entries: written,
        })
    }
}

/// Имя файла лога с данными: начинается с цифры, расширение `.log`.
pub fn is_datalog_name(name: &str) -> bool {
    name.starts_with(|c: char| c.is_ascii_digit()) && name.ends_with(".log")
}

fn list_studies(input: &Path) -> ConvertResult<Vec<PathBuf>> {
    let mut studies: Vec<PathBuf> = fs::read_dir(input)?
        .filter_map(|e| e.ok().map(|e| e.path()))
        .filter(|p| p.is_dir())
        .collect();

    studies.sort();

    Ok(studies)
}

fn list_datalogs(study: &Path) -> ConvertResult<Vec<PathBuf>> {
    let mut logs: Vec<PathBuf> = fs::read_dir(study)?
        .filter_map(|e| e.ok().map(|e| e.path()))
        .filter(|p| p.is_file() && is_datalog_name(&file_name(p)))
        .collect();

    logs.sort();

    Ok(logs)
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default()
}

fn file_stem(path: &Path) -> String {
    path.file_stem()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default()
}

impl std::fmt::Display for SessionSummary {
    fn fmt(
        &self,
        f: &mut std::fmt::Formatter<'_>,
    ) -> std::fmt::Result {
        writeln!(f, "━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━")?;
        writeln!(f, "  Duration      : {:.1}s", self.duration_secs)?;
        writeln!(
            f,
            "  Studies       : {} ({} failed)",
            self.studies, self.studies_failed
        )?;
        writeln!(
            f,
            "  Datalogs      : {} ({} failed)",
            self.files_converted, self.files_failed
        )?;
        writeln!(f, "  Rows written  : {}", self.rows_written)?;
        writeln!(f, "  Entries       : {}", self.entries_written)?;
        write!(f, "━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━")
    }
}
