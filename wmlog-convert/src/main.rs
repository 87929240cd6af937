use std::path::PathBuf;

use clap::{ArgAction, Parser};
use log::{error, info, LevelFilter};
use wmlog_convert::{ConfigOverrides, ConvertConfig, ConvertSession, EntriesFormat, OutputFormat};

#[derive(Parser, Debug)]
#[command(
    name = "wmlog-convert",
    version = env!("CARGO_PKG_VERSION"),
    about = "Convert WorkMate study folders to CSV and SignalPlant selections",
    long_about = None,
)]
struct Cli {
    /// JSON-файл конфигурации (иначе WMLOG_CONFIG, иначе значения по умолчанию)
    #[arg(long)]
    config: Option<PathBuf>,
    /// Каталог с исследованиями
    #[arg(short, long)]
    input_folder: Option<PathBuf>,
    /// Каталог для результатов
    #[arg(short, long)]
    output_folder: Option<PathBuf>,
    /// Только указанные исследования (через запятую)
    #[arg(short, long, value_delimiter = ',')]
    studies: Option<Vec<String>>,
    /// Формат данных: csv
    #[arg(long)]
    format: Option<OutputFormat>,
    /// Выгружать аннотации: true, false
    #[arg(long, action = ArgAction::Set)]
    entries: Option<bool>,
    /// Формат аннотаций по файлу: csv, sel
    #[arg(long)]
    entries_format: Option<EntriesFormat>,
    /// Версия WorkMate: 4.1, 4.2, 4.3
    #[arg(long)]
    wm_version: Option<String>,
    /// Строк в чанке чтения (не меньше 1024)
    #[arg(long)]
    chunk_size: Option<usize>,
    /// Тихий режим (только ошибки)
    #[arg(short, long, conflicts_with = "verbose")]
    quiet: bool,
    /// Подробный вывод
    #[arg(short, long)]
    verbose: bool,
}

fn main() {
    let cli = Cli::parse();
    let level = if cli.quiet {
        LevelFilter::Error
    } else if cli.verbose {
        LevelFilter::Debug
    } else {
        LevelFilter::Info
    };

    env_logger::Builder::new()
        .filter_level(level)
        .format_target(false)
        .format_timestamp_secs()
        .init();

    let mut config = match ConvertConfig::resolve(cli.config.as_deref()) {
        Ok(c) => c,
        Err(e) => {
            error!("Config: {e}");
            std::process::exit(1);
        }
    };

    config.apply(&ConfigOverrides {
        input_folder: cli.input_folder,
        output_folder: cli.output_folder,
        studies: cli.studies,
        output_format: cli.format,
        entries: cli.entries,
        entries_format: cli.entries_format,
        workmate_version: cli.wm_version,
        chunk_size: cli.chunk_size,
    });

    let session = match ConvertSession::new(config) {
        Ok(s) => s,
        Err(e) => {
            error!("Config: {e}");
            std::process::exit(1);
        }
    };

    info!(
        "Converting {:?} → {:?}",
        session.config().paths.input_folder,
        session.config().paths.output_folder
    );

    match session.run() {
        Ok(summary) => info!("Done\n{summary}"),
        Err(e) => {
            error!("Conversion aborted: {e}");
            std::process::exit(1);
        }
    }
}
