//! Пример: чтение лога WorkMate через LogReader
//!
//! Демонстрирует:
//! - открытие файла и декодирование заголовка
//! - вычисление отведений схемы монтажа по каждому чанку
//! - итоговую статистику чтения

use std::env;

use wmlog_core::{mount_channels, LogReader, ReaderOptions};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let input_path = env::args()
        .nth(1)
        .unwrap_or_else(|| "00000001.log".to_string());
    let version = env::args().nth(2);

    let mut opts = ReaderOptions::default();
    opts.version = version;

    let mut reader = LogReader::open(&input_path, opts)?;
    let Some(header) = reader.header().cloned() else {
        return Err("header is not available".into());
    };

    println!("✓ Header decoded");
    println!("  Timestamp     : {}", header.timestamp);
    println!("  Columns       : {}", header.num_channels);
    println!("  Channels      : {}", header.channels.len());
    println!("  Resolution    : {}", header.amp.resolution);
    println!("  Sampling freq : {} Hz", header.amp.sampling_freq);

    let mappings = header.channels.computed_mappings();
    println!("  Leads         : {}", mappings.names().join(", "));

    for chunk in &mut reader {
        let mounted = mount_channels(&chunk?, &mappings)?;
        println!("  chunk {:?}", mounted.shape());
    }

    println!("\n✓ Read complete");
    println!("  Chunks : {}", reader.stats().chunks);
    println!("  Rows   : {}", reader.stats().rows);

    Ok(())
}
