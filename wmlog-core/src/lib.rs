//! Библиотека декодера логов WorkMate
//!
//! Чтение бинарных файлов электрофизиологической системы WorkMate: заголовок
//! лога с таблицей каналов, блок отсчётов (потоково, чанками), аннотации
//! `entries.log` и идентификатор пациента из `MASTER`.
//!
//! # Быстрый старт
//!
//! ```no_run
//! use wmlog_core::{LogReader, ReaderOptions};
//!
//! let mut reader = LogReader::open("00000001.log", ReaderOptions::default())?;
//! let mappings = reader.header().map(|h| h.channels.computed_mappings());
//!
//! for chunk in &mut reader {
//!     let chunk = chunk?;
//!     println!("{:?}", chunk.shape());
//! }
//! # let _ = mappings;
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

pub use wmlog_types::error;

pub mod binary;
pub mod entries;
pub mod header;
pub mod master;
pub mod mount;
pub mod reader;
pub mod schema;

pub use binary::*;
pub use entries::*;
pub use header::*;
pub use master::*;
pub use mount::*;
pub use reader::*;
pub use schema::*;

/// Версия библиотеки.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
