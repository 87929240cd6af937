//! Пакетная конвертация исследований WorkMate
//!
//! Обходит каталоги исследований, выгружает логи с данными в CSV (с
//! вычисленными или сырыми отведениями) и аннотации в CSV или `.sel`.

pub mod config;
pub mod error;
pub mod planter;
pub mod session;

pub use config::*;
pub use error::*;
pub use planter::*;
pub use session::*;
