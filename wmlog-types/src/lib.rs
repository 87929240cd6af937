pub mod channel;
pub mod chunk;
pub mod entry;
pub mod error;
pub mod header;

pub use channel::*;
pub use chunk::*;
pub use entry::*;
pub use error::*;
pub use header::*;
