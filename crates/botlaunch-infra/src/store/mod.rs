//! Job and history stores.

pub mod history_file;
pub mod memory;

pub use history_file::HistoryFile;
pub use memory::MemoryJobStore;
