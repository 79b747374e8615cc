pub mod config;
pub mod memory;

pub use config::CatalogConfig;
pub use memory::MemoryCatalog;
