//! Export tables and export resolution.

pub mod resolver;
pub mod table;

pub use resolver::resolve_export;
pub use table::{EntryPoint, Export, ExportTable, Signature};
