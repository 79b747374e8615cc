// Collaborator traits consumed by the CPAS engine, together with the models
// they exchange. Implementations live in `core-catalog`, `core-storage` or
// outside of this workspace.

pub mod catalog;
pub use catalog::*;

pub mod query;
pub use query::*;

pub mod storage;
pub use storage::*;
