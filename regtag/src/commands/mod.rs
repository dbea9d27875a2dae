/// Resolve a reference to its content digest
pub mod digest;
/// List repository tags
pub mod tags;
