pub mod artifacts;
pub mod csv;
