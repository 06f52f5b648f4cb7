pub mod matrix;
pub mod ordering;
pub mod stats;
pub mod util;
