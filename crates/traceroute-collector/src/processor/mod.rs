pub mod anomaly;
pub mod constants;
pub mod hops;
pub mod process;
pub mod sample;
