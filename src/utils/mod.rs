pub mod dataset;
pub mod float;
