pub mod analysis;
pub mod batch;
pub mod report;
pub mod trades;
