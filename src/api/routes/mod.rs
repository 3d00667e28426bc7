pub mod data;
pub mod monitoring;
pub mod status;
