pub mod classification;
pub mod metrics;
pub mod principal;
