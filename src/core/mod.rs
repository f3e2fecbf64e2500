pub mod engine;
pub mod fetcher;
pub mod stats;
pub mod trend;
