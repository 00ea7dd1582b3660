pub mod catalog;
pub mod coerce;
pub mod db;
pub mod error;
pub mod maintenance;
pub mod materialize;
pub mod parquet_out;
pub mod pipeline;
pub mod progress;
