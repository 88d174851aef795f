pub mod collector;
pub mod config;
pub mod reader;
pub mod reconcile;
pub mod series;
pub mod sink;
