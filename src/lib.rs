pub mod api;
pub mod columns;
pub mod daily_sync;
pub mod data_collector;
pub mod models;
pub mod sheets;
pub mod utils;
