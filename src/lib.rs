pub mod api;
pub mod app;
pub mod bower;
pub mod concat;
pub mod errors;
pub mod options;
pub mod output;
pub mod pipeline;
pub mod plugins;
pub mod preview;
pub mod sourcemap;
pub mod tools;
pub mod transactions;
pub mod utils;
pub mod value;
pub mod vfs;
