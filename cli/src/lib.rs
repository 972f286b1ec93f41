pub mod api;
pub mod app;
pub mod audio;
pub mod config;
pub mod journal;
pub mod melody;
pub mod mood;
pub mod types;
pub mod week;
