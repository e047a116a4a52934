pub mod app;
pub mod audio;
pub mod config;
pub mod graphics;
pub mod spatial;
pub mod ui;
