pub mod app;
pub mod audio;
pub mod config;
pub mod core;
pub mod error;
pub mod library;
pub mod logging;
pub mod model;
pub mod playlist;
pub mod scan;
pub mod scheduler;
pub mod selector;
pub mod session;
pub mod status;
pub mod ui;
pub mod video;
