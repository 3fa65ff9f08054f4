// Library surface for headless/integration tests and reuse.
// The binary only wires terminal setup and CLI parsing around it.
pub mod app_dirs;
pub mod catalog;
pub mod config;
pub mod error;
pub mod game;
pub mod highscore;
pub mod interrupt;
pub mod logging;
pub mod runtime;
pub mod scoring;
pub mod session;
pub mod ui;
