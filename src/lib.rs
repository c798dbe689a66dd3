// Library surface for the binary and for headless/integration tests.
pub mod app;
pub mod app_dirs;
pub mod config;
pub mod environment;
pub mod history;
pub mod proctor;
pub mod quiz;
pub mod runtime;
pub mod session;
pub mod terminal;
pub mod ui;

pub use proctor::Controller;
