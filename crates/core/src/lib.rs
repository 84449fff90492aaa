pub mod combat;
pub mod config;
pub mod detect;
pub mod engine;
pub mod error;
pub mod keys;
pub mod logger;
pub mod orchestrator;
pub mod platform;
pub mod select;
pub mod settings;
pub mod sleep;
pub mod track;
pub mod types;
