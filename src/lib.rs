pub mod amount;
pub mod config;
pub mod engine;
pub mod events;
pub mod exchange;
pub mod observability;
pub mod recorder;
pub mod strategy;
pub mod types;
