pub mod assistant;
pub mod config;
pub mod deletion;
pub mod dispatcher;
pub mod geocode;
pub mod intent;
pub mod llm;
pub mod memory;
pub mod terminal;
