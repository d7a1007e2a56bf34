// src/lib.rs

pub mod actuator;
pub mod analysis;
pub mod config;
pub mod error;
pub mod notify;
pub mod pipeline;
pub mod siren;
pub mod store;
pub mod types;
