//! Travel Assist — conversational flow & predictive automation core.

pub mod behavior;
pub mod bus;
pub mod config;
pub mod engine;
pub mod error;
pub mod flows;
pub mod insights;
pub mod memory;
pub mod stages;
pub mod store;
pub mod suggestions;
