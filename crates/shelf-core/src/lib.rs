//! Core smart-shelf library (model, state store, Gateway client, push channel, config).

pub mod config;
pub mod gateway;
pub mod logging;
pub mod model;
pub mod push;
pub mod store;
pub mod utils;
