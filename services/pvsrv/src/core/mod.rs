//! Core: configuration, device link, register map and decoding

pub mod bootstrap;
pub mod client;
pub mod config;
pub mod decoder;
pub mod registers;
pub mod snapshot;
pub mod status;
