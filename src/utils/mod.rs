// src/utils/mod.rs
//! Helper functions shared by the services.

pub mod http;
pub mod serialization;
