// src/models/mod.rs
//! Data structures for access credentials.

pub mod access;
pub mod credential;
