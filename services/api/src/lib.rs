//! services/api/src/lib.rs
//!
//! The DriverRoom API service: configuration, storage adapters and the axum web layer.

pub mod adapters;
pub mod config;
pub mod error;
pub mod web;
