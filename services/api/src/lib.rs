//! services/api/src/lib.rs
//!
//! Library half of the API service, shared by the server and the OpenAPI generator.

pub mod adapters;
pub mod config;
pub mod error;
pub mod web;
