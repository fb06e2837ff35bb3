//! HTTP surface for larder.
//!
//! `routes` owns the Axum router and handlers, `state` the shared handles,
//! `api_types` the JSON request/response shapes. The binary in `main.rs`
//! only wires these together.

pub mod api_types;
pub mod routes;
pub mod state;
