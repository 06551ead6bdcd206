//! HTTP API surface.
//!
//! Request/response models live in [`models`], Axum route handlers in
//! [`handlers`]. The surface is a single deployment route; everything else
//! (pipeline logic, platform calls) lives below it.

pub mod handlers;
pub mod models;
