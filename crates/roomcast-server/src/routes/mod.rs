//! HTTP route handlers.

pub mod ws;
