//! # Mercado Sync Server
//! The HTTP face of the marketplace integration backend. It is responsible for:
//! * Listening for incoming webhook notifications from MercadoLibre, acknowledging them immediately, and
//!   dispatching the actual work in the background.
//! * Exposing a manual sync endpoint so operators and back-office jobs can trigger reconciliation on demand.
//!
//! ## Configuration
//! The server is configured via environment variables. See [config](config/index.html) for more information.
//!
//! ## Routes
//! * `/health`: A health check route that returns a 200 OK response.
//! * `/meli/webhook`: The webhook route for MercadoLibre notifications. POST only; always answers 200 for
//!   recognized payloads so the marketplace does not retry.
//! * `/api/sync`: Manual sync trigger. Requires an API key or the internal service secret.

pub mod cli;
pub mod config;
pub mod data_objects;
pub mod errors;

pub mod helpers;
pub mod middleware;
pub mod routes;
pub mod server;
pub mod webhook;

#[cfg(test)]
mod endpoint_tests;
