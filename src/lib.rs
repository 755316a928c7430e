//! # scholarpath
//!
//! Client core for the ScholarPath college and scholarship matching product.
//!
//! This crate owns everything stateful or network-facing on the client side:
//! the identity-provider session store, backend profile reconciliation, the
//! route gate that decides which views are reachable, the OAuth callback
//! handler, and the backend API client with its per-endpoint fallback policy.
//! Rendering is left to whatever front end drives it (the `cli` crate in this
//! repository).

pub mod api;
pub mod app;
pub mod auth;
pub mod callback;
pub mod config;
pub mod dashboard;
pub mod profile;
pub mod route;

#[cfg(test)]
pub(crate) mod test_helpers;

pub use app::App;
pub use config::AppConfig;
