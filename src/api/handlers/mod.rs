//! Route handlers.
//!
//! Handlers receive their collaborators through `Extension` layers and map
//! failures to [`error::ApiError`] at the boundary.

pub mod actions;
pub mod auth;
pub mod certs;
pub mod error;
pub mod health;
pub mod panes;
pub mod snapshot;
