//! Core types and services for the Rakshak rescue coordination backend.
//!
//! This crate has no HTTP or database dependencies.
//! Storage backends implement [`store::RescueStore`]; the HTTP layer resolves
//! a [`principal::Principal`] and hands it to the services defined here.

// We intentionally use native `async fn` in traits (stabilised in Rust 1.75).
#![allow(async_fn_in_trait)]

pub mod case;
pub mod error;
pub mod lifecycle;
pub mod principal;
pub mod roster;
pub mod store;

pub use error::{Error, Result};
