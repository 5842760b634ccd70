//! fintiva: client for the FINTIVA microfinance API.
//!
//! Signs a producer in, keeps the bearer token, submits expense, crop and
//! parcel records, and composes the per-user metrics dashboard. Usable as a
//! CLI (`fintiva`) or through the embedded web dashboard (`fintiva web`).

pub mod activity;
pub mod api;
pub mod auth;
pub mod cli;
pub mod config;
pub mod dashboard;
pub mod forms;
pub mod identity;
pub mod metrics;
pub mod session;
pub mod web;
