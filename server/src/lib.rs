//! Real-time notification hub library.
//! This crate exposes internal modules for integration testing.
//! The binary entry point is in main.rs.

pub mod auth;
pub mod config;
pub mod error;
pub mod events;
pub mod routes;
pub mod state;
pub mod ws;
