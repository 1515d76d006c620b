//! HTTP service for the digit classifier

pub mod api;
pub mod config;
pub mod health;
