//! HTTP API handlers for rastro-server

pub mod auth;
pub mod health;
pub mod ocr;
pub mod packages;
pub mod users;
