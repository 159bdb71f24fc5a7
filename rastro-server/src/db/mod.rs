//! Database operations for rastro-server

pub mod packages;
pub mod users;
