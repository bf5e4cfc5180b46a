pub mod common;
pub mod config;
pub mod error;
pub mod konst;
