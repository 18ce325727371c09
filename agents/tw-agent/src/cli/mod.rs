//! CLI support module

pub mod config;
