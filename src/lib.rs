// src/lib.rs

pub mod catalog;
pub mod category;
pub mod config;
pub mod engine;
pub mod error;
