// src/lib.rs

pub mod config;
pub mod db;
pub mod notifications;
pub mod repositories;
pub mod services;
pub mod test_utils;

pub use config::{CoreConfig, ReapprovalPolicy};
pub use db::Database;
pub use treetap_common::error::Error;
