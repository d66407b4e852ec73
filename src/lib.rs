//! Multi-tenant organizations, projects, role bindings and API keys.

pub mod config;
pub mod crypto;
pub mod db;
pub mod error;
pub mod handlers;
pub mod kms;
pub mod middleware;
pub mod models;
pub mod rbac;
pub mod service;
pub mod util;
