//! Time tracking for bookmarks: session lifecycle, statistics and the HTTP
//! surface in front of them.

pub mod config;
pub mod db;
pub mod docs;
pub mod error;
pub mod handlers;
pub mod middleware;
pub mod models;
pub mod repositories;
pub mod routes;
pub mod services;
pub mod state;
pub mod types;
pub mod utils;
pub mod validation;
