// Library exports for Inkpost
// This allows integration tests and external code to use Inkpost modules

pub mod auth;
pub mod config;
pub mod db;
pub mod error;
pub mod extractors;
pub mod pagination;
pub mod routes;
pub mod social;
pub mod state;
