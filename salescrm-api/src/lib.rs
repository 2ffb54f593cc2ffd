//! # SalesCRM API Server Library
//!
//! HTTP surface of the CRM: router, configuration, the response envelope and
//! error mapping, and one handler module per resource. Domain models, access
//! scoping and persistence live in `salescrm-shared`.

pub mod access;
pub mod app;
pub mod config;
pub mod error;
pub mod extract;
pub mod middleware;
pub mod response;
pub mod routes;
