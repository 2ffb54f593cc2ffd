//! # SalesCRM Shared Library
//!
//! Domain types, persistence, and business rules for the SalesCRM API.
//!
//! ## Module Organization
//!
//! - `auth`: passwords, tokens, permissions, and hierarchical scope
//! - `db`: connection pool and migrations
//! - `models`: tenant-scoped database models
//! - `pagination`: page parameters and the response pagination block
//! - `import`: CSV bulk import
//! - `quote_pdf`: quote PDF rendering

pub mod auth;
pub mod db;
pub mod import;
pub mod models;
pub mod pagination;
pub mod quote_pdf;

/// Current version of the SalesCRM shared library
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version_is_set() {
        assert!(!VERSION.is_empty());
    }
}
