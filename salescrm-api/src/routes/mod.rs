/// API route handlers, one module per resource
///
/// Handlers follow the same sequence: check the module permission (which
/// also resolves the caller's visibility scope), validate the body, load and
/// scope-check the target record, write, then record an activity log entry.

pub mod accounts;
pub mod activity_logs;
pub mod auth;
pub mod calendar;
pub mod contacts;
pub mod dashboard;
pub mod deals;
pub mod email_templates;
pub mod emails;
pub mod health;
pub mod import;
pub mod leads;
pub mod master_data;
pub mod notifications;
pub mod partners;
pub mod products;
pub mod quote_terms;
pub mod quotes;
pub mod roles;
pub mod sales;
pub mod tasks;
pub mod users;
