pub mod app;
pub mod auth;
pub mod credentials;
pub mod members;
pub mod metrics;
pub mod projects;
pub mod templates;
