pub mod auth;
pub mod credentials;
pub mod members;
pub mod projects;
