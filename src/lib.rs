pub mod api;
pub mod error;
pub mod mailer;
pub mod models;
pub mod repository;
pub mod schedule;
pub mod services;
pub mod state;
pub mod store;
