pub mod api;
pub mod mailbox;
pub mod models;
