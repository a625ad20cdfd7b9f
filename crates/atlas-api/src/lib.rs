pub mod auth;
pub mod catalogue;
pub mod comments;
pub mod convert;
pub mod error;
pub mod findings;
pub mod messages;
pub mod middleware;
pub mod profiles;
pub mod recipes;
pub mod routes;
pub mod state;
pub mod storage;
pub mod validation;
