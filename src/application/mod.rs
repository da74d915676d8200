//! Application services over the query cache and the gateways.

pub mod auth;
pub mod error;
pub mod feed;
pub mod gateway;
pub mod profile;
pub mod todos;
