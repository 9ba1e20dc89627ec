mod database {
    pub mod actions;
    pub mod error;
    pub mod form;
    pub mod loader;
    pub mod pagination;
    pub mod schema;
    pub mod shopping_list;
    pub mod validators;
    pub mod views;
}
mod authentication {
    pub mod cryptography;
    pub mod jwt;
    pub mod middleware;
    pub mod permissions;
}
mod api {
    pub mod handlers;
    pub mod rejection;
    pub mod routes;
}
mod constants;

pub mod config;
pub mod context;
pub mod storage;

pub use api::routes::routes;
pub use authentication::*;
pub use constants::*;
pub use database::*;
