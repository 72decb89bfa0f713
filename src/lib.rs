pub mod database {
    pub mod actions;
    pub mod error;
    pub mod pagination;
    pub mod schema;
}
pub mod authentication {
    pub mod cryptography;
    pub mod jwt;
    pub mod middleware;
    pub mod permissions;
}
pub mod api {
    pub mod handlers;
    pub mod rejection;
    pub mod routes;
}
mod constants;

pub use authentication::*;
pub use constants::*;
pub use database::*;
