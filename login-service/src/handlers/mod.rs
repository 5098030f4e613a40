pub mod auth;

pub use auth::{login, register, update_password, verify};
