// Core domain layer
pub mod capability;
pub mod config;
pub mod interfaces;
pub mod models;
pub mod services;

pub use capability::*;
pub use config::*;
pub use interfaces::*;
pub use models::*;
pub use services::*;
