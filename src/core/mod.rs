// Core domain layer
pub mod interfaces;
pub mod models;
pub mod orchestrator;
pub mod profiles;
pub mod rules;
pub mod services;

pub use interfaces::*;
pub use models::*;
pub use orchestrator::*;
pub use profiles::*;
pub use rules::*;
pub use services::*;
