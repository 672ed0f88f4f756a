// Infrastructure layer - implements interfaces defined in the domain layer
pub mod crypto;
pub mod logging;
pub mod stores;
