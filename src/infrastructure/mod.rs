// Infrastructure layer
pub mod assembler;
pub mod bundler;
pub mod file_system;
pub mod minifier;

pub use assembler::*;
pub use bundler::*;
pub use file_system::*;
pub use minifier::*;
