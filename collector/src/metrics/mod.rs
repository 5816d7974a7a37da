pub mod sample;
pub mod spec;

// Re-export the main types for easy access
pub use sample::*;
pub use spec::*;
