// Web Interface module root
pub mod routes;

// Re-export commonly used items
pub use routes::*;
