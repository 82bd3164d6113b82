//! Serving the application
//!
//! ```text
//! 1. Configuration loading (AppConfig)
//!    ↓
//! 2. Task registration and dispatcher build
//!    ↓
//! 3. Server start
//!    ↓
//! [Running...]
//!    ↓
//! 4. Shutdown signal (SIGTERM/SIGINT)
//!    ↓
//! 5. In-flight requests drained, server stop
//! ```

mod application;
mod shutdown;

pub use application::Application;
pub use shutdown::shutdown_signal;
