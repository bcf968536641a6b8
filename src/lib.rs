pub mod claims;
pub mod config;
pub mod error;
pub mod identity;
pub mod orchestrator;
pub mod resource;
pub mod secret;

pub use config::AuthConfig;
pub use error::AuthError;
pub use orchestrator::{AuthOrchestrator, Screen, SignInState};

// Debug-only printing helper: cache internals trace through this instead of tracing so that
// nothing about cached accounts reaches release logs.
#[cfg(any(test, debug_assertions))]
#[macro_export]
macro_rules! tprintln {
    ($($arg:tt)*) => ( eprintln!($($arg)*) );
}

// In release builds the arguments are still type-checked but nothing is emitted.
#[cfg(not(any(test, debug_assertions)))]
#[macro_export]
macro_rules! tprintln {
    ($($arg:tt)*) => ({
        if false { let _ = format!($($arg)*); }
    });
}
