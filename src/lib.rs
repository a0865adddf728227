// src/lib.rs
//! Serverless login backend
//!
//! Loaded into the game client, this library hooks the client's socket
//! functions and answers the account and game server logins itself, so the
//! client reaches the game world without any server running.
//!
//! # Architecture
//!
//! - **interception**: inline hooks on `ws2_32.dll` and the socket controller
//! - **connection**: one emulated server link with its cipher and reply queue
//! - **network**: wire messages, dispatch and per-message handling
//! - **security**: stream and block ciphers of the client protocol
//! - **player**: the emulated character
//! - **observability**: logging and metrics
//! - **utils**: configuration and errors

pub mod connection;
pub mod interception;
pub mod network;
pub mod observability;
pub mod player;
pub mod security;
pub mod utils;

pub use connection::{Connection, ConnectionType, RecvOutcome};
pub use interception::{initialize, uninitialize, Client};
pub use network::{Message, Msg};
pub use player::Player;
pub use utils::config::EngineConfig;
pub use utils::errors::{EngineError, Result};

// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Loader entry point: hook the socket functions
///
/// Returns 0 on success and -1 on failure; the cause is logged.
#[no_mangle]
pub extern "C" fn serverless_initialize() -> i32 {
    match initialize() {
        Ok(()) => 0,
        Err(err) => {
            tracing::error!("Initialization failed: {}", err);
            -1
        }
    }
}

#[no_mangle]
pub extern "C" fn serverless_uninitialize() {
    uninitialize();
}

#[cfg(windows)]
mod dll {
    use crate::interception::Attach;
    use windows_sys::Win32::Foundation::{BOOL, HMODULE, TRUE};
    use windows_sys::Win32::System::SystemServices::DLL_PROCESS_ATTACH;

    #[no_mangle]
    #[allow(non_snake_case)]
    extern "system" fn DllMain(_module: HMODULE, reason: u32, _reserved: *mut std::ffi::c_void) -> BOOL {
        if reason == DLL_PROCESS_ATTACH {
            if let Err(err) = crate::interception::initialize_with(Attach::LoaderLock) {
                tracing::error!("Initialization failed: {}", err);
            }
        }
        TRUE
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version() {
        assert!(!VERSION.is_empty());
    }
}
