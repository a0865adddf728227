// src/interception/mod.rs
//! Socket interception layer
//!
//! - **hook**, **prologue**, **memory**: inline detours on x86 and x86-64
//! - **winsock**: socket constants and per-thread error state
//! - **client**: routes each socket call to an emulated link or the real function
//! - **exports**: module entry points and the `ws2_32.dll` shims
//! - **once**: spin-based one-time initialization
//!
//! # Architecture
//!
//! ```text
//! Game client (unmodified)
//!     │
//!     ├─ connect(9958 | 5816) → shim → Client claims a slot → 0
//!     ├─ send / recv          → shim → Connection (cipher + reply queue)
//!     └─ any other socket     → shim → trampoline → ws2_32
//! ```

pub mod client;
pub mod exports;
pub mod hook;
pub mod memory;
pub mod once;
pub mod prologue;
pub mod winsock;

pub use client::{Client, Passthrough, STAGING_CAPACITY};
pub use exports::{client, initialize, initialize_with, uninitialize, Attach};
pub use hook::Hook;
pub use once::SpinOnce;
pub use prologue::Prologue;
