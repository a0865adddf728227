// src/security/mod.rs
//! Cipher primitives wrapping the client protocol
//!
//! - **tq_cipher**: byte-stream cipher applied to every frame on the wire
//! - **rc5**: block cipher protecting the password field of the login request

pub mod rc5;
pub mod tq_cipher;

pub use rc5::Rc5;
pub use tq_cipher::{CipherRole, TqCipher};
