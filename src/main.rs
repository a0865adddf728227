// src/main.rs
//! Serverless probe
//!
//! Loads the configuration the injected module would use and, on Windows,
//! reports which prologue signature each hooked `ws2_32.dll` export carries.
//! Run it on a new OS build before injecting the module.
//!
//! Usage: `serverless-engine [config.toml]`

use anyhow::{Context, Result};
use serverless_engine::observability::init_tracing;
use serverless_engine::utils::config::EngineConfig;
use tracing::info;

fn main() -> Result<()> {
    let config = match std::env::args().nth(1) {
        Some(path) => EngineConfig::from_file(&path)
            .with_context(|| format!("Failed to load configuration from {}", path))?,
        None => EngineConfig::load().context("Failed to load configuration")?,
    };

    init_tracing(&config.logging);
    info!("Serverless probe v{}", serverless_engine::VERSION);
    info!(
        "Account port {}, game port {}, game address {}",
        config.endpoints.account_port, config.endpoints.game_port, config.endpoints.game_address
    );
    info!(
        "Session uid {}, spawn map {} at ({}, {})",
        config.session.account_uid, config.spawn.map, config.spawn.x, config.spawn.y
    );

    probe_exports()
}

#[cfg(windows)]
fn probe_exports() -> Result<()> {
    use serverless_engine::interception::exports::{resolve_exports, EXPORT_NAMES, WS2_32};
    use serverless_engine::interception::prologue::{Prologue, MAX_HEADER_SIZE};
    use tracing::warn;

    let addresses = resolve_exports(true).with_context(|| format!("Failed to resolve {} exports", WS2_32))?;

    let mut unknown = 0;
    for (name, address) in EXPORT_NAMES.iter().zip(addresses) {
        // SAFETY: address is the entry of a loaded export; every prologue is
        // at least MAX_HEADER_SIZE bytes into the function body
        let code = unsafe { std::slice::from_raw_parts(address as *const u8, MAX_HEADER_SIZE) };
        match Prologue::classify(code) {
            Some(prologue) => info!("{}!{} at {:#x}: {:?}", WS2_32, name, address, prologue),
            None => {
                unknown += 1;
                warn!("{}!{} at {:#x}: unknown prologue {:02X?}", WS2_32, name, address, &code[..5]);
            }
        }
    }

    if unknown > 0 {
        anyhow::bail!("{} export(s) cannot be hooked on this system", unknown);
    }
    info!("All exports can be hooked");
    Ok(())
}

#[cfg(not(windows))]
fn probe_exports() -> Result<()> {
    info!("Export probe skipped: socket interception requires Windows");
    Ok(())
}
