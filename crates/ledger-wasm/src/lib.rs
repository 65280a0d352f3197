//! WebAssembly bindings for the pow-ledger node.
//!
//! This crate provides JavaScript-accessible APIs for:
//! - Submitting transactions and inspecting the chain
//! - Mining in small batches from the browser event loop
//! - Registering peers and resolving conflicts against their chains

use wasm_bindgen::prelude::*;

pub mod api;
pub mod logging;
pub mod node;
pub mod state;

// Re-export main types for JS access
pub use api::PeerClient;
pub use node::Node;

/// Initialize the WASM module with better panic messages and console
/// logging.
#[wasm_bindgen(start)]
pub fn init() {
    #[cfg(feature = "console_error_panic_hook")]
    console_error_panic_hook::set_once();

    logging::try_init(tracing::Level::INFO);
}

/// Get the library version.
#[wasm_bindgen]
pub fn version() -> String {
    env!("CARGO_PKG_VERSION").to_string()
}
