//! Peer API client: fetches chains from other nodes over HTTP.

use ledger_core::{ChainSnapshot, PeerAddress, PeerError};
use wasm_bindgen::prelude::*;
use wasm_bindgen_futures::JsFuture;
use web_sys::{AbortSignal, Request, RequestInit, RequestMode, Response};

/// HTTP client for the `/chain` endpoint peers serve.
#[wasm_bindgen]
#[derive(Debug, Clone, Copy)]
pub struct PeerClient {
    /// Per-request timeout in milliseconds.
    timeout_ms: u32,
}

#[wasm_bindgen]
impl PeerClient {
    /// Create a client that aborts each request after `timeout_ms`.
    #[wasm_bindgen(constructor)]
    pub fn new(timeout_ms: u32) -> Self {
        PeerClient { timeout_ms }
    }

    /// Fetch a peer's chain and return it as a JS object.
    pub async fn get_chain(&self, address: &str) -> Result<JsValue, JsValue> {
        let peer = PeerAddress::parse(address)
            .map_err(|e| JsValue::from_str(&e.to_string()))?;
        let snapshot = self
            .fetch_chain(&peer)
            .await
            .map_err(|e| JsValue::from_str(&e.to_string()))?;
        crate::state::to_js_json(&snapshot)
    }

    /// Get the request timeout.
    #[wasm_bindgen(getter)]
    pub fn timeout_ms(&self) -> u32 {
        self.timeout_ms
    }
}

impl PeerClient {
    /// Fetch and decode `http://{peer}/chain`.
    ///
    /// The body is parsed in Rust rather than by `Response.json()` so large
    /// proofs keep their full 64-bit precision.
    pub async fn fetch_chain(&self, peer: &PeerAddress) -> Result<ChainSnapshot, PeerError> {
        let unreachable = |reason: String| PeerError::Unreachable {
            peer: peer.to_string(),
            reason,
        };

        let body = self
            .fetch_text(&peer.chain_url())
            .await
            .map_err(|e| unreachable(js_error_text(&e)))?;

        serde_json::from_str(&body).map_err(|e| PeerError::MalformedResponse {
            peer: peer.to_string(),
            reason: e.to_string(),
        })
    }

    /// Fetch text from a URL.
    async fn fetch_text(&self, url: &str) -> Result<String, JsValue> {
        let opts = RequestInit::new();
        opts.set_method("GET");
        opts.set_mode(RequestMode::Cors);
        let signal = AbortSignal::timeout_with_u32(self.timeout_ms);
        opts.set_signal(Some(&signal));

        let request = Request::new_with_str_and_init(url, &opts)?;
        request.headers().set("Accept", "application/json")?;

        let window = web_sys::window().ok_or_else(|| JsValue::from_str("No window"))?;
        let resp_value = JsFuture::from(window.fetch_with_request(&request)).await?;
        let resp: Response = resp_value.dyn_into()?;

        if !resp.ok() {
            return Err(JsValue::from_str(&format!(
                "HTTP error: {}",
                resp.status()
            )));
        }

        let text = JsFuture::from(resp.text()?).await?;
        text.as_string()
            .ok_or_else(|| JsValue::from_str("Response is not a string"))
    }
}

/// Best-effort text for a rejected JS promise.
fn js_error_text(value: &JsValue) -> String {
    value
        .as_string()
        .or_else(|| {
            value
                .dyn_ref::<js_sys::Error>()
                .map(|e| String::from(e.message()))
        })
        .unwrap_or_else(|| format!("{:?}", value))
}
