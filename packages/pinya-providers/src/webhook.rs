use std::time::Duration;

use color_eyre::Result;
use reqwest::{Client, header::HeaderMap};
use serde_json::Value;

/// Posts a JSON payload to `url`. Non-2xx responses are errors.
pub async fn post(cfg: &pinya_config::Notifications, url: &str, payload: &Value) -> Result<()> {
	let client = Client::builder().timeout(Duration::from_millis(cfg.timeout_ms)).build()?;
	let mut headers = HeaderMap::new();

	crate::extend_headers(&mut headers, &cfg.default_headers)?;

	client.post(url).headers(headers).json(payload).send().await?.error_for_status()?;

	Ok(())
}
