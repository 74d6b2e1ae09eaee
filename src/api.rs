// Tenant backend client: config resolve (soft-fail to defaults), product
// fetch, and the generation call. URL building and response parsing stay pure
// so they run under plain cargo test; only the transport touches the browser.

use serde::{Deserialize, Serialize};
use wasm_bindgen::{JsCast, JsValue};
use wasm_bindgen_futures::JsFuture;
use web_sys::RequestInit;

use crate::config::{ConfigOverrides, WidgetConfig};
use crate::error::ApiError;
use crate::types::{Product, TryOnResult};

/// Fallback backend origin for tenants that embed the loader without a
/// `backendUrl` option or `data-backend-url` attribute.
pub const DEFAULT_BACKEND_URL: &str = "https://api.virtualfit.app";

/// Envelope returned by the config-by-api-key endpoint.
#[derive(Debug, Deserialize)]
struct ConfigEnvelope {
    config: Option<ConfigOverrides>,
}

#[derive(Debug, Serialize)]
struct GenerateRequest<'a> {
    #[serde(rename = "productId")]
    product_id: &'a str,
    photo: &'a str,
    timestamp: &'a str,
}

/// The backend answers with `resultImage`, but some deployments still send
/// `image`. Both are accepted; `resultImage` wins when both are present.
#[derive(Debug, Deserialize)]
struct GenerateResponse {
    #[serde(rename = "resultImage")]
    result_image: Option<String>,
    image: Option<String>,
}

impl GenerateResponse {
    fn into_image(self) -> Option<String> {
        self.result_image.or(self.image)
    }
}

/// Per-instance client bound to one tenant key and backend origin.
#[derive(Debug, Clone)]
pub struct ApiClient {
    base_url: String,
    api_key: String,
}

impl ApiClient {
    pub fn new(base_url: &str, api_key: &str) -> Self {
        ApiClient {
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn config_url(&self) -> String {
        format!(
            "{}/api/widget/config-by-api-key?api_key={}",
            self.base_url,
            encode_query_value(&self.api_key)
        )
    }

    fn product_url(&self, product_id: &str) -> String {
        format!(
            "{}/api/product/by-api-key?api_key={}&product_id={}",
            self.base_url,
            encode_query_value(&self.api_key),
            encode_query_value(product_id)
        )
    }

    fn generate_url(&self) -> String {
        format!("{}/api/generate-virtual-try-on-image", self.base_url)
    }

    /// Resolve the session configuration. Any failure at all falls back to
    /// the compiled-in defaults; availability never depends on this call.
    pub async fn resolve_config(&self) -> WidgetConfig {
        match self.try_resolve_config().await {
            Ok(config) => config,
            Err(err) => {
                web_sys::console::warn_1(&JsValue::from_str(&format!(
                    "widget config fetch failed, using defaults: {err}"
                )));
                WidgetConfig::default()
            }
        }
    }

    async fn try_resolve_config(&self) -> Result<WidgetConfig, ApiError> {
        let body = get_text(&self.config_url())
            .await
            .map_err(ApiError::ConfigFetch)?;
        let envelope: ConfigEnvelope =
            serde_json::from_str(&body).map_err(|e| ApiError::ConfigFetch(e.to_string()))?;
        Ok(WidgetConfig::default().merged(envelope.config.unwrap_or_default()))
    }

    /// Load the product record and rewrite its image paths to absolute URLs.
    pub async fn fetch_product(&self, product_id: &str) -> Result<Product, ApiError> {
        let body = get_text(&self.product_url(product_id))
            .await
            .map_err(ApiError::ProductFetch)?;
        let mut product: Product =
            serde_json::from_str(&body).map_err(|e| ApiError::ProductFetch(e.to_string()))?;
        product.absolutize_images(&self.base_url);
        Ok(product)
    }

    /// Submit a generation request. Any transport error, non-2xx status or
    /// malformed body is reported uniformly; callers decide whether to retry,
    /// never this client (generation is billed).
    pub async fn generate(
        &self,
        product_id: &str,
        photo_data_url: &str,
        timestamp: &str,
    ) -> Result<TryOnResult, ApiError> {
        let request = GenerateRequest {
            product_id,
            photo: photo_data_url,
            timestamp,
        };
        let body = serde_json::to_string(&request)
            .map_err(|e| ApiError::GenerationFailed(e.to_string()))?;

        let text = post_text(&self.generate_url(), &body, Some(&self.api_key))
            .await
            .map_err(ApiError::GenerationFailed)?;
        let response: GenerateResponse =
            serde_json::from_str(&text).map_err(|e| ApiError::GenerationFailed(e.to_string()))?;
        let image = response
            .into_image()
            .ok_or_else(|| ApiError::GenerationFailed("response carried no image".to_string()))?;

        Ok(TryOnResult {
            image,
            completed_at: timestamp.to_string(),
        })
    }
}

/// Percent-encode a query value (RFC 3986 unreserved characters pass through).
fn encode_query_value(value: &str) -> String {
    let mut encoded = String::with_capacity(value.len());
    for byte in value.bytes() {
        match byte {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'_' | b'.' | b'~' => {
                encoded.push(byte as char);
            }
            _ => {
                encoded.push('%');
                encoded.push_str(&format!("{byte:02X}"));
            }
        }
    }
    encoded
}

async fn get_text(url: &str) -> Result<String, String> {
    fetch_text(url, None).await
}

async fn post_text(url: &str, body: &str, api_key: Option<&str>) -> Result<String, String> {
    let headers = web_sys::Headers::new().map_err(js_detail)?;
    headers
        .set("Content-Type", "application/json")
        .map_err(js_detail)?;
    if let Some(key) = api_key {
        headers.set("X-API-Key", key).map_err(js_detail)?;
    }

    let init = RequestInit::new();
    init.set_method("POST");
    init.set_headers(headers.as_ref());
    init.set_body(&JsValue::from_str(body));
    fetch_text(url, Some(init)).await
}

async fn fetch_text(url: &str, init: Option<RequestInit>) -> Result<String, String> {
    let window = web_sys::window().ok_or_else(|| "no window".to_string())?;
    let promise = match init {
        Some(init) => window.fetch_with_str_and_init(url, &init),
        None => window.fetch_with_str(url),
    };
    let response = JsFuture::from(promise).await.map_err(js_detail)?;
    let response: web_sys::Response = response
        .dyn_into()
        .map_err(|_| "unexpected fetch result".to_string())?;
    if !response.ok() {
        return Err(format!("status {}", response.status()));
    }
    let text = JsFuture::from(response.text().map_err(js_detail)?)
        .await
        .map_err(js_detail)?;
    text.as_string()
        .ok_or_else(|| "non-text response body".to_string())
}

fn js_detail(err: JsValue) -> String {
    err.as_string()
        .or_else(|| js_sys::JSON::stringify(&err).ok().and_then(|s| s.as_string()))
        .unwrap_or_else(|| "network error".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn urls_are_built_with_encoded_query_values() {
        let client = ApiClient::new("https://backend.example/", "k 1+&");
        assert_eq!(
            client.config_url(),
            "https://backend.example/api/widget/config-by-api-key?api_key=k%201%2B%26"
        );
        assert_eq!(
            client.product_url("p/1"),
            "https://backend.example/api/product/by-api-key?api_key=k%201%2B%26&product_id=p%2F1"
        );
        assert_eq!(
            client.generate_url(),
            "https://backend.example/api/generate-virtual-try-on-image"
        );
    }

    #[test]
    fn unreserved_characters_pass_through() {
        assert_eq!(encode_query_value("abc-DEF_1.2~"), "abc-DEF_1.2~");
    }

    #[test]
    fn result_image_preferred_over_image_alias() {
        let both: GenerateResponse =
            serde_json::from_str(r#"{"resultImage":"a.png","image":"b.png"}"#).unwrap();
        assert_eq!(both.into_image().as_deref(), Some("a.png"));

        let alias_only: GenerateResponse = serde_json::from_str(r#"{"image":"b.png"}"#).unwrap();
        assert_eq!(alias_only.into_image().as_deref(), Some("b.png"));

        let neither: GenerateResponse = serde_json::from_str("{}").unwrap();
        assert!(neither.into_image().is_none());
    }

    #[test]
    fn generate_request_wire_shape() {
        let request = GenerateRequest {
            product_id: "p1",
            photo: "data:image/jpeg;base64,AAAA",
            timestamp: "2026-01-01T00:00:00Z",
        };
        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json["productId"], "p1");
        assert_eq!(json["photo"], "data:image/jpeg;base64,AAAA");
        assert_eq!(json["timestamp"], "2026-01-01T00:00:00Z");
    }

    #[test]
    fn config_envelope_tolerates_missing_config() {
        let envelope: ConfigEnvelope = serde_json::from_str("{}").unwrap();
        assert!(envelope.config.is_none());

        let envelope: ConfigEnvelope =
            serde_json::from_str(r#"{"config":{"buttonText":"Snap!"}}"#).unwrap();
        let merged = WidgetConfig::default().merged(envelope.config.unwrap());
        assert_eq!(merged.button_text, "Snap!");
    }
}
