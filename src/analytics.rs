// Fire-and-forget analytics. The widget only ever calls the sink; it never
// waits on it and never reacts to its failures.

use serde_json::{json, Value};
use uuid::Uuid;
use wasm_bindgen::{JsCast, JsValue};
use wasm_bindgen_futures::{spawn_local, JsFuture};
use web_sys::RequestInit;

const VISITOR_KEY: &str = "visitorId";
const SESSION_KEY: &str = "sessionVisitorId";

/// The fixed event vocabulary understood by the analytics pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AnalyticsEvent {
    WidgetOpened,
    ProductViewed,
    PhotoCaptureStarted,
    PhotoCaptured,
    PhotoUploadStarted,
    PhotoUploaded,
    TryonGenerationStarted,
    TryonGenerationSuccess,
    TryonGenerationFailed,
    TryAgainClicked,
    WidgetClosed,
    ErrorEvent,
}

impl AnalyticsEvent {
    /// Wire name as consumed by the aggregation pipeline.
    pub fn name(self) -> &'static str {
        match self {
            AnalyticsEvent::WidgetOpened => "widget_opened",
            AnalyticsEvent::ProductViewed => "product_viewed",
            AnalyticsEvent::PhotoCaptureStarted => "photo_capture_started",
            AnalyticsEvent::PhotoCaptured => "photo_captured",
            AnalyticsEvent::PhotoUploadStarted => "photo_upload_started",
            AnalyticsEvent::PhotoUploaded => "photo_uploaded",
            AnalyticsEvent::TryonGenerationStarted => "tryon_generation_started",
            AnalyticsEvent::TryonGenerationSuccess => "tryon_generation_success",
            AnalyticsEvent::TryonGenerationFailed => "tryon_generation_failed",
            AnalyticsEvent::TryAgainClicked => "try_again_clicked",
            AnalyticsEvent::WidgetClosed => "widget_closed",
            AnalyticsEvent::ErrorEvent => "error_event",
        }
    }
}

/// Build the JSON payload for one event. Extra fields are merged at the top
/// level, after the fixed ones, matching the original wire shape.
pub fn build_payload(
    event: AnalyticsEvent,
    api_key: &str,
    visitor_id: &str,
    session_visitor_id: &str,
    timestamp: &str,
    extra: Value,
) -> Value {
    let mut payload = json!({
        "event": event.name(),
        "apiKey": api_key,
        "visitorId": visitor_id,
        "sessionVisitorId": session_visitor_id,
        "timestamp": timestamp,
    });
    if let (Some(object), Some(extra)) = (payload.as_object_mut(), extra.as_object()) {
        for (key, value) in extra {
            object.insert(key.clone(), value.clone());
        }
    }
    payload
}

/// Emits events to `{base}/api/widget-analytics` without awaiting the result.
pub struct AnalyticsSink {
    endpoint: String,
    api_key: String,
    visitor_id: String,
    session_visitor_id: String,
}

impl AnalyticsSink {
    pub fn new(base_url: &str, api_key: &str) -> Self {
        AnalyticsSink {
            endpoint: format!("{}/api/widget-analytics", base_url.trim_end_matches('/')),
            api_key: api_key.to_string(),
            visitor_id: stored_or_fresh_id(local_storage(), VISITOR_KEY),
            session_visitor_id: stored_or_fresh_id(session_storage(), SESSION_KEY),
        }
    }

    /// Fire-and-forget. Serialization or transport failures are logged to the
    /// console and otherwise swallowed.
    pub fn track(&self, event: AnalyticsEvent, extra: Value) {
        let payload = build_payload(
            event,
            &self.api_key,
            &self.visitor_id,
            &self.session_visitor_id,
            &js_sys::Date::new_0().to_iso_string().as_string().unwrap_or_default(),
            extra,
        );
        let body = match serde_json::to_string(&payload) {
            Ok(body) => body,
            Err(_) => return,
        };
        let endpoint = self.endpoint.clone();

        spawn_local(async move {
            if let Err(err) = post_json(&endpoint, &body).await {
                web_sys::console::warn_2(
                    &JsValue::from_str("Analytics event failed to send"),
                    &err,
                );
            }
        });
    }
}

async fn post_json(url: &str, body: &str) -> Result<(), JsValue> {
    let window = web_sys::window().ok_or_else(|| JsValue::from_str("no window"))?;
    let headers = web_sys::Headers::new()?;
    headers.set("Content-Type", "application/json")?;

    let init = RequestInit::new();
    init.set_method("POST");
    init.set_headers(headers.as_ref());
    init.set_body(&JsValue::from_str(body));

    let response = JsFuture::from(window.fetch_with_str_and_init(url, &init)).await?;
    let response: web_sys::Response = response.dyn_into()?;
    if !response.ok() {
        return Err(JsValue::from_str(&format!("status {}", response.status())));
    }
    Ok(())
}

fn local_storage() -> Option<web_sys::Storage> {
    web_sys::window().and_then(|w| w.local_storage().ok().flatten())
}

fn session_storage() -> Option<web_sys::Storage> {
    web_sys::window().and_then(|w| w.session_storage().ok().flatten())
}

/// Read a stable identifier from storage, minting and persisting a v4 UUID on
/// first visit. Storage unavailability (private mode, sandboxed iframes)
/// degrades to a fresh id per call.
fn stored_or_fresh_id(storage: Option<web_sys::Storage>, key: &str) -> String {
    if let Some(storage) = storage {
        if let Ok(Some(existing)) = storage.get_item(key) {
            if !existing.is_empty() {
                return existing;
            }
        }
        let id = Uuid::new_v4().to_string();
        let _ = storage.set_item(key, &id);
        id
    } else {
        Uuid::new_v4().to_string()
    }
}
