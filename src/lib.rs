// widget_core: embeddable virtual try-on widget runtime.
// The flow logic is pure Rust and natively testable; the browser surface
// (DOM, camera, fetch) lives behind the loader. JS is plumbing.

mod analytics;
mod api;
mod config;
mod error;
mod loader;
mod media;
mod render;
mod state;
mod types;

use wasm_bindgen::prelude::*;

pub use analytics::{build_payload, AnalyticsEvent, AnalyticsSink};
pub use api::{ApiClient, DEFAULT_BACKEND_URL};
pub use config::{ButtonSize, ButtonStyle, ConfigOverrides, WidgetConfig, WidgetSize};
pub use error::{ApiError, CaptureError};
pub use loader::{destroy, init_widget, InitOptions};
pub use media::MediaCaptureController;
pub use render::{render_html, ViewState, CLOSE_ID, CONTAINER_ID};
pub use state::{Command, Step, TryOnStateMachine, WidgetEvent};
pub use types::{CapturedPhoto, PhotoSource, Product, TryOnResult};

/// Module entry point: panic hook for readable browser errors, the
/// `window.VirtualTryOnWidget` API, and script-tag auto-init.
#[wasm_bindgen(start)]
pub fn start() {
    #[cfg(feature = "console_error_panic_hook")]
    console_error_panic_hook::set_once();

    if let Err(err) = loader::install_global_api() {
        web_sys::console::error_2(
            &JsValue::from_str("VirtualTryOnWidget failed to install"),
            &err,
        );
    }
    loader::auto_init_from_script_tag();
}
