// Camera device lifecycle. The controller is the single owner of the live
// stream: at most one handle exists at a time, and stopping is idempotent
// because teardown is invoked from multiple transition paths.
//
// Acquisition is a free async function so callers never hold a borrow of the
// controller across the getUserMedia suspension point; the resulting stream
// is handed to the controller synchronously via `adopt`.

use wasm_bindgen::{JsCast, JsValue};
use wasm_bindgen_futures::JsFuture;
use web_sys::{
    CanvasRenderingContext2d, HtmlCanvasElement, HtmlVideoElement, MediaStream,
    MediaStreamConstraints, MediaStreamTrack,
};

use crate::error::CaptureError;
use crate::types::{CapturedPhoto, PhotoSource};

/// Ideal capture constraints: forward-facing camera at 640x480.
const VIDEO_CONSTRAINTS_JSON: &str =
    r#"{"width":{"ideal":640},"height":{"ideal":480},"facingMode":"user"}"#;

/// Acquire a forward-facing video stream, attach it to `video`, and start
/// playback. Fails with `InsecureContext` outside HTTPS/localhost,
/// `PermissionDenied` on user rejection, and `DeviceUnavailable` for
/// hardware or driver trouble. Safe to call again after any failure.
pub async fn open_stream(video: &HtmlVideoElement) -> Result<MediaStream, CaptureError> {
    let window = web_sys::window()
        .ok_or_else(|| CaptureError::DeviceUnavailable("no window".to_string()))?;
    if !window.is_secure_context() {
        return Err(CaptureError::InsecureContext);
    }

    let devices = window.navigator().media_devices().map_err(|_| {
        CaptureError::DeviceUnavailable("media devices are not available".to_string())
    })?;

    let constraints = MediaStreamConstraints::new();
    let video_constraints = js_sys::JSON::parse(VIDEO_CONSTRAINTS_JSON)
        .map_err(|_| CaptureError::DeviceUnavailable("bad constraints".to_string()))?;
    constraints.set_video(&video_constraints);

    let promise = devices
        .get_user_media_with_constraints(&constraints)
        .map_err(|err| classify_js_error(&err))?;
    let stream = JsFuture::from(promise)
        .await
        .map_err(|err| classify_js_error(&err))?;
    let stream: MediaStream = stream
        .dyn_into()
        .map_err(|_| CaptureError::DeviceUnavailable("unexpected stream type".to_string()))?;

    video.set_src_object(Some(&stream));
    if let Ok(play) = video.play() {
        // Autoplay rejection is recoverable; the capture controls still work.
        let _ = JsFuture::from(play).await;
    }
    Ok(stream)
}

/// Release every hardware track of a stream and detach the element it feeds.
/// Tracks that already ended ignore the extra `stop()`.
pub fn stop_stream(stream: &MediaStream, video: Option<&HtmlVideoElement>) {
    for track in stream.get_tracks().iter() {
        if let Ok(track) = track.dyn_into::<MediaStreamTrack>() {
            track.stop();
        }
    }
    if let Some(video) = video {
        video.set_src_object(None);
    }
}

/// Wraps one live `MediaStream` together with the video element it feeds.
struct StreamHandle {
    stream: MediaStream,
    video: HtmlVideoElement,
}

/// Owns the camera device handle for one widget instance.
pub struct MediaCaptureController {
    current: Option<StreamHandle>,
}

impl MediaCaptureController {
    pub fn new() -> Self {
        MediaCaptureController { current: None }
    }

    pub fn is_active(&self) -> bool {
        self.current.is_some()
    }

    /// Take ownership of a freshly acquired stream. A handle that is already
    /// live is stopped first, so repeated starts can never stack streams.
    pub fn adopt(&mut self, stream: MediaStream, video: &HtmlVideoElement) {
        self.stop();
        self.current = Some(StreamHandle {
            stream,
            video: video.clone(),
        });
    }

    /// Point the live stream at a freshly created video element. Renders
    /// replace the markup wholesale, so the sink element must be refreshed
    /// after each one. No-op when nothing is live.
    pub fn reattach(&mut self, video: &HtmlVideoElement) {
        if let Some(handle) = self.current.as_mut() {
            video.set_src_object(Some(&handle.stream));
            let _ = video.play();
            handle.video = video.clone();
        }
    }

    /// Synchronously sample the current frame into a JPEG data URL.
    /// `NotReady` until the stream has produced its first frame.
    pub fn capture_frame(
        &self,
        video: &HtmlVideoElement,
        canvas: &HtmlCanvasElement,
    ) -> Result<CapturedPhoto, CaptureError> {
        if self.current.is_none() {
            return Err(CaptureError::NotReady);
        }
        let width = video.video_width();
        let height = video.video_height();
        if width == 0 || height == 0 {
            return Err(CaptureError::NotReady);
        }

        canvas.set_width(width);
        canvas.set_height(height);
        let context = canvas
            .get_context("2d")
            .ok()
            .flatten()
            .and_then(|c| c.dyn_into::<CanvasRenderingContext2d>().ok())
            .ok_or_else(|| {
                CaptureError::DeviceUnavailable("2d canvas context unavailable".to_string())
            })?;
        context
            .draw_image_with_html_video_element(video, 0.0, 0.0)
            .map_err(|_| CaptureError::NotReady)?;

        let data_url = canvas
            .to_data_url_with_type("image/jpeg")
            .map_err(|_| CaptureError::NotReady)?;
        Ok(CapturedPhoto::new(data_url, PhotoSource::Camera))
    }

    /// Release the current handle. No-op when nothing is live; callable any
    /// number of times.
    pub fn stop(&mut self) {
        if let Some(handle) = self.current.take() {
            stop_stream(&handle.stream, Some(&handle.video));
        }
    }
}

impl Default for MediaCaptureController {
    fn default() -> Self {
        MediaCaptureController::new()
    }
}

impl Drop for MediaCaptureController {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Map a `getUserMedia` rejection onto the capture taxonomy by DOMException
/// name. Unknown names are treated as device trouble.
fn classify_js_error(err: &JsValue) -> CaptureError {
    let (name, message) = match err.dyn_ref::<web_sys::DomException>() {
        Some(exception) => (exception.name(), exception.message()),
        None => (
            String::new(),
            err.as_string().unwrap_or_else(|| "unknown error".to_string()),
        ),
    };
    classify_media_error(&name, &message)
}

fn classify_media_error(name: &str, message: &str) -> CaptureError {
    match name {
        "NotAllowedError" | "PermissionDeniedError" | "SecurityError" => {
            CaptureError::PermissionDenied
        }
        _ => {
            let detail = if message.is_empty() {
                name.to_string()
            } else {
                message.to_string()
            };
            CaptureError::DeviceUnavailable(detail)
        }
    }
}
