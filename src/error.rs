// Typed errors with thiserror. Messages are end-user facing: they are rendered
// inside the widget modal, never thrown into the host page.

use thiserror::Error;

/// Camera-acquisition and frame-capture errors.
///
/// Every variant except `NotReady` is surfaced in the photo step together with
/// the upload fallback; `NotReady` is a retryable internal condition.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CaptureError {
    #[error("Camera access requires a secure context (HTTPS or localhost)")]
    InsecureContext,

    #[error("Camera access was denied. You can upload a photo instead.")]
    PermissionDenied,

    #[error("Camera is unavailable: {0}")]
    DeviceUnavailable(String),

    /// The stream has not produced a frame yet. Treated as a no-op by callers.
    #[error("Camera is still warming up")]
    NotReady,
}

/// Errors from the tenant backend.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ApiError {
    /// Soft failure: callers fall back to the compiled-in default config.
    #[error("Configuration fetch failed: {0}")]
    ConfigFetch(String),

    #[error("Failed to load product details")]
    ProductFetch(String),

    /// Network errors, non-2xx responses and malformed bodies are collapsed
    /// into this one variant; retry is a user action, never automatic.
    #[error("Failed to generate virtual try-on image")]
    GenerationFailed(String),
}
