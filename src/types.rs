// Shared domain types. Session payloads (photo, result) are replaced, never
// mutated; the product record is read-only after load.

use serde::{Deserialize, Serialize};

/// Where a captured photo came from. Drives which analytics event is emitted
/// and which step transitions accept it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PhotoSource {
    Camera,
    Upload,
}

/// An opaque encoded image payload (data URL) owned by the current session.
/// Retaking produces a new value; closing the widget discards it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CapturedPhoto {
    data_url: String,
    source: PhotoSource,
}

impl CapturedPhoto {
    pub fn new(data_url: impl Into<String>, source: PhotoSource) -> Self {
        CapturedPhoto {
            data_url: data_url.into(),
            source,
        }
    }

    pub fn data_url(&self) -> &str {
        &self.data_url
    }

    pub fn source(&self) -> PhotoSource {
        self.source
    }
}

/// A generated try-on image. One exists per generation attempt; a new attempt
/// replaces the previous one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TryOnResult {
    pub image: String,
    pub completed_at: String,
}

/// Tenant product record, loaded once per widget session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Product {
    pub id: String,
    pub name: String,
    pub price: f64,
    #[serde(default)]
    pub category: String,
    #[serde(default)]
    pub images: Vec<String>,
}

impl Product {
    /// Rewrite relative image paths to absolute URLs under `{base}/api/`.
    /// The backend returns paths like `/product-images/x.jpg`.
    pub fn absolutize_images(&mut self, base_url: &str) {
        for image in &mut self.images {
            *image = absolute_image_url(base_url, image);
        }
    }
}

/// Prepend the backend base, stripping at most one leading slash from the
/// stored path. Already-absolute URLs are left untouched.
pub fn absolute_image_url(base_url: &str, path: &str) -> String {
    if path.starts_with("http://") || path.starts_with("https://") || path.starts_with("data:") {
        return path.to_string();
    }
    let clean = path.strip_prefix('/').unwrap_or(path);
    format!("{}/api/{}", base_url.trim_end_matches('/'), clean)
}
