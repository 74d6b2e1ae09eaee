// Tenant presentation/behavior configuration. Every field has a compiled-in
// default, so a partial or failed remote fetch can never leave a field unset.
// The merge is field-wise: remote values override only the keys they include.

use serde::{Deserialize, Serialize};

/// Button corner treatment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ButtonStyle {
    Rounded,
    Square,
}

/// Button sizing tier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ButtonSize {
    Small,
    Medium,
    Large,
}

/// Modal sizing tier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WidgetSize {
    Small,
    Medium,
    Large,
}

/// Complete widget configuration. Immutable once resolved for a session.
/// Wire format is camelCase, matching the dashboard's save/load pair.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct WidgetConfig {
    pub primary_color: String,
    pub secondary_color: String,
    pub background_color: String,
    pub text_color: String,
    pub font_family: String,
    pub font_size: String,
    pub font_weight: String,
    pub button_style: ButtonStyle,
    pub button_size: ButtonSize,
    pub button_text: String,
    pub upload_button_text: String,
    pub widget_size: WidgetSize,
    pub position: String,
    pub title: String,
    pub subtitle: String,
    pub call_to_action: String,
    pub show_branding: bool,
    pub enable_ar: bool,
    pub enable_sharing: bool,
    pub animation_type: String,
    pub animation_speed: String,
}

impl Default for WidgetConfig {
    fn default() -> Self {
        WidgetConfig {
            primary_color: "#667eea".to_string(),
            secondary_color: "#ff6b6b".to_string(),
            background_color: "#ffffff".to_string(),
            text_color: "#333333".to_string(),
            font_family: "Inter".to_string(),
            font_size: "16px".to_string(),
            font_weight: "500".to_string(),
            button_style: ButtonStyle::Rounded,
            button_size: ButtonSize::Medium,
            button_text: "Take a Photo".to_string(),
            upload_button_text: "Upload a Photo".to_string(),
            widget_size: WidgetSize::Medium,
            position: "bottom-right".to_string(),
            title: "Virtual Try-On".to_string(),
            subtitle: "See how it looks on you".to_string(),
            call_to_action: "Start your virtual fitting".to_string(),
            show_branding: true,
            enable_ar: true,
            enable_sharing: false,
            animation_type: "fade".to_string(),
            animation_speed: "normal".to_string(),
        }
    }
}

/// Partial configuration document as returned by the tenant config endpoint.
/// Absent keys keep their defaults; present keys override them.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ConfigOverrides {
    pub primary_color: Option<String>,
    pub secondary_color: Option<String>,
    pub background_color: Option<String>,
    pub text_color: Option<String>,
    pub font_family: Option<String>,
    pub font_size: Option<String>,
    pub font_weight: Option<String>,
    pub button_style: Option<ButtonStyle>,
    pub button_size: Option<ButtonSize>,
    pub button_text: Option<String>,
    pub upload_button_text: Option<String>,
    pub widget_size: Option<WidgetSize>,
    pub position: Option<String>,
    pub title: Option<String>,
    pub subtitle: Option<String>,
    pub call_to_action: Option<String>,
    pub show_branding: Option<bool>,
    pub enable_ar: Option<bool>,
    pub enable_sharing: Option<bool>,
    pub animation_type: Option<String>,
    pub animation_speed: Option<String>,
}

impl WidgetConfig {
    /// Apply a partial remote document over this configuration, key by key.
    pub fn merged(mut self, overrides: ConfigOverrides) -> WidgetConfig {
        if let Some(v) = overrides.primary_color {
            self.primary_color = v;
        }
        if let Some(v) = overrides.secondary_color {
            self.secondary_color = v;
        }
        if let Some(v) = overrides.background_color {
            self.background_color = v;
        }
        if let Some(v) = overrides.text_color {
            self.text_color = v;
        }
        if let Some(v) = overrides.font_family {
            self.font_family = v;
        }
        if let Some(v) = overrides.font_size {
            self.font_size = v;
        }
        if let Some(v) = overrides.font_weight {
            self.font_weight = v;
        }
        if let Some(v) = overrides.button_style {
            self.button_style = v;
        }
        if let Some(v) = overrides.button_size {
            self.button_size = v;
        }
        if let Some(v) = overrides.button_text {
            self.button_text = v;
        }
        if let Some(v) = overrides.upload_button_text {
            self.upload_button_text = v;
        }
        if let Some(v) = overrides.widget_size {
            self.widget_size = v;
        }
        if let Some(v) = overrides.position {
            self.position = v;
        }
        if let Some(v) = overrides.title {
            self.title = v;
        }
        if let Some(v) = overrides.subtitle {
            self.subtitle = v;
        }
        if let Some(v) = overrides.call_to_action {
            self.call_to_action = v;
        }
        if let Some(v) = overrides.show_branding {
            self.show_branding = v;
        }
        if let Some(v) = overrides.enable_ar {
            self.enable_ar = v;
        }
        if let Some(v) = overrides.enable_sharing {
            self.enable_sharing = v;
        }
        if let Some(v) = overrides.animation_type {
            self.animation_type = v;
        }
        if let Some(v) = overrides.animation_speed {
            self.animation_speed = v;
        }
        self
    }
}
