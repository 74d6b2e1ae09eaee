// Per-step modal markup, derived entirely from the resolved configuration and
// a read-only view of the session. Pure string building: the loader owns the
// DOM write and the event wiring. All dynamic text is escaped.

use crate::config::{ButtonSize, ButtonStyle, WidgetConfig, WidgetSize};
use crate::state::Step;
use crate::types::{CapturedPhoto, Product, TryOnResult};

// Element ids the loader wires handlers to.
pub const CONTAINER_ID: &str = "virtual-tryon-widget-container";
pub const CLOSE_ID: &str = "vto-close";
pub const BACK_ID: &str = "vto-back";
pub const TAKE_PHOTO_ID: &str = "vto-take-photo";
pub const UPLOAD_ID: &str = "vto-upload";
pub const FILE_INPUT_ID: &str = "vto-file-input";
pub const VIDEO_ID: &str = "vto-video";
pub const CANVAS_ID: &str = "vto-canvas";
pub const CAPTURE_ID: &str = "vto-capture";
pub const CANCEL_CAMERA_ID: &str = "vto-cancel-camera";
pub const START_CAMERA_ID: &str = "vto-start-camera";
pub const RETAKE_ID: &str = "vto-retake";
pub const GENERATE_ID: &str = "vto-generate";
pub const TRY_AGAIN_ID: &str = "vto-try-again";

/// Numeric style values derived from the configuration tiers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StyleTokens {
    pub border_radius: u32,
    pub button_padding: &'static str,
    pub button_font_size: u32,
    pub modal_width: u32,
    pub modal_height: u32,
}

impl StyleTokens {
    pub fn from_config(config: &WidgetConfig) -> Self {
        let border_radius = match config.button_style {
            ButtonStyle::Rounded => 24,
            ButtonStyle::Square => 8,
        };
        let (button_padding, button_font_size) = match config.button_size {
            ButtonSize::Large => ("16px 32px", 18),
            ButtonSize::Small => ("8px 16px", 13),
            ButtonSize::Medium => ("13px 19px", 15),
        };
        let (modal_width, modal_height) = match config.widget_size {
            WidgetSize::Large => (480, 700),
            WidgetSize::Small => (340, 480),
            WidgetSize::Medium => (400, 600),
        };
        StyleTokens {
            border_radius,
            button_padding,
            button_font_size,
            modal_width,
            modal_height,
        }
    }
}

/// Read-only snapshot handed to the renderer.
pub struct ViewState<'a> {
    pub config: &'a WidgetConfig,
    pub step: Step,
    pub product: Option<&'a Product>,
    pub photo: Option<&'a CapturedPhoto>,
    pub result: Option<&'a TryOnResult>,
    pub error: Option<&'a str>,
    pub camera_active: bool,
    pub secure_context: bool,
    pub generating: bool,
    pub long_wait: bool,
    pub preview: bool,
}

/// Render the full overlay for the current step.
pub fn render_html(view: &ViewState) -> String {
    let config = view.config;
    let tokens = StyleTokens::from_config(config);

    let body = match view.step {
        Step::Loading => render_loading(view),
        Step::Product => render_product(view, &tokens),
        Step::Photo => render_photo(view, &tokens),
        Step::Preview => render_preview(view, &tokens),
        Step::Processing => render_processing(view),
        Step::Result => render_result(view, &tokens),
        Step::Closed => String::new(),
    };

    let branding = if config.show_branding {
        format!(
            "<div style=\"text-align:center;margin:6px 0 4px 0;font-size:10px;color:{};\">Powered by virtualFit</div>",
            escape_html(&config.text_color)
        )
    } else {
        String::new()
    };

    format!(
        "<div style=\"position:fixed;top:0;left:0;width:100%;height:100%;\
         background-color:rgba(0,0,0,0.6);display:flex;justify-content:center;\
         align-items:center;font-family:{font};\">\
         <div style=\"background-color:{background};border-radius:{radius}px;\
         box-shadow:0 8px 32px rgba(0,0,0,0.18);width:{width}px;height:{height}px;\
         overflow:hidden;display:flex;flex-direction:column;font-size:{font_size};\
         color:{text};\">{header}{body}{branding}</div></div>",
        font = escape_html(&config.font_family),
        background = escape_html(&config.background_color),
        radius = tokens.border_radius,
        width = tokens.modal_width,
        height = tokens.modal_height,
        font_size = escape_html(&config.font_size),
        text = escape_html(&config.text_color),
        header = render_header(view),
        body = body,
        branding = branding,
    )
}

fn render_header(view: &ViewState) -> String {
    let config = view.config;
    let title = match view.step {
        Step::Photo => "Take a Photo".to_string(),
        Step::Preview => "Preview Your Photo".to_string(),
        Step::Processing => "Generating Virtual Try-On".to_string(),
        Step::Result => "Your Try-On Result".to_string(),
        _ => config.title.clone(),
    };
    let back = if view.step == Step::Photo {
        format!(
            "<button id=\"{BACK_ID}\" aria-label=\"Go back\" style=\"background:none;\
             border:none;font-size:28px;cursor:pointer;color:{};padding:4px;\">&#8592;</button>",
            escape_html(&config.text_color)
        )
    } else {
        String::new()
    };
    format!(
        "<div style=\"display:flex;justify-content:space-between;align-items:center;\
         padding:20px 24px;border-bottom:1.5px solid #e5e7eb;color:{primary};\">\
         <div style=\"display:flex;align-items:center;gap:12px;\">{back}\
         <h3 style=\"margin:0;font-size:20px;font-weight:700;color:{primary};\">{title}</h3></div>\
         <button id=\"{CLOSE_ID}\" aria-label=\"Close\" style=\"background:none;border:none;\
         font-size:28px;cursor:pointer;color:{text};padding:4px;\">&#215;</button></div>",
        primary = escape_html(&config.primary_color),
        back = back,
        title = escape_html(&title),
        text = escape_html(&config.text_color),
    )
}

fn spinner(primary_color: &str) -> String {
    format!(
        "<div style=\"width:48px;height:48px;border:6px solid #e5e7eb;\
         border-top:6px solid {};border-radius:50%;margin:0 auto 18px auto;\
         animation:vto-spin 1s linear infinite;\"></div>\
         <style>@keyframes vto-spin{{to{{transform:rotate(360deg);}}}}</style>",
        escape_html(primary_color)
    )
}

fn primary_button(id: &str, label: &str, config: &WidgetConfig, tokens: &StyleTokens, disabled: bool) -> String {
    button(id, label, &config.primary_color, config, tokens, disabled)
}

fn secondary_button(
    id: &str,
    label: &str,
    config: &WidgetConfig,
    tokens: &StyleTokens,
    disabled: bool,
) -> String {
    button(id, label, &config.secondary_color, config, tokens, disabled)
}

fn button(
    id: &str,
    label: &str,
    background: &str,
    config: &WidgetConfig,
    tokens: &StyleTokens,
    disabled: bool,
) -> String {
    format!(
        "<button id=\"{id}\" type=\"button\"{disabled} style=\"background:{background};\
         color:white;font-weight:{weight};border:none;border-radius:{radius}px;\
         padding:{padding};font-size:{font_size}px;cursor:pointer;margin-bottom:8px;\">{label}</button>",
        id = id,
        disabled = if disabled { " disabled" } else { "" },
        background = escape_html(background),
        weight = escape_html(&config.font_weight),
        radius = tokens.border_radius,
        padding = tokens.button_padding,
        font_size = tokens.button_font_size,
        label = escape_html(label),
    )
}

fn error_line(view: &ViewState) -> String {
    match view.error {
        Some(message) => format!(
            "<div style=\"color:{};font-size:14px;text-align:center;margin-top:12px;\
             padding:0 19px;\">{}</div>",
            escape_html(&view.config.secondary_color),
            escape_html(message)
        ),
        None => String::new(),
    }
}

fn file_input() -> String {
    format!(
        "<input id=\"{FILE_INPUT_ID}\" type=\"file\" accept=\"image/*\" style=\"display:none;\"/>"
    )
}

fn render_loading(view: &ViewState) -> String {
    format!(
        "<div style=\"display:flex;flex-direction:column;align-items:center;\
         justify-content:center;flex:1;padding:19px;\">{}\
         <p style=\"margin-top:10px;font-size:16px;\">Loading product...</p></div>",
        spinner(&view.config.primary_color)
    )
}

fn render_product(view: &ViewState, tokens: &StyleTokens) -> String {
    let config = view.config;
    let product_block = match view.product {
        Some(product) => {
            let image = product
                .images
                .first()
                .map(|url| {
                    format!(
                        "<img src=\"{}\" alt=\"{}\" style=\"width:120px;height:120px;\
                         object-fit:cover;border-radius:8px;\"/>",
                        escape_html(url),
                        escape_html(&product.name)
                    )
                })
                .unwrap_or_default();
            format!(
                "{image}<h4 style=\"margin:8px 0 4px 0;font-size:20px;font-weight:600;\">{name}</h4>\
                 <p style=\"margin:0;font-size:18px;font-weight:700;color:{primary};\">{price}</p>\
                 <p style=\"margin:0;font-size:14px;color:{secondary};\">{category}</p>",
                image = image,
                name = escape_html(&product.name),
                primary = escape_html(&config.primary_color),
                price = format_price(product.price),
                secondary = escape_html(&config.secondary_color),
                category = escape_html(&product.category),
            )
        }
        None => String::new(),
    };

    format!(
        "<div style=\"display:flex;flex-direction:column;align-items:center;\
         justify-content:center;padding:19px;gap:10px;flex:1;text-align:center;\">{product_block}</div>\
         <div style=\"display:flex;flex-direction:column;align-items:center;padding:0 19px 12px 19px;\">\
         <div style=\"margin-bottom:10px;text-align:center;\">{subtitle}<br/>\
         <span style=\"color:{secondary};font-size:12px;\">Your photo is processed securely and never stored.</span></div>\
         {take_photo}{upload}{input}</div>{error}",
        product_block = product_block,
        subtitle = escape_html(&config.subtitle),
        secondary = escape_html(&config.secondary_color),
        take_photo = primary_button(TAKE_PHOTO_ID, &config.button_text, config, tokens, view.preview),
        upload = secondary_button(
            UPLOAD_ID,
            &config.upload_button_text,
            config,
            tokens,
            view.preview
        ),
        input = file_input(),
        error = error_line(view),
    )
}

fn render_photo(view: &ViewState, tokens: &StyleTokens) -> String {
    let config = view.config;
    let video_display = if view.camera_active { "block" } else { "none" };
    let video = format!(
        "<video id=\"{VIDEO_ID}\" autoplay playsinline muted style=\"width:100%;\
         max-height:60%;border-radius:8px;border:2px solid #e5e7eb;background-color:#000;\
         object-fit:cover;margin-bottom:16px;display:{video_display};\"></video>\
         <canvas id=\"{CANVAS_ID}\" style=\"display:none;\"></canvas>"
    );

    let controls = if view.camera_active {
        format!(
            "<div style=\"display:flex;gap:16px;justify-content:center;\">{capture}{cancel}</div>",
            capture = primary_button(CAPTURE_ID, "Capture", config, tokens, false),
            cancel = secondary_button(CANCEL_CAMERA_ID, "Cancel", config, tokens, false),
        )
    } else {
        let insecure_warning = if view.secure_context {
            String::new()
        } else {
            format!(
                "<div style=\"color:{};font-size:12px;text-align:center;margin-bottom:8px;\">\
                 Camera access requires a secure connection. Please serve this page over \
                 HTTPS or localhost.</div>",
                escape_html(&config.secondary_color)
            )
        };
        format!(
            "{spinner}{insecure_warning}\
             <div style=\"display:flex;flex-direction:column;align-items:center;\">{start}{upload}{input}</div>",
            spinner = spinner(&config.primary_color),
            insecure_warning = insecure_warning,
            start = primary_button(
                START_CAMERA_ID,
                "Start Camera",
                config,
                tokens,
                !view.secure_context
            ),
            upload = secondary_button(UPLOAD_ID, &config.upload_button_text, config, tokens, false),
            input = file_input(),
        )
    };

    format!(
        "<div style=\"display:flex;flex-direction:column;align-items:center;\
         justify-content:center;flex:1;padding:19px;\">\
         <div style=\"margin-bottom:16px;font-size:14px;text-align:center;\">\
         Please allow camera access to take a photo, or upload a photo from your device.</div>\
         {video}{controls}</div>{error}",
        video = video,
        controls = controls,
        error = error_line(view),
    )
}

fn render_preview(view: &ViewState, tokens: &StyleTokens) -> String {
    let config = view.config;
    let photo = view
        .photo
        .map(|photo| {
            format!(
                "<img src=\"{}\" alt=\"Your photo\" style=\"width:200px;height:200px;\
                 object-fit:cover;border-radius:8px;margin-bottom:16px;\"/>",
                escape_html(photo.data_url())
            )
        })
        .unwrap_or_default();
    let generate_label = if view.generating {
        "Generating..."
    } else {
        "Generate Virtual Try-On"
    };

    format!(
        "<div style=\"margin:16px 0;font-size:14px;text-align:center;\">\
         Review your photo before generating your virtual try-on.</div>\
         <div style=\"display:flex;flex-direction:column;align-items:center;\
         justify-content:center;padding:19px;gap:16px;flex:1;\">{photo}\
         <div style=\"display:flex;gap:16px;justify-content:center;flex-wrap:wrap;\">{retake}{generate}</div>\
         </div>{error}",
        photo = photo,
        retake = secondary_button(RETAKE_ID, "Take Another Photo", config, tokens, false),
        generate = primary_button(GENERATE_ID, generate_label, config, tokens, view.generating),
        error = error_line(view),
    )
}

fn render_processing(view: &ViewState) -> String {
    let config = view.config;
    let tip = if view.long_wait {
        "<div style=\"margin-top:18px;font-size:13px;text-align:center;\">\
         <b>Style Tip:</b> Confidence is the best outfit!<br/>Thank you for your patience.</div>"
            .to_string()
    } else {
        String::new()
    };
    format!(
        "<div style=\"display:flex;flex-direction:column;align-items:center;\
         justify-content:center;flex:1;padding:19px;\">{spinner}\
         <p style=\"margin-top:10px;font-size:16px;text-align:center;\">\
         Creating your virtual try-on image...</p>\
         <p style=\"margin-top:6px;font-size:13px;color:{secondary};text-align:center;\">\
         This may take a few moments</p>{tip}</div>",
        spinner = spinner(&config.primary_color),
        secondary = escape_html(&config.secondary_color),
        tip = tip,
    )
}

fn render_result(view: &ViewState, tokens: &StyleTokens) -> String {
    let config = view.config;
    let image = view
        .result
        .map(|result| {
            format!(
                "<img src=\"{}\" alt=\"Virtual try-on result\" style=\"width:100%;\
                 max-width:300px;border-radius:8px;object-fit:contain;margin-bottom:16px;\"/>",
                escape_html(&result.image)
            )
        })
        .unwrap_or_default();

    format!(
        "<div style=\"margin:16px 0;font-size:14px;text-align:center;\">\
         Here is your virtual try-on result! You can try again or close the widget.</div>\
         <div style=\"display:flex;flex-direction:column;align-items:center;\
         justify-content:center;padding:19px;gap:16px;flex:1;\">{image}\
         <div style=\"display:flex;gap:16px;justify-content:center;flex-wrap:wrap;\">{try_again}{close}</div>\
         </div>",
        image = image,
        try_again = primary_button(TRY_AGAIN_ID, "Try Again", config, tokens, false),
        close = secondary_button(CLOSE_ID, "Close", config, tokens, false),
    )
}

/// Interim markup shown while config and product are still in flight, before
/// the state machine takes over rendering.
pub fn render_bootstrap_html() -> String {
    let defaults = WidgetConfig::default();
    let view = ViewState {
        config: &defaults,
        step: Step::Loading,
        product: None,
        photo: None,
        result: None,
        error: None,
        camera_active: false,
        secure_context: true,
        generating: false,
        long_wait: false,
        preview: false,
    };
    render_html(&view)
}

pub fn format_price(price: f64) -> String {
    format!("${price:.2}")
}

pub fn escape_html(input: &str) -> String {
    let mut escaped = String::with_capacity(input.len());
    for c in input.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#39;"),
            _ => escaped.push(c),
        }
    }
    escaped
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::PhotoSource;

    fn sample_product() -> Product {
        Product {
            id: "p1".into(),
            name: "Denim Jacket".into(),
            price: 59.9,
            category: "Outerwear".into(),
            images: vec!["https://backend.example/api/a.jpg".into()],
        }
    }

    fn view<'a>(config: &'a WidgetConfig, step: Step, product: Option<&'a Product>) -> ViewState<'a> {
        ViewState {
            config,
            step,
            product,
            photo: None,
            result: None,
            error: None,
            camera_active: false,
            secure_context: true,
            generating: false,
            long_wait: false,
            preview: false,
        }
    }

    #[test]
    fn tokens_follow_config_tiers() {
        let config = WidgetConfig::default();
        let tokens = StyleTokens::from_config(&config);
        assert_eq!(tokens.border_radius, 24);
        assert_eq!(tokens.modal_width, 400);
        assert_eq!(tokens.modal_height, 600);

        let mut square_large = WidgetConfig::default();
        square_large.button_style = ButtonStyle::Square;
        square_large.widget_size = WidgetSize::Large;
        square_large.button_size = ButtonSize::Large;
        let tokens = StyleTokens::from_config(&square_large);
        assert_eq!(tokens.border_radius, 8);
        assert_eq!(tokens.modal_width, 480);
        assert_eq!(tokens.button_font_size, 18);
    }

    #[test]
    fn product_step_uses_configured_cta_text() {
        // Scenario: remote config override {"buttonText":"Snap!"}.
        let mut config = WidgetConfig::default();
        config.button_text = "Snap!".to_string();
        let product = sample_product();
        let html = render_html(&view(&config, Step::Product, Some(&product)));
        assert!(html.contains(">Snap!</button>"));
        assert!(html.contains("Denim Jacket"));
        assert!(html.contains("$59.90"));
        assert!(html.contains("Upload a Photo"));
    }

    #[test]
    fn preview_mode_disables_photo_ctas() {
        let config = WidgetConfig::default();
        let product = sample_product();
        let mut state = view(&config, Step::Product, Some(&product));
        state.preview = true;
        let html = render_html(&state);
        assert!(html.contains(&format!("<button id=\"{TAKE_PHOTO_ID}\" type=\"button\" disabled")));
        assert!(html.contains(&format!("<button id=\"{UPLOAD_ID}\" type=\"button\" disabled")));
        assert!(html.contains("Denim Jacket"));
    }

    #[test]
    fn dynamic_text_is_escaped() {
        let config = WidgetConfig::default();
        let mut product = sample_product();
        product.name = "<script>alert(1)</script>".to_string();
        let html = render_html(&view(&config, Step::Product, Some(&product)));
        assert!(!html.contains("<script>"));
        assert!(html.contains("&lt;script&gt;"));
    }

    #[test]
    fn photo_step_offers_upload_fallback_when_camera_inactive() {
        let config = WidgetConfig::default();
        let mut state = view(&config, Step::Photo, None);
        state.error = Some("Camera access was denied. You can upload a photo instead.");
        let html = render_html(&state);
        assert!(html.contains(FILE_INPUT_ID));
        assert!(html.contains(START_CAMERA_ID));
        assert!(html.contains("Camera access was denied"));
        assert!(!html.contains(CAPTURE_ID));
    }

    #[test]
    fn insecure_context_disables_manual_start() {
        let config = WidgetConfig::default();
        let mut state = view(&config, Step::Photo, None);
        state.secure_context = false;
        let html = render_html(&state);
        assert!(html.contains("secure connection"));
        assert!(html.contains(&format!("<button id=\"{START_CAMERA_ID}\" type=\"button\" disabled")));
    }

    #[test]
    fn active_camera_shows_capture_controls() {
        let config = WidgetConfig::default();
        let mut state = view(&config, Step::Photo, None);
        state.camera_active = true;
        let html = render_html(&state);
        assert!(html.contains(CAPTURE_ID));
        assert!(html.contains(CANCEL_CAMERA_ID));
        assert!(html.contains("display:block"));
    }

    #[test]
    fn preview_disables_generate_while_in_flight() {
        let config = WidgetConfig::default();
        let photo = CapturedPhoto::new("data:image/jpeg;base64,AAAA", PhotoSource::Camera);
        let mut state = view(&config, Step::Preview, None);
        state.photo = Some(&photo);
        state.generating = true;
        let html = render_html(&state);
        assert!(html.contains("Generating..."));
        assert!(html.contains(&format!("<button id=\"{GENERATE_ID}\" type=\"button\" disabled")));
    }

    #[test]
    fn processing_reveals_tip_after_long_wait() {
        let config = WidgetConfig::default();
        let mut state = view(&config, Step::Processing, None);
        assert!(!render_html(&state).contains("Style Tip"));
        state.long_wait = true;
        assert!(render_html(&state).contains("Style Tip"));
    }

    #[test]
    fn branding_line_follows_toggle() {
        let mut config = WidgetConfig::default();
        let html = render_html(&view(&config, Step::Loading, None));
        assert!(html.contains("Powered by virtualFit"));

        config.show_branding = false;
        let html = render_html(&view(&config, Step::Loading, None));
        assert!(!html.contains("Powered by"));
    }

    #[test]
    fn result_step_shows_server_image() {
        let config = WidgetConfig::default();
        let result = TryOnResult {
            image: "https://backend.example/result.png".to_string(),
            completed_at: "t".to_string(),
        };
        let mut state = view(&config, Step::Result, None);
        state.result = Some(&result);
        let html = render_html(&state);
        assert!(html.contains("https://backend.example/result.png"));
        assert!(html.contains("Try Again"));
    }
}
