// Mount manager and browser plumbing. One widget instance exists at a time;
// every mount bumps a global epoch, and async completions check the epoch
// before touching state so work started by a destroyed instance is dropped.

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use js_sys::Function;
use serde_json::json;
use wasm_bindgen::closure::Closure;
use wasm_bindgen::{JsCast, JsValue};
use wasm_bindgen_futures::spawn_local;
use web_sys::{
    Document, File, FileReader, HtmlCanvasElement, HtmlDivElement, HtmlElement, HtmlInputElement,
    HtmlVideoElement,
};

use crate::analytics::{AnalyticsEvent, AnalyticsSink};
use crate::api::{ApiClient, DEFAULT_BACKEND_URL};
use crate::config::WidgetConfig;
use crate::error::CaptureError;
use crate::media::{self, MediaCaptureController};
use crate::render::{
    render_bootstrap_html, render_html, ViewState, BACK_ID, CANCEL_CAMERA_ID, CANVAS_ID,
    CAPTURE_ID, CLOSE_ID, CONTAINER_ID, FILE_INPUT_ID, GENERATE_ID, RETAKE_ID, START_CAMERA_ID,
    TAKE_PHOTO_ID, TRY_AGAIN_ID, UPLOAD_ID, VIDEO_ID,
};
use crate::state::{Command, Step, TryOnStateMachine, WidgetEvent};
use crate::types::{CapturedPhoto, PhotoSource};

/// Auto-init waits briefly so the host page finishes its own DOM work first.
const AUTO_INIT_DELAY_MS: i32 = 100;

/// After this long on the processing step a reassuring tip is shown.
const LONG_WAIT_TIP_MS: i32 = 5000;

thread_local! {
    static ACTIVE: RefCell<Option<ActiveWidget>> = const { RefCell::new(None) };
    static EPOCH: Cell<u64> = const { Cell::new(0) };
}

struct ActiveWidget {
    epoch: u64,
    container: HtmlDivElement,
    runtime: Rc<RefCell<Runtime>>,
}

/// Options accepted by `VirtualTryOnWidget.init`. `position` and `theme` are
/// part of the embed contract; presentation currently derives from the remote
/// configuration, with `position` applied over it when given. `previewMode`
/// mounts the widget with a synthesized product and photo acquisition
/// disabled, for dashboard preview embeds.
pub struct InitOptions {
    pub api_key: String,
    pub product_id: String,
    pub backend_url: Option<String>,
    pub position: Option<String>,
    pub theme: Option<String>,
    pub preview_mode: bool,
    pub on_try_on_complete: Option<Function>,
    pub on_close: Option<Function>,
}

impl InitOptions {
    /// Read an options object passed from JS. `apiKey` and `productId` are
    /// required and must be non-empty strings.
    pub fn from_js(value: &JsValue) -> Result<InitOptions, JsValue> {
        let api_key = string_prop(value, "apiKey")
            .filter(|s| !s.is_empty())
            .ok_or_else(|| JsValue::from_str("VirtualTryOnWidget.init: apiKey is required"))?;
        let product_id = string_prop(value, "productId")
            .filter(|s| !s.is_empty())
            .ok_or_else(|| JsValue::from_str("VirtualTryOnWidget.init: productId is required"))?;
        Ok(InitOptions {
            api_key,
            product_id,
            backend_url: string_prop(value, "backendUrl"),
            position: string_prop(value, "position"),
            theme: string_prop(value, "theme"),
            preview_mode: bool_prop(value, "previewMode"),
            on_try_on_complete: function_prop(value, "onTryOnComplete"),
            on_close: function_prop(value, "onClose"),
        })
    }
}

fn string_prop(obj: &JsValue, key: &str) -> Option<String> {
    js_sys::Reflect::get(obj, &JsValue::from_str(key))
        .ok()
        .and_then(|v| v.as_string())
}

fn bool_prop(obj: &JsValue, key: &str) -> bool {
    js_sys::Reflect::get(obj, &JsValue::from_str(key))
        .ok()
        .and_then(|v| v.as_bool())
        .unwrap_or(false)
}

fn function_prop(obj: &JsValue, key: &str) -> Option<Function> {
    js_sys::Reflect::get(obj, &JsValue::from_str(key))
        .ok()
        .and_then(|v| v.dyn_into::<Function>().ok())
}

/// Everything one mounted instance owns. Held behind `Rc<RefCell<..>>` so the
/// event closures, the async completions and the command runner all see the
/// same state.
pub(crate) struct Runtime {
    epoch: u64,
    product_id: String,
    position: Option<String>,
    on_try_on_complete: Option<Function>,
    on_close: Option<Function>,
    api: ApiClient,
    analytics: AnalyticsSink,
    config: WidgetConfig,
    product: Option<crate::types::Product>,
    machine: TryOnStateMachine,
    media: MediaCaptureController,
    long_wait: bool,
}

/// Mount the widget. Any already-mounted instance is destroyed first, so two
/// `init` calls in a row leave exactly one container in the page. Returns a
/// handle object whose `destroy` tears the instance down.
pub fn init_widget(options: InitOptions) -> JsValue {
    if let Err(err) = mount(options) {
        web_sys::console::error_2(&JsValue::from_str("VirtualTryOnWidget.init failed"), &err);
    }
    widget_handle()
}

/// Tear down the mounted instance: stop the camera, remove the container,
/// clear the singleton slot. Safe to call when nothing is mounted. The host's
/// `onClose` is not invoked here; it fires only on widget-initiated close, so
/// a re-init never reports a close the user did not perform.
pub fn destroy() {
    let active = ACTIVE.with(|slot| slot.borrow_mut().take());
    let Some(widget) = active else {
        return;
    };
    widget.runtime.borrow_mut().media.stop();
    widget.container.remove();
    web_sys::console::debug_1(&JsValue::from_str("VirtualTryOnWidget destroyed"));
}

fn mount(options: InitOptions) -> Result<(), JsValue> {
    destroy();

    let window = web_sys::window().ok_or_else(|| JsValue::from_str("no window"))?;
    let document = window
        .document()
        .ok_or_else(|| JsValue::from_str("no document"))?;
    let body = document
        .body()
        .ok_or_else(|| JsValue::from_str("document has no body"))?;

    let container: HtmlDivElement = document.create_element("div")?.dyn_into()?;
    container.set_id(CONTAINER_ID);
    container.set_attribute(
        "style",
        "position:fixed;top:0;left:0;width:100vw;height:100vh;z-index:2147483647;",
    )?;
    container.set_inner_html(&render_bootstrap_html());
    body.append_child(&container)?;

    let epoch = EPOCH.with(|e| {
        let next = e.get() + 1;
        e.set(next);
        next
    });

    let base_url = options
        .backend_url
        .as_deref()
        .unwrap_or(DEFAULT_BACKEND_URL);
    let runtime = Rc::new(RefCell::new(Runtime {
        epoch,
        product_id: options.product_id,
        position: options.position,
        on_try_on_complete: options.on_try_on_complete,
        on_close: options.on_close,
        api: ApiClient::new(base_url, &options.api_key),
        analytics: AnalyticsSink::new(base_url, &options.api_key),
        config: WidgetConfig::default(),
        product: None,
        machine: if options.preview_mode {
            TryOnStateMachine::preview()
        } else {
            TryOnStateMachine::new()
        },
        media: MediaCaptureController::new(),
        long_wait: false,
    }));

    ACTIVE.with(|slot| {
        *slot.borrow_mut() = Some(ActiveWidget {
            epoch,
            container,
            runtime: runtime.clone(),
        });
    });

    web_sys::console::debug_1(&JsValue::from_str("VirtualTryOnWidget mounted"));
    track(&runtime, AnalyticsEvent::WidgetOpened);
    wire_handlers(&runtime);

    spawn_local(boot(runtime, epoch));
    Ok(())
}

/// Resolve the session config and product, then hand control to the machine.
/// A failed product load still opens the widget with a visible message.
/// Preview sessions skip the product fetch and use a synthesized record.
async fn boot(rt: Rc<RefCell<Runtime>>, epoch: u64) {
    let (api, product_id, position, preview) = {
        let r = rt.borrow();
        (
            r.api.clone(),
            r.product_id.clone(),
            r.position.clone(),
            r.machine.is_preview(),
        )
    };

    let mut config = api.resolve_config().await;
    if !is_current(epoch) {
        return;
    }
    if let Some(position) = position {
        config.position = position;
    }

    let (product, error) = if preview {
        (Some(preview_product(&product_id)), None)
    } else {
        let fetched = api.fetch_product(&product_id).await;
        if !is_current(epoch) {
            return;
        }
        let error = fetched.as_ref().err().map(|e| e.to_string());
        (fetched.ok(), error)
    };

    {
        let mut r = rt.borrow_mut();
        r.config = config;
        r.product = product;
    }
    dispatch(&rt, WidgetEvent::SessionLoaded { error });
}

/// Stand-in product record for preview embeds; nothing is fetched or billed.
fn preview_product(product_id: &str) -> crate::types::Product {
    crate::types::Product {
        id: product_id.to_string(),
        name: "Sample Product".to_string(),
        price: 29.99,
        category: "Preview".to_string(),
        images: Vec::new(),
    }
}

fn is_current(epoch: u64) -> bool {
    ACTIVE.with(|slot| {
        slot.borrow()
            .as_ref()
            .map(|w| w.epoch == epoch)
            .unwrap_or(false)
    })
}

/// Feed one event into the machine and execute the commands it returns.
pub(crate) fn dispatch(rt: &Rc<RefCell<Runtime>>, event: WidgetEvent) {
    let commands = rt.borrow_mut().machine.apply(event);
    for command in commands {
        match command {
            Command::Render => render(rt),
            Command::StartCamera => start_camera(rt),
            Command::StopCamera => rt.borrow_mut().media.stop(),
            Command::SubmitGeneration => submit_generation(rt),
            Command::NotifyComplete => notify_complete(rt),
            Command::Track(event) => track(rt, event),
            Command::Teardown => {
                let on_close = rt.borrow().on_close.clone();
                destroy();
                if let Some(callback) = on_close {
                    let _ = callback.call0(&JsValue::NULL);
                }
            }
        }
    }
}

fn render(rt: &Rc<RefCell<Runtime>>) {
    {
        let mut r = rt.borrow_mut();
        if r.machine.step() != Step::Processing {
            r.long_wait = false;
        }
    }
    let html = {
        let r = rt.borrow();
        let view = ViewState {
            config: &r.config,
            step: r.machine.step(),
            product: r.product.as_ref(),
            photo: r.machine.photo(),
            result: r.machine.result(),
            error: r.machine.error(),
            camera_active: r.media.is_active(),
            secure_context: secure_context(),
            generating: r.machine.is_generating(),
            long_wait: r.long_wait,
            preview: r.machine.is_preview(),
        };
        render_html(&view)
    };
    let container = ACTIVE.with(|slot| slot.borrow().as_ref().map(|w| w.container.clone()));
    if let Some(container) = container {
        container.set_inner_html(&html);
    }
    wire_handlers(rt);

    // The markup was rebuilt; a live stream must feed the new video element.
    if rt.borrow().media.is_active() {
        if let Some(video) = element::<HtmlVideoElement>(VIDEO_ID) {
            rt.borrow_mut().media.reattach(&video);
        }
    }
}

fn secure_context() -> bool {
    web_sys::window()
        .map(|w| w.is_secure_context())
        .unwrap_or(false)
}

/// Attach click handlers for whichever controls the current markup contains.
/// Handlers for absent elements are simply skipped, so one wiring pass covers
/// every step.
fn wire_handlers(rt: &Rc<RefCell<Runtime>>) {
    let Some(document) = web_sys::window().and_then(|w| w.document()) else {
        return;
    };

    on_click(&document, CLOSE_ID, rt, WidgetEvent::CloseRequested);
    on_click(&document, BACK_ID, rt, WidgetEvent::BackRequested);
    on_click(&document, TAKE_PHOTO_ID, rt, WidgetEvent::CaptureRequested);
    on_click(&document, START_CAMERA_ID, rt, WidgetEvent::CaptureRequested);
    on_click(&document, CANCEL_CAMERA_ID, rt, WidgetEvent::CameraCancelled);
    on_click(&document, RETAKE_ID, rt, WidgetEvent::RetakeRequested);
    on_click(&document, GENERATE_ID, rt, WidgetEvent::GenerateRequested);
    on_click(&document, TRY_AGAIN_ID, rt, WidgetEvent::TryAgainRequested);

    wire_upload_button(&document, rt);
    wire_file_input(&document, rt);
    wire_capture_button(&document, rt);
}

fn on_click(document: &Document, id: &str, rt: &Rc<RefCell<Runtime>>, event: WidgetEvent) {
    let Some(element) = clickable(document, id) else {
        return;
    };
    let rt = rt.clone();
    let callback = Closure::<dyn FnMut()>::wrap(Box::new(move || {
        dispatch(&rt, event.clone());
    }));
    element.set_onclick(Some(callback.as_ref().unchecked_ref()));
    callback.forget();
}

fn clickable(document: &Document, id: &str) -> Option<HtmlElement> {
    document
        .get_element_by_id(id)?
        .dyn_into::<HtmlElement>()
        .ok()
}

/// The upload CTA opens the hidden file picker.
fn wire_upload_button(document: &Document, rt: &Rc<RefCell<Runtime>>) {
    let Some(button) = clickable(document, UPLOAD_ID) else {
        return;
    };
    let rt = rt.clone();
    let callback = Closure::<dyn FnMut()>::wrap(Box::new(move || {
        track(&rt, AnalyticsEvent::PhotoUploadStarted);
        if let Some(input) = element::<HtmlElement>(FILE_INPUT_ID) {
            input.click();
        }
    }));
    button.set_onclick(Some(callback.as_ref().unchecked_ref()));
    callback.forget();
}

fn wire_file_input(document: &Document, rt: &Rc<RefCell<Runtime>>) {
    let Some(input) = document
        .get_element_by_id(FILE_INPUT_ID)
        .and_then(|e| e.dyn_into::<HtmlInputElement>().ok())
    else {
        return;
    };
    let rt = rt.clone();
    let input_for_read = input.clone();
    let callback = Closure::<dyn FnMut()>::wrap(Box::new(move || {
        let Some(file) = input_for_read.files().and_then(|list| list.get(0)) else {
            return;
        };
        read_file_as_photo(rt.clone(), file);
    }));
    input.set_onchange(Some(callback.as_ref().unchecked_ref()));
    callback.forget();
}

/// Read an uploaded file into a data URL and feed it to the machine.
fn read_file_as_photo(rt: Rc<RefCell<Runtime>>, file: File) {
    let Ok(reader) = FileReader::new() else {
        return;
    };
    let reader_for_result = reader.clone();
    let onload = Closure::<dyn FnMut()>::wrap(Box::new(move || {
        let Ok(value) = reader_for_result.result() else {
            return;
        };
        let Some(data_url) = value.as_string() else {
            return;
        };
        dispatch(
            &rt,
            WidgetEvent::PhotoReady {
                photo: CapturedPhoto::new(data_url, PhotoSource::Upload),
            },
        );
    }));
    reader.set_onload(Some(onload.as_ref().unchecked_ref()));
    onload.forget();
    let _ = reader.read_as_data_url(&file);
}

fn wire_capture_button(document: &Document, rt: &Rc<RefCell<Runtime>>) {
    let Some(button) = clickable(document, CAPTURE_ID) else {
        return;
    };
    let rt = rt.clone();
    let callback = Closure::<dyn FnMut()>::wrap(Box::new(move || {
        let captured = {
            let r = rt.borrow();
            let video = element::<HtmlVideoElement>(VIDEO_ID);
            let canvas = element::<HtmlCanvasElement>(CANVAS_ID);
            match (video, canvas) {
                (Some(video), Some(canvas)) => r.media.capture_frame(&video, &canvas),
                _ => return,
            }
        };
        match captured {
            Ok(photo) => dispatch(&rt, WidgetEvent::PhotoReady { photo }),
            // The stream has no frame yet; the button stays live.
            Err(CaptureError::NotReady) => {}
            Err(err) => dispatch(
                &rt,
                WidgetEvent::CameraFailed {
                    message: err.to_string(),
                },
            ),
        }
    }));
    button.set_onclick(Some(callback.as_ref().unchecked_ref()));
    callback.forget();
}

fn element<T: JsCast>(id: &str) -> Option<T> {
    web_sys::window()?
        .document()?
        .get_element_by_id(id)?
        .dyn_into::<T>()
        .ok()
}

/// Acquire the camera for the video element of the current markup. The stream
/// is stopped on the spot if the instance was destroyed or navigated away
/// while permission was pending.
fn start_camera(rt: &Rc<RefCell<Runtime>>) {
    let epoch = rt.borrow().epoch;
    let rt = rt.clone();
    spawn_local(async move {
        let Some(video) = element::<HtmlVideoElement>(VIDEO_ID) else {
            return;
        };
        match media::open_stream(&video).await {
            Ok(stream) => {
                if !is_current(epoch) || rt.borrow().machine.step() != Step::Photo {
                    media::stop_stream(&stream, Some(&video));
                    return;
                }
                rt.borrow_mut().media.adopt(stream, &video);
                render(&rt);
            }
            Err(err) => {
                if !is_current(epoch) {
                    return;
                }
                dispatch(
                    &rt,
                    WidgetEvent::CameraFailed {
                        message: err.to_string(),
                    },
                );
            }
        }
    });
}

/// Submit the generation request. The completion is dropped unless the same
/// instance is still on the processing step when it settles.
fn submit_generation(rt: &Rc<RefCell<Runtime>>) {
    let (api, product_id, photo, epoch) = {
        let r = rt.borrow();
        let Some(photo) = r.machine.photo() else {
            return;
        };
        (
            r.api.clone(),
            r.product_id.clone(),
            photo.data_url().to_string(),
            r.epoch,
        )
    };
    schedule_long_wait_tip(rt, epoch);

    let rt = rt.clone();
    spawn_local(async move {
        let timestamp = now_iso();
        let outcome = api.generate(&product_id, &photo, &timestamp).await;
        if !is_current(epoch) || rt.borrow().machine.step() != Step::Processing {
            return;
        }
        match outcome {
            Ok(result) => dispatch(&rt, WidgetEvent::GenerationSucceeded { result }),
            Err(err) => dispatch(
                &rt,
                WidgetEvent::GenerationFailed {
                    message: err.to_string(),
                },
            ),
        }
    });
}

fn schedule_long_wait_tip(rt: &Rc<RefCell<Runtime>>, epoch: u64) {
    let Some(window) = web_sys::window() else {
        return;
    };
    let rt = rt.clone();
    let callback = Closure::once(move || {
        if !is_current(epoch) || rt.borrow().machine.step() != Step::Processing {
            return;
        }
        rt.borrow_mut().long_wait = true;
        render(&rt);
    });
    let _ = window.set_timeout_with_callback_and_timeout_and_arguments_0(
        callback.as_ref().unchecked_ref(),
        LONG_WAIT_TIP_MS,
    );
    callback.forget();
}

fn now_iso() -> String {
    js_sys::Date::new_0()
        .to_iso_string()
        .as_string()
        .unwrap_or_default()
}

/// Hand the finished result to the host's `onTryOnComplete` callback.
fn notify_complete(rt: &Rc<RefCell<Runtime>>) {
    let (callback, payload) = {
        let r = rt.borrow();
        let Some(result) = r.machine.result() else {
            return;
        };
        let payload = js_sys::Object::new();
        let _ = js_sys::Reflect::set(
            &payload,
            &JsValue::from_str("resultImage"),
            &JsValue::from_str(&result.image),
        );
        let _ = js_sys::Reflect::set(
            &payload,
            &JsValue::from_str("timestamp"),
            &JsValue::from_str(&result.completed_at),
        );
        (r.on_try_on_complete.clone(), JsValue::from(payload))
    };
    if let Some(callback) = callback {
        let _ = callback.call1(&JsValue::NULL, &payload);
    }
}

fn track(rt: &Rc<RefCell<Runtime>>, event: AnalyticsEvent) {
    let r = rt.borrow();
    let mut extra = json!({ "productId": r.product_id });
    if event == AnalyticsEvent::ErrorEvent {
        if let (Some(object), Some(message)) = (extra.as_object_mut(), r.machine.error()) {
            object.insert("message".to_string(), json!(message));
        }
    }
    r.analytics.track(event, extra);
}

/// Install `window.VirtualTryOnWidget` with `init` and `destroy`.
pub fn install_global_api() -> Result<(), JsValue> {
    let Some(window) = web_sys::window() else {
        return Ok(());
    };

    let api = js_sys::Object::new();

    let init = Closure::<dyn FnMut(JsValue) -> JsValue>::wrap(Box::new(|options: JsValue| {
        match InitOptions::from_js(&options) {
            Ok(options) => init_widget(options),
            Err(err) => {
                web_sys::console::error_1(&err);
                JsValue::UNDEFINED
            }
        }
    }));
    js_sys::Reflect::set(&api, &JsValue::from_str("init"), init.as_ref())?;
    init.forget();

    let destroy_fn = Closure::<dyn FnMut()>::wrap(Box::new(destroy));
    js_sys::Reflect::set(&api, &JsValue::from_str("destroy"), destroy_fn.as_ref())?;
    destroy_fn.forget();

    js_sys::Reflect::set(&window, &JsValue::from_str("VirtualTryOnWidget"), &api)?;
    Ok(())
}

fn widget_handle() -> JsValue {
    let handle = js_sys::Object::new();
    let destroy_fn = Closure::<dyn FnMut()>::wrap(Box::new(destroy));
    let _ = js_sys::Reflect::set(&handle, &JsValue::from_str("destroy"), destroy_fn.as_ref());
    destroy_fn.forget();
    handle.into()
}

/// Script-tag embedding: a `<script>` carrying `data-api-key` and
/// `data-product-id` mounts the widget on its own, after a short deferral.
pub fn auto_init_from_script_tag() {
    let Some(document) = web_sys::window().and_then(|w| w.document()) else {
        return;
    };
    let script = document
        .current_script()
        .map(web_sys::Element::from)
        .or_else(|| {
            document
                .query_selector("script[data-api-key][data-product-id]")
                .ok()
                .flatten()
        });
    let Some(script) = script else {
        return;
    };
    let (Some(api_key), Some(product_id)) = (
        script.get_attribute("data-api-key"),
        script.get_attribute("data-product-id"),
    ) else {
        return;
    };

    let options = InitOptions {
        api_key,
        product_id,
        backend_url: script.get_attribute("data-backend-url"),
        position: script.get_attribute("data-position"),
        theme: None,
        preview_mode: false,
        on_try_on_complete: None,
        on_close: None,
    };

    let Some(window) = web_sys::window() else {
        return;
    };
    let callback = Closure::once(move || {
        let _ = init_widget(options);
    });
    let _ = window.set_timeout_with_callback_and_timeout_and_arguments_0(
        callback.as_ref().unchecked_ref(),
        AUTO_INIT_DELAY_MS,
    );
    callback.forget();
}
