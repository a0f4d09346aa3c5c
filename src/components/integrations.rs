//! Browser integrations around the player: OS media session, screen wake
//! lock, scrolling the active row, keyboard shortcuts and flushing the
//! session when the page goes away. Native builds render nothing.

use dioxus::prelude::*;

#[cfg(target_arch = "wasm32")]
use crate::components::PlayerController;
#[cfg(target_arch = "wasm32")]
use dioxus::core::{Runtime, RuntimeGuard};
#[cfg(target_arch = "wasm32")]
use std::{cell::RefCell, rc::Rc};
#[cfg(target_arch = "wasm32")]
use tracing::debug;
#[cfg(target_arch = "wasm32")]
use wasm_bindgen::{closure::Closure, JsCast, JsValue};
#[cfg(target_arch = "wasm32")]
use web_sys::{window, EventTarget, KeyboardEvent};

#[cfg_attr(not(target_arch = "wasm32"), allow(dead_code))]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShortcutAction {
    TogglePlay,
    Next,
    Previous,
}

/// The parts of a key press the shortcut mapping looks at.
#[cfg_attr(not(target_arch = "wasm32"), allow(dead_code))]
#[derive(Debug, Clone, Default, PartialEq)]
pub struct KeyInput {
    pub key: String,
    pub code: String,
    pub key_code: u32,
    pub ctrl: bool,
    pub meta: bool,
    pub alt: bool,
    pub shift: bool,
}

#[cfg_attr(not(target_arch = "wasm32"), allow(dead_code))]
pub fn shortcut_action(input: &KeyInput) -> Option<ShortcutAction> {
    let key = input.key.as_str();
    let code = input.code.as_str();

    if matches!(
        key,
        "MediaTrackNext" | "MediaNextTrack" | "AudioTrackNext" | "AudioNext" | "NextTrack" | "F9"
    ) || code == "MediaTrackNext"
        || input.key_code == 176
    {
        return Some(ShortcutAction::Next);
    }
    if matches!(
        key,
        "MediaTrackPrevious"
            | "MediaPreviousTrack"
            | "AudioTrackPrevious"
            | "AudioPrev"
            | "PreviousTrack"
            | "F7"
    ) || code == "MediaTrackPrevious"
        || input.key_code == 177
    {
        return Some(ShortcutAction::Previous);
    }
    if matches!(key, "MediaPlayPause" | "AudioPlay" | "AudioPause" | "F8")
        || code == "MediaPlayPause"
        || input.key_code == 179
    {
        return Some(ShortcutAction::TogglePlay);
    }

    if (input.ctrl || input.meta) && !input.alt && !input.shift {
        match key {
            "ArrowRight" => return Some(ShortcutAction::Next),
            "ArrowLeft" => return Some(ShortcutAction::Previous),
            _ => {}
        }
    }

    if !input.ctrl && !input.meta && !input.alt && (key == " " || key == "Spacebar" || code == "Space") {
        return Some(ShortcutAction::TogglePlay);
    }

    None
}

/// DOM id of a track row.
pub fn track_row_id(index: usize) -> String {
    format!("track-row-{index}")
}

/// Event listener that is removed again when dropped.
#[cfg(target_arch = "wasm32")]
pub(crate) struct ListenerHandle {
    target: EventTarget,
    event: &'static str,
    callback: Closure<dyn FnMut(web_sys::Event)>,
}

#[cfg(target_arch = "wasm32")]
impl ListenerHandle {
    pub(crate) fn listen<F>(target: &EventTarget, event: &'static str, handler: F) -> Option<Self>
    where
        F: FnMut(web_sys::Event) + 'static,
    {
        let callback = Closure::wrap(Box::new(handler) as Box<dyn FnMut(web_sys::Event)>);
        target
            .add_event_listener_with_callback(event, callback.as_ref().unchecked_ref())
            .ok()?;
        Some(Self {
            target: target.clone(),
            event,
            callback,
        })
    }
}

#[cfg(target_arch = "wasm32")]
impl Drop for ListenerHandle {
    fn drop(&mut self) {
        let _ = self
            .target
            .remove_event_listener_with_callback(self.event, self.callback.as_ref().unchecked_ref());
    }
}

#[cfg(target_arch = "wasm32")]
fn is_editable_shortcut_target(event: &KeyboardEvent) -> bool {
    let Some(target) = event.target() else {
        return false;
    };

    let mut current = target.dyn_into::<web_sys::Element>().ok();
    while let Some(element) = current {
        let tag = element.tag_name().to_ascii_lowercase();
        if tag == "input" || tag == "textarea" || tag == "select" {
            return true;
        }
        if element
            .get_attribute("contenteditable")
            .is_some_and(|value| !value.eq_ignore_ascii_case("false"))
        {
            return true;
        }
        current = element.parent_element();
    }

    false
}

#[cfg(target_arch = "wasm32")]
fn shortcut_from_event(event: &KeyboardEvent) -> Option<ShortcutAction> {
    if event.default_prevented() || event.is_composing() || is_editable_shortcut_target(event) {
        return None;
    }
    shortcut_action(&KeyInput {
        key: event.key(),
        code: event.code(),
        key_code: event.key_code(),
        ctrl: event.ctrl_key(),
        meta: event.meta_key(),
        alt: event.alt_key(),
        shift: event.shift_key(),
    })
}

#[cfg(target_arch = "wasm32")]
fn js_get(target: &JsValue, key: &str) -> Option<JsValue> {
    js_sys::Reflect::get(target, &JsValue::from_str(key))
        .ok()
        .filter(|value| !value.is_undefined() && !value.is_null())
}

#[cfg(target_arch = "wasm32")]
fn media_session() -> Option<JsValue> {
    let navigator = window()?.navigator();
    js_get(&navigator, "mediaSession")
}

#[cfg(target_arch = "wasm32")]
const MEDIA_ACTIONS: [&str; 4] = ["play", "pause", "nexttrack", "previoustrack"];

/// Action handlers currently registered with the media session.
#[cfg(target_arch = "wasm32")]
#[derive(Default)]
struct MediaActionHandlers {
    handlers: Vec<Closure<dyn FnMut()>>,
}

#[cfg(target_arch = "wasm32")]
impl MediaActionHandlers {
    fn bind(&mut self, controller: &PlayerController) {
        self.release();
        let Some(session) = media_session() else {
            return;
        };
        let Some(set_handler) = js_get(&session, "setActionHandler")
            .and_then(|value| value.dyn_into::<js_sys::Function>().ok())
        else {
            return;
        };

        let runtime = Runtime::current();
        for action in MEDIA_ACTIONS {
            let controller = controller.clone();
            let runtime = runtime.clone();
            let handler = Closure::wrap(Box::new(move || {
                let _guard = RuntimeGuard::new(runtime.clone());
                match action {
                    "play" => controller.play(),
                    "pause" => controller.pause(),
                    "nexttrack" => controller.next(),
                    _ => controller.previous(),
                }
            }) as Box<dyn FnMut()>);
            // Browsers throw for actions they do not support.
            let _ = set_handler.call2(&session, &JsValue::from_str(action), handler.as_ref());
            self.handlers.push(handler);
        }
    }

    fn release(&mut self) {
        if self.handlers.is_empty() {
            return;
        }
        if let Some(session) = media_session() {
            if let Some(set_handler) = js_get(&session, "setActionHandler")
                .and_then(|value| value.dyn_into::<js_sys::Function>().ok())
            {
                for action in MEDIA_ACTIONS {
                    let _ = set_handler.call2(&session, &JsValue::from_str(action), &JsValue::NULL);
                }
            }
        }
        self.handlers.clear();
    }
}

#[cfg(target_arch = "wasm32")]
fn publish_media_metadata(title: &str, artist: &str, artwork: Option<&str>) {
    let Some(session) = media_session() else {
        return;
    };
    let Some(win) = window() else {
        return;
    };
    let Some(constructor) = js_get(&win, "MediaMetadata")
        .and_then(|value| value.dyn_into::<js_sys::Function>().ok())
    else {
        return;
    };

    let init = js_sys::Object::new();
    let _ = js_sys::Reflect::set(&init, &"title".into(), &JsValue::from_str(title));
    let _ = js_sys::Reflect::set(&init, &"artist".into(), &JsValue::from_str(artist));
    let artwork_list = js_sys::Array::new();
    if let Some(src) = artwork.filter(|src| !src.trim().is_empty()) {
        let entry = js_sys::Object::new();
        let _ = js_sys::Reflect::set(&entry, &"src".into(), &JsValue::from_str(src));
        artwork_list.push(&entry);
    }
    let _ = js_sys::Reflect::set(&init, &"artwork".into(), &artwork_list);

    if let Ok(metadata) = js_sys::Reflect::construct(&constructor, &js_sys::Array::of1(&init)) {
        let _ = js_sys::Reflect::set(&session, &"metadata".into(), &metadata);
    }
}

#[cfg(target_arch = "wasm32")]
thread_local! {
    static WAKE_LOCK: RefCell<Option<JsValue>> = const { RefCell::new(None) };
}

/// Ask the browser to keep the screen on. Does nothing while a lock is held.
#[cfg(target_arch = "wasm32")]
pub fn request_wake_lock() {
    let held = WAKE_LOCK.with(|slot| {
        slot.borrow().as_ref().is_some_and(|sentinel| {
            sentinel.is_truthy()
                && !js_get(sentinel, "released").is_some_and(|released| released.is_truthy())
        })
    });
    if held {
        return;
    }
    let Some(navigator) = window().map(|w| w.navigator()) else {
        return;
    };
    let Some(wake_lock) = js_get(&navigator, "wakeLock") else {
        return;
    };
    let Some(request) = js_get(&wake_lock, "request")
        .and_then(|value| value.dyn_into::<js_sys::Function>().ok())
    else {
        return;
    };
    let Ok(promise) = request.call1(&wake_lock, &JsValue::from_str("screen")) else {
        return;
    };
    let Ok(promise) = promise.dyn_into::<js_sys::Promise>() else {
        return;
    };
    // Mark as pending so a burst of play events issues one request.
    WAKE_LOCK.with(|slot| *slot.borrow_mut() = Some(JsValue::TRUE));
    wasm_bindgen_futures::spawn_local(async move {
        let sentinel = wasm_bindgen_futures::JsFuture::from(promise).await.ok();
        if sentinel.is_none() {
            debug!("wake lock request rejected");
        }
        WAKE_LOCK.with(|slot| *slot.borrow_mut() = sentinel);
    });
}

#[cfg(not(target_arch = "wasm32"))]
pub fn request_wake_lock() {}

/// Smoothly center the row of `index` inside its scroll container.
#[cfg(target_arch = "wasm32")]
pub fn scroll_track_into_view(index: usize) {
    let Some(document) = window().and_then(|w| w.document()) else {
        return;
    };
    let Some(row) = document.get_element_by_id(&track_row_id(index)) else {
        return;
    };
    let options = web_sys::ScrollIntoViewOptions::new();
    options.set_behavior(web_sys::ScrollBehavior::Smooth);
    options.set_block(web_sys::ScrollLogicalPosition::Center);
    row.scroll_into_view_with_scroll_into_view_options(&options);
}

#[cfg(not(target_arch = "wasm32"))]
#[component]
pub fn Integrations() -> Element {
    rsx! {}
}

#[cfg(target_arch = "wasm32")]
#[component]
pub fn Integrations() -> Element {
    let controller = use_context::<PlayerController>();
    let session = controller.session;
    let settings = controller.settings;
    let listeners = use_hook(|| Rc::new(RefCell::new(Vec::<ListenerHandle>::new())));
    let media_handlers = use_hook(|| Rc::new(RefCell::new(MediaActionHandlers::default())));

    let now_playing = use_memo(move || {
        let session = session.read();
        (
            session.current_index(),
            session.current_track().map(|track| track.title.clone()),
            session.loaded_identifier().to_string(),
        )
    });

    // Media session metadata follows the current track.
    {
        let controller = controller.clone();
        let media_handlers = media_handlers.clone();
        use_effect(move || {
            let (_, title, identifier) = now_playing();
            let settings = settings();
            let Some(title) = title else {
                return;
            };
            publish_media_metadata(
                &title,
                &settings.media_artist(&identifier),
                settings.artwork_url.as_deref(),
            );
            media_handlers.borrow_mut().bind(&controller);
        });
    }

    use_effect(move || {
        let (index, _, _) = now_playing();
        scroll_track_into_view(index);
    });

    // Document-level listeners, installed once.
    {
        let controller = controller.clone();
        let listeners = listeners.clone();
        use_effect(move || {
            let Some(win) = window() else {
                return;
            };
            let Some(document) = win.document() else {
                return;
            };
            let runtime = Runtime::current();
            let mut installed = listeners.borrow_mut();
            installed.clear();

            let keys = {
                let controller = controller.clone();
                let runtime = runtime.clone();
                ListenerHandle::listen(&document, "keydown", move |event| {
                    let Ok(event) = event.dyn_into::<KeyboardEvent>() else {
                        return;
                    };
                    let Some(action) = shortcut_from_event(&event) else {
                        return;
                    };
                    event.prevent_default();
                    let _guard = RuntimeGuard::new(runtime.clone());
                    match action {
                        ShortcutAction::TogglePlay => controller.toggle_play(),
                        ShortcutAction::Next => controller.next(),
                        ShortcutAction::Previous => controller.previous(),
                    }
                })
            };

            let visibility = {
                let controller = controller.clone();
                let runtime = runtime.clone();
                let document_for_state = document.clone();
                ListenerHandle::listen(&document, "visibilitychange", move |_| {
                    if document_for_state.visibility_state() == web_sys::VisibilityState::Hidden {
                        let _guard = RuntimeGuard::new(runtime.clone());
                        controller.flush();
                    }
                })
            };

            let page_hide = {
                let controller = controller.clone();
                let runtime = runtime.clone();
                ListenerHandle::listen(&win, "pagehide", move |_| {
                    let _guard = RuntimeGuard::new(runtime.clone());
                    controller.flush();
                })
            };

            installed.extend([keys, visibility, page_hide].into_iter().flatten());
            debug!(count = installed.len(), "page listeners installed");
        });
    }

    use_drop(move || {
        listeners.borrow_mut().clear();
        media_handlers.borrow_mut().release();
    });

    rsx! {}
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(key: &str) -> KeyInput {
        KeyInput {
            key: key.to_string(),
            ..KeyInput::default()
        }
    }

    #[test]
    fn media_keys_map_to_actions() {
        assert_eq!(shortcut_action(&key("MediaTrackNext")), Some(ShortcutAction::Next));
        assert_eq!(shortcut_action(&key("MediaPreviousTrack")), Some(ShortcutAction::Previous));
        assert_eq!(shortcut_action(&key("MediaPlayPause")), Some(ShortcutAction::TogglePlay));

        let legacy = KeyInput {
            key_code: 176,
            ..KeyInput::default()
        };
        assert_eq!(shortcut_action(&legacy), Some(ShortcutAction::Next));
    }

    #[test]
    fn arrows_need_ctrl_or_cmd_alone() {
        assert_eq!(shortcut_action(&key("ArrowRight")), None);

        let mut input = key("ArrowRight");
        input.ctrl = true;
        assert_eq!(shortcut_action(&input), Some(ShortcutAction::Next));

        input.shift = true;
        assert_eq!(shortcut_action(&input), None);

        let mut input = key("ArrowLeft");
        input.meta = true;
        assert_eq!(shortcut_action(&input), Some(ShortcutAction::Previous));
    }

    #[test]
    fn space_toggles_without_modifiers() {
        assert_eq!(shortcut_action(&key(" ")), Some(ShortcutAction::TogglePlay));

        let mut input = key(" ");
        input.alt = true;
        assert_eq!(shortcut_action(&input), None);

        assert_eq!(shortcut_action(&key("a")), None);
    }

    #[test]
    fn row_ids_are_stable() {
        assert_eq!(track_row_id(0), "track-row-0");
        assert_eq!(track_row_id(12), "track-row-12");
    }
}
