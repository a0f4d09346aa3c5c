//! Audio Manager - owns the hidden audio elements and feeds their events into
//! the transport, outside of the component render cycle.

use crate::transport::{PlaybackElement, Transport};
use dioxus::prelude::*;

#[cfg(target_arch = "wasm32")]
use crate::components::{ListenerHandle, PlayerController};
#[cfg(target_arch = "wasm32")]
use crate::transport::MediaEvent;
#[cfg(target_arch = "wasm32")]
use dioxus::core::{Runtime, RuntimeGuard};
#[cfg(target_arch = "wasm32")]
use std::{cell::RefCell, rc::Rc};
#[cfg(target_arch = "wasm32")]
use tracing::{debug, warn};
#[cfg(target_arch = "wasm32")]
use wasm_bindgen::JsCast;
#[cfg(target_arch = "wasm32")]
use web_sys::{window, HtmlAudioElement};

/// Transport over whatever elements this build plays through.
pub type AudioTransport = Transport<Box<dyn PlaybackElement>>;

/// Element ids for the current, next and previous slots.
#[cfg(target_arch = "wasm32")]
const AUDIO_ELEMENT_IDS: [&str; 3] = [
    "archiveplayer-audio",
    "archiveplayer-audio-next",
    "archiveplayer-audio-prev",
];

/// Find or create a hidden audio element with the given id.
#[cfg(target_arch = "wasm32")]
pub fn get_or_create_audio_element(id: &str, preload: &str) -> Option<HtmlAudioElement> {
    let document = window()?.document()?;

    if let Some(existing) = document.get_element_by_id(id) {
        return existing.dyn_into::<HtmlAudioElement>().ok();
    }

    let audio: HtmlAudioElement = document.create_element("audio").ok()?.dyn_into().ok()?;
    audio.set_id(id);
    audio.set_attribute("preload", preload).ok()?;
    document.body()?.append_child(&audio).ok()?;

    Some(audio)
}

#[cfg(target_arch = "wasm32")]
fn web_try_play(audio: &HtmlAudioElement) {
    // Autoplay rejections surface as a missing `play` event.
    if let Ok(promise) = audio.play() {
        wasm_bindgen_futures::spawn_local(async move {
            if wasm_bindgen_futures::JsFuture::from(promise).await.is_err() {
                debug!("play() was rejected");
            }
        });
    }
}

#[cfg(target_arch = "wasm32")]
struct WebAudio {
    audio: HtmlAudioElement,
}

#[cfg(target_arch = "wasm32")]
impl PlaybackElement for WebAudio {
    fn set_source(&mut self, url: &str) {
        self.audio.set_src(url);
    }

    fn clear_source(&mut self) {
        let _ = self.audio.remove_attribute("src");
        self.audio.load();
    }

    fn play(&mut self) {
        web_try_play(&self.audio);
    }

    fn pause(&mut self) {
        let _ = self.audio.pause();
    }

    fn seek(&mut self, seconds: f64) {
        self.audio.set_current_time(seconds);
    }

    fn current_time(&self) -> f64 {
        self.audio.current_time()
    }

    fn duration(&self) -> f64 {
        self.audio.duration()
    }
}

/// Audio controller - no playback element in native builds.
#[cfg(not(target_arch = "wasm32"))]
#[component]
pub fn AudioController() -> Element {
    rsx! {}
}

/// Audio controller - builds the transport and keeps it bound to the session.
#[cfg(target_arch = "wasm32")]
#[component]
pub fn AudioController() -> Element {
    let controller = use_context::<PlayerController>();
    let session = controller.session;
    let settings = controller.settings;
    let mut transport = controller.transport;
    let listeners = use_hook(|| Rc::new(RefCell::new(Vec::<ListenerHandle>::new())));

    let prebuffer = use_memo(move || settings().prebuffer);
    let cursor = use_memo(move || {
        let session = session.read();
        (
            session.generation(),
            session.current_index(),
            session.current_track().map(|track| track.url.clone()),
        )
    });

    // (Re)build the elements when the slot count changes.
    {
        let controller = controller.clone();
        let listeners = listeners.clone();
        use_effect(move || {
            let slot_count = if prebuffer() { 3 } else { 1 };
            let mut installed = listeners.borrow_mut();
            installed.clear();
            if let Some(mut previous) = transport.write().take() {
                previous.clear();
            }

            let runtime = Runtime::current();
            let mut elements: Vec<Box<dyn PlaybackElement>> = Vec::with_capacity(slot_count);
            for (slot, id) in AUDIO_ELEMENT_IDS.iter().take(slot_count).enumerate() {
                let preload = if slot == 0 { "metadata" } else { "auto" };
                let Some(audio) = get_or_create_audio_element(id, preload) else {
                    warn!(id, "could not create audio element");
                    return;
                };
                for event in MediaEvent::ALL {
                    let controller = controller.clone();
                    let runtime = runtime.clone();
                    let handle = ListenerHandle::listen(&audio, event.name(), move |_| {
                        let _guard = RuntimeGuard::new(runtime.clone());
                        controller.handle_media_event(slot, event);
                    });
                    installed.extend(handle);
                }
                elements.push(Box::new(WebAudio { audio }));
            }

            let mut built = match <[Box<dyn PlaybackElement>; 3]>::try_from(elements) {
                Ok([current, next, previous]) => Transport::prebuffered(current, next, previous),
                Err(mut elements) => match elements.pop() {
                    Some(single) => Transport::single(single),
                    None => return,
                },
            };
            {
                let session = session.peek();
                built.sync(session.tracks(), session.current_index());
                built.restore_position(session.current_time());
            }
            debug!(slots = slot_count, "audio transport ready");
            transport.set(Some(built));
        });
    }

    // Follow the session to the current track.
    use_effect(move || {
        let _ = cursor();
        let session = session.peek();
        if let Some(transport) = transport.write().as_mut() {
            transport.sync(session.tracks(), session.current_index());
        }
    });

    use_drop(move || {
        listeners.borrow_mut().clear();
        if let Ok(mut transport) = transport.try_write() {
            if let Some(transport) = transport.as_mut() {
                transport.clear();
            }
        }
    });

    rsx! {}
}
