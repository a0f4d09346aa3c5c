use crate::components::PlayerController;
use crate::transport::Phase;
use crate::utils::format_duration;
use dioxus::prelude::*;

mod controls;

use controls::{NextButton, PlayPauseButton, PrevButton, ReloadButton, ShuffleButton};

/// Now playing line, seek bar and transport buttons.
#[component]
pub fn Player() -> Element {
    let controller = use_context::<PlayerController>();
    let session_signal = controller.session;
    let transport_signal = controller.transport;
    let session = session_signal.read();
    let transport = transport_signal.read();

    let total = session.tracks().len();
    let title = session
        .current_track()
        .map(|track| track.title.clone())
        .unwrap_or_else(|| "Nothing loaded".to_string());
    let position = if total > 0 {
        format!("{}/{}", session.current_index() + 1, total)
    } else {
        "0/0".to_string()
    };

    let (current_time, duration, scrubbing) = match transport.as_ref() {
        Some(transport) if transport.phase() != Phase::Idle => (
            transport.display_time(),
            transport.duration(),
            transport.is_scrubbing(),
        ),
        // No element yet (or none at all natively): show the stored position.
        _ => (session.current_time(), f64::NAN, false),
    };
    let seekable = duration.is_finite() && duration > 0.0;
    let max = if seekable { duration } else { 0.0 };
    let value = current_time.min(max);
    let elapsed_label = format_duration(current_time);
    let duration_label = format_duration(duration);

    let on_seek_input = {
        let controller = controller.clone();
        move |e: Event<FormData>| {
            if let Ok(seconds) = e.value().parse::<f64>() {
                controller.scrub(seconds);
            }
        }
    };

    let on_seek_commit = {
        let controller = controller.clone();
        move |e: Event<FormData>| {
            if let Ok(seconds) = e.value().parse::<f64>() {
                controller.commit_scrub(seconds);
            }
        }
    };

    rsx! {
        section { class: "player",
            div { class: "now-playing",
                span { class: "now-playing-title", "{title}" }
                span { class: "now-playing-position", "{position}" }
            }
            div { class: "seek-row",
                span { class: "seek-time", "{elapsed_label}" }
                input {
                    r#type: "range",
                    class: if scrubbing { "seek-bar seek-bar-scrubbing" } else { "seek-bar" },
                    min: "0",
                    max: "{max}",
                    step: "any",
                    disabled: !seekable,
                    value: "{value}",
                    oninput: on_seek_input,
                    onchange: on_seek_commit,
                }
                span { class: "seek-time", "{duration_label}" }
            }
            div { class: "controls",
                ReloadButton {}
                PrevButton {}
                PlayPauseButton {}
                NextButton {}
                ShuffleButton {}
            }
        }
    }
}
