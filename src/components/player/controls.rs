use crate::components::{Icon, PlayerController};
use dioxus::prelude::*;

/// Play/pause button - disabled while the current track is loading
#[component]
pub(super) fn PlayPauseButton() -> Element {
    let controller = use_context::<PlayerController>();
    let (playing, loading, has_source) = controller
        .transport
        .read()
        .as_ref()
        .map(|transport| {
            (
                transport.is_playing() || transport.wants_play(),
                transport.is_loading(),
                transport.active_index().is_some(),
            )
        })
        .unwrap_or((false, false, false));

    rsx! {
        button {
            id: "play-pause-btn",
            r#type: "button",
            class: "control-button control-button-primary",
            aria_label: if playing { "Pause" } else { "Play" },
            disabled: loading || !has_source,
            onclick: move |_| controller.toggle_play(),
            if loading {
                Icon { name: "loader".to_string(), class: "icon".to_string() }
            } else if playing {
                Icon { name: "pause".to_string(), class: "icon".to_string() }
            } else {
                Icon { name: "play".to_string(), class: "icon".to_string() }
            }
        }
    }
}

#[component]
pub(super) fn PrevButton() -> Element {
    let controller = use_context::<PlayerController>();
    let empty = controller.session.read().tracks().is_empty();

    rsx! {
        button {
            id: "prev-btn",
            r#type: "button",
            class: "control-button",
            aria_label: "Previous track",
            disabled: empty,
            onclick: move |_| controller.previous(),
            Icon { name: "prev".to_string(), class: "icon".to_string() }
        }
    }
}

#[component]
pub(super) fn NextButton() -> Element {
    let controller = use_context::<PlayerController>();
    let empty = controller.session.read().tracks().is_empty();

    rsx! {
        button {
            id: "next-btn",
            r#type: "button",
            class: "control-button",
            aria_label: "Next track",
            disabled: empty,
            onclick: move |_| controller.next(),
            Icon { name: "next".to_string(), class: "icon".to_string() }
        }
    }
}

/// Shuffle the whole list and start over at its first track
#[component]
pub(super) fn ShuffleButton() -> Element {
    let controller = use_context::<PlayerController>();
    let few = controller.session.read().tracks().len() < 2;

    rsx! {
        button {
            id: "shuffle-btn",
            r#type: "button",
            class: "control-button",
            aria_label: "Shuffle",
            disabled: few,
            onclick: move |_| controller.shuffle(),
            Icon { name: "shuffle".to_string(), class: "icon".to_string() }
        }
    }
}

#[component]
pub(super) fn ReloadButton() -> Element {
    let controller = use_context::<PlayerController>();
    let loading = controller.status.read().loading;

    rsx! {
        button {
            id: "reload-btn",
            r#type: "button",
            class: "control-button",
            aria_label: "Reload track list",
            disabled: loading,
            onclick: move |_| controller.reload(),
            if loading {
                Icon { name: "loader".to_string(), class: "icon".to_string() }
            } else {
                Icon { name: "refresh".to_string(), class: "icon".to_string() }
            }
        }
    }
}
