use crate::components::{track_row_id, Icon, PlayerController};
use dioxus::prelude::*;

#[component]
pub fn TrackList() -> Element {
    let controller = use_context::<PlayerController>();
    let session_signal = controller.session;
    let status_signal = controller.status;
    // Position updates should not re-render every row.
    let cursor = use_memo(move || {
        let session = session_signal.read();
        (session.generation(), session.current_index())
    });
    let (_, current_index) = cursor();
    let session = session_signal.peek();
    let status = status_signal.read();

    let rows: Vec<(usize, usize, String)> = session
        .tracks()
        .iter()
        .enumerate()
        .map(|(index, track)| (index, index + 1, track.title.clone()))
        .collect();

    rsx! {
        section { class: "track-list-section",
            if let Some(error) = status.error.clone() {
                p { class: "load-error", role: "alert", "{error}" }
            }
            if status.loading {
                div { class: "list-state",
                    Icon { name: "loader".to_string(), class: "icon".to_string() }
                    span { "Loading tracks..." }
                }
            } else if rows.is_empty() {
                div { class: "list-state", "Track list is empty." }
            } else {
                ol { class: "track-list",
                    for (index, number, title) in rows {
                        li {
                            key: "{index}",
                            id: track_row_id(index),
                            class: if index == current_index { "track-row track-row-active" } else { "track-row" },
                            onclick: {
                                let controller = controller.clone();
                                move |_| controller.select(index)
                            },
                            span { class: "track-number", "{number}" }
                            span { class: "track-title", "{title}" }
                            if index == current_index {
                                Icon { name: "music".to_string(), class: "icon icon-small".to_string() }
                            }
                        }
                    }
                }
            }
        }
    }
}
