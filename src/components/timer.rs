use crate::components::{Icon, PlayerController};
use crate::sleep_timer::{format_clock, format_remaining, next_occurrence, parse_clock};
use chrono::{DateTime, Local};
use dioxus::prelude::*;
use dioxus::core::Task;
use tracing::info;

#[cfg(not(target_arch = "wasm32"))]
async fn tick_delay_ms(ms: u64) {
    tokio::time::sleep(std::time::Duration::from_millis(ms)).await;
}

#[cfg(target_arch = "wasm32")]
async fn tick_delay_ms(ms: u64) {
    gloo_timers::future::TimeoutFuture::new(ms as u32).await;
}

/// Pause playback at a chosen time of day.
#[component]
pub fn SleepTimer() -> Element {
    let controller = use_context::<PlayerController>();
    let mut clock_value = use_signal(|| format_clock(&Local::now()));
    let mut deadline = use_signal(|| None::<DateTime<Local>>);
    let mut remaining = use_signal(String::new);
    let mut ticker = use_signal(|| None::<Task>);

    let mut cancel = move || {
        if let Some(task) = ticker.write().take() {
            task.cancel();
        }
        deadline.set(None);
        remaining.set(String::new());
        clock_value.set(format_clock(&Local::now()));
    };

    let start = move |_: MouseEvent| {
        let Some(at) = parse_clock(&clock_value.peek()) else {
            return;
        };
        let now = Local::now();
        let Some(target) = next_occurrence(&now, at) else {
            return;
        };
        if let Some(task) = ticker.write().take() {
            task.cancel();
        }
        info!(deadline = %target, "sleep timer set");
        deadline.set(Some(target));
        remaining.set(format_remaining(target - now));

        let controller = controller.clone();
        let task = spawn(async move {
            loop {
                tick_delay_ms(1000).await;
                let left = target - Local::now();
                if left.num_seconds() <= 0 {
                    info!("sleep timer elapsed, pausing");
                    controller.pause();
                    ticker.set(None);
                    deadline.set(None);
                    remaining.set(String::new());
                    clock_value.set(format_clock(&Local::now()));
                    break;
                }
                remaining.set(format_remaining(left));
            }
        });
        ticker.set(Some(task));
    };

    rsx! {
        div { class: "sleep-timer",
            Icon { name: "clock".to_string(), class: "icon icon-small".to_string() }
            span { class: "sleep-timer-label", "Sleep timer" }
            if deadline().is_some() {
                span { class: "sleep-timer-remaining", "{remaining}" }
                button {
                    r#type: "button",
                    class: "text-button text-button-danger",
                    onclick: move |_| cancel(),
                    "Cancel"
                }
            } else {
                input {
                    r#type: "time",
                    class: "sleep-timer-input",
                    step: "60",
                    value: "{clock_value}",
                    oninput: move |e: Event<FormData>| clock_value.set(e.value()),
                }
                button {
                    r#type: "button",
                    class: "text-button",
                    onclick: start,
                    "Start"
                }
            }
        }
    }
}
