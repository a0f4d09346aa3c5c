use crate::api::TrackOrder;
use crate::components::PlayerController;
use dioxus::prelude::*;

/// Ordering and title options; changing them refetches the list.
#[component]
pub fn SettingsRow() -> Element {
    let controller = use_context::<PlayerController>();
    let settings = (controller.settings)();

    let order_value = match settings.track_order {
        TrackOrder::NumericPrefix => "numeric",
        TrackOrder::NewestFirst => "newest",
    };

    rsx! {
        div { class: "settings-row",
            label { class: "settings-field",
                span { "Order" }
                select {
                    value: "{order_value}",
                    onchange: {
                        let controller = controller.clone();
                        move |e: Event<FormData>| {
                            let order = match e.value().as_str() {
                                "newest" => TrackOrder::NewestFirst,
                                _ => TrackOrder::NumericPrefix,
                            };
                            controller.update_settings(|settings| settings.track_order = order);
                        }
                    },
                    option {
                        value: "numeric",
                        selected: settings.track_order == TrackOrder::NumericPrefix,
                        {TrackOrder::NumericPrefix.label()}
                    }
                    option {
                        value: "newest",
                        selected: settings.track_order == TrackOrder::NewestFirst,
                        {TrackOrder::NewestFirst.label()}
                    }
                }
            }
            label { class: "settings-field",
                input {
                    r#type: "checkbox",
                    checked: settings.numbered_titles,
                    onchange: {
                        let controller = controller.clone();
                        move |_| {
                            controller.update_settings(|settings| {
                                settings.numbered_titles = !settings.numbered_titles
                            });
                        }
                    },
                }
                span { "Numbered titles" }
            }
            label { class: "settings-field",
                input {
                    r#type: "checkbox",
                    checked: settings.prebuffer,
                    onchange: move |_| {
                        controller.update_settings(|settings| settings.prebuffer = !settings.prebuffer);
                    },
                }
                span { "Preload neighbours" }
            }
        }
    }
}
