use crate::api::ArchiveClient;
use crate::components::{
    request_wake_lock, AudioController, AudioTransport, Integrations, Player, SettingsRow,
    SleepTimer, TrackList,
};
use crate::db::{
    load_settings, open_platform_store, save_settings, KeyValueStore, MemoryStore, PlayerSettings,
};
use crate::session::{RestoreOutcome, SessionStore};
use crate::transport::{MediaEvent, TransportNotice};
use dioxus::prelude::*;
use std::rc::Rc;
use tracing::{debug, error, warn};

/// Catalog request state shown above the track list.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LoadStatus {
    pub loading: bool,
    pub error: Option<String>,
}

impl LoadStatus {
    fn playback_failed(&mut self, message: String) {
        self.error = Some(message);
    }

    /// A track is playing again, so an earlier playback failure is stale.
    /// Returns whether anything was cleared.
    fn playback_started(&mut self) -> bool {
        self.error.take().is_some()
    }
}

/// Handle to the player state; every user and element action goes through it.
#[derive(Clone)]
pub struct PlayerController {
    pub session: Signal<SessionStore>,
    pub transport: Signal<Option<AudioTransport>>,
    pub settings: Signal<PlayerSettings>,
    pub status: Signal<LoadStatus>,
    store: Rc<dyn KeyValueStore>,
}

impl PlayerController {
    pub fn toggle_play(&self) {
        let mut transport = self.transport;
        if let Some(transport) = transport.write().as_mut() {
            transport.toggle_play();
        };
    }

    pub fn play(&self) {
        let mut transport = self.transport;
        if let Some(transport) = transport.write().as_mut() {
            transport.play();
        };
    }

    pub fn pause(&self) {
        let mut transport = self.transport;
        if let Some(transport) = transport.write().as_mut() {
            transport.pause();
        }
        self.flush();
    }

    pub fn next(&self) {
        let mut session = self.session;
        session.write().step(1);
    }

    pub fn previous(&self) {
        let mut session = self.session;
        session.write().step(-1);
    }

    /// Jump to a row and play it.
    pub fn select(&self, index: usize) {
        let mut session = self.session;
        if !session.write().select(index) {
            return;
        }
        self.sync_transport();
        self.play();
    }

    /// Bind the session's current track now instead of waiting for the
    /// cursor effect, which does not fire when the index stays the same.
    fn sync_transport(&self) {
        let session = self.session.peek();
        let mut transport = self.transport;
        if let Some(transport) = transport.write().as_mut() {
            transport.sync(session.tracks(), session.current_index());
        };
    }

    pub fn shuffle(&self) {
        let mut session = self.session;
        session.write().shuffle_tracks();
    }

    pub fn scrub(&self, seconds: f64) {
        let mut transport = self.transport;
        if let Some(transport) = transport.write().as_mut() {
            transport.scrub(seconds);
        };
    }

    pub fn commit_scrub(&self, seconds: f64) {
        let mut transport = self.transport;
        if let Some(transport) = transport.write().as_mut() {
            transport.commit_scrub(seconds);
        }
        let mut session = self.session;
        let mut session = session.write();
        session.set_current_time(seconds);
        session.flush();
    }

    /// Write the latest position now.
    pub fn flush(&self) {
        let position = self
            .transport
            .peek()
            .as_ref()
            .filter(|transport| transport.active_index().is_some())
            .map(|transport| transport.position());
        let mut session = self.session;
        let mut session = session.write();
        if let Some(position) = position {
            session.set_current_time(position);
        }
        session.flush();
    }

    /// Fetch the catalog of `identifier` and make it the session.
    pub fn load_identifier(&self, identifier: &str) {
        let identifier = identifier.trim().to_string();
        if identifier.is_empty() {
            return;
        }
        let mut session = self.session;
        let mut status = self.status;
        let ticket = {
            let mut session = session.write();
            session.set_identifier(&identifier);
            session.begin_fetch()
        };
        status.set(LoadStatus {
            loading: true,
            error: None,
        });

        let client = ArchiveClient::new(self.settings.peek().catalog_options());
        spawn(async move {
            let load = client.load_catalog(&identifier).await;
            if session.write().apply_fetch(ticket, &identifier, load.tracks) {
                status.set(LoadStatus {
                    loading: false,
                    error: load.error,
                });
            }
        });
    }

    pub fn reload(&self) {
        let identifier = self.session.peek().identifier().to_string();
        self.load_identifier(&identifier);
    }

    /// Apply a settings change, persist it and refetch when the catalog
    /// would come out differently.
    pub fn update_settings(&self, change: impl FnOnce(&mut PlayerSettings)) {
        let mut settings = self.settings;
        let before = settings.peek().catalog_options();
        let updated = {
            let mut settings = settings.write();
            change(&mut settings);
            settings.clone()
        };
        if let Err(err) = save_settings(&*self.store, &updated) {
            warn!(%err, "failed to save settings");
        }
        if updated.catalog_options() != before {
            self.reload();
        }
    }

    pub fn handle_media_event(&self, slot: usize, event: MediaEvent) {
        let mut transport = self.transport;
        let notice = transport
            .write()
            .as_mut()
            .and_then(|transport| transport.handle(slot, event));
        let Some(notice) = notice else {
            return;
        };

        match notice {
            TransportNotice::Advance => {
                debug!("track ended, advancing");
                self.next();
                // A one-track list lands on the same index.
                self.sync_transport();
            }
            TransportNotice::Position(seconds) => {
                let mut session = self.session;
                session.write().set_current_time(seconds);
            }
            TransportNotice::Started => {
                let mut status = self.status;
                if status.peek().error.is_some() {
                    status.write().playback_started();
                }
                request_wake_lock();
            }
            TransportNotice::Stopped => self.flush(),
            TransportNotice::Duration(_) => {}
            TransportNotice::Failed(message) => {
                error!(%message, "playback failed");
                let mut status = self.status;
                status.write().playback_failed(message);
            }
        }
    }
}

fn open_store() -> Rc<dyn KeyValueStore> {
    match open_platform_store() {
        Ok(store) => Rc::from(store),
        Err(err) => {
            error!(%err, "storage unavailable, nothing will be kept");
            Rc::new(MemoryStore::default())
        }
    }
}

#[component]
pub fn PlayerShell() -> Element {
    let store = use_hook(open_store);
    let settings = use_signal({
        let store = store.clone();
        move || load_settings(&*store)
    });
    let (session, outcome) = use_hook({
        let store = store.clone();
        move || {
            let fallback = settings.peek().default_identifier.clone();
            let (session, outcome) = SessionStore::restore(Box::new(store), &fallback);
            (Signal::new(session), outcome)
        }
    });
    let transport = use_signal(|| None::<AudioTransport>);
    let status = use_signal(|| LoadStatus {
        loading: outcome.needs_fetch(),
        error: None,
    });

    let controller = use_context_provider(|| PlayerController {
        session,
        transport,
        settings,
        status,
        store: store.clone(),
    });

    // Fetch once on startup when nothing usable was restored.
    {
        let controller = controller.clone();
        use_effect(move || {
            if outcome.needs_fetch() {
                controller.reload();
            } else if outcome == RestoreOutcome::Repaired {
                debug!("restored session needed repair");
            }
        });
    }

    rsx! {
        div { class: "app-container",
            main { class: "page-shell",
                IdentifierHeader {}
                Player {}
                SleepTimer {}
                SettingsRow {}
                TrackList {}
            }
        }

        // Audio controller - manages playback separately from UI
        AudioController {}
        Integrations {}
    }
}

/// Editable identifier; committing it loads that item.
#[component]
fn IdentifierHeader() -> Element {
    let controller = use_context::<PlayerController>();
    let session = controller.session;
    let current = session.read().identifier().to_string();
    let mut draft = use_signal(|| None::<String>);
    let shown = draft().unwrap_or_else(|| current.clone());

    let commit = {
        let controller = controller.clone();
        move || {
            let Some(value) = draft.peek().clone() else {
                return;
            };
            draft.set(None);
            let value = value.trim().to_string();
            if !value.is_empty() && value != *session.peek().identifier() {
                controller.load_identifier(&value);
            }
        }
    };

    rsx! {
        header { class: "identifier-header",
            span { class: "identifier-label", "archive.org/details/" }
            input {
                class: "identifier-input",
                r#type: "text",
                spellcheck: false,
                aria_label: "Archive item identifier",
                value: "{shown}",
                oninput: move |e: Event<FormData>| draft.set(Some(e.value())),
                onkeydown: {
                    let mut commit = commit.clone();
                    move |e: KeyboardEvent| match e.key() {
                        Key::Enter => commit(),
                        Key::Escape => draft.set(None),
                        _ => {}
                    }
                },
                onblur: {
                    let mut commit = commit.clone();
                    move |_| commit()
                },
            }
        }
    }
}
