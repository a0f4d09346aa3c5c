//! Playback session: which catalog is loaded, which track is current and how
//! far into it we are.
//!
//! [`SessionStore`] is the only writer of the persisted session blob. Every
//! change of identifier, track list or index is written through immediately;
//! the playback position is written once it has moved by a second or more and
//! whenever [`SessionStore::flush`] is called. A newly entered identifier stays
//! pending, and out of storage, until its catalog is applied.

use crate::api::Track;
use crate::db::{load_json, save_json, KeyValueStore, SESSION_KEY};
use crate::utils::{circular_index, shuffle};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

const TIME_PERSIST_STEP_SECS: f64 = 1.0;

/// Snapshot stored under [`SESSION_KEY`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct SessionState {
    #[serde(default)]
    pub identifier: String,
    #[serde(default)]
    pub tracks: Vec<Track>,
    #[serde(default)]
    pub current_index: usize,
    #[serde(default)]
    pub current_time: f64,
}

impl SessionState {
    pub fn current_track(&self) -> Option<&Track> {
        self.tracks.get(self.current_index)
    }

    /// Bring a restored snapshot back within its invariants. Returns whether
    /// anything had to change.
    fn repair(&mut self) -> bool {
        let mut repaired = false;
        if !self.current_time.is_finite() || self.current_time < 0.0 {
            self.current_time = 0.0;
            repaired = true;
        }
        if self.tracks.is_empty() {
            if self.current_index != 0 {
                self.current_index = 0;
                repaired = true;
            }
        } else if self.current_index >= self.tracks.len() {
            // The position belonged to a track that no longer exists.
            self.current_index = 0;
            self.current_time = 0.0;
            repaired = true;
        }
        repaired
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RestoreOutcome {
    /// Nothing usable was stored.
    ColdStart,
    /// A session exists but has no tracks yet.
    NeedsFetch,
    Restored,
    /// Restored after clamping an out-of-range index or a bad position.
    Repaired,
}

impl RestoreOutcome {
    pub fn needs_fetch(self) -> bool {
        matches!(self, Self::ColdStart | Self::NeedsFetch)
    }
}

/// Sequence number handed out per catalog request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct FetchTicket(u64);

pub struct SessionStore {
    state: SessionState,
    store: Box<dyn KeyValueStore>,
    pending_identifier: Option<String>,
    generation: u64,
    latest_ticket: u64,
    persisted_time: f64,
}

impl SessionStore {
    /// Empty session for `identifier`; nothing is written until the first change.
    pub fn new(store: Box<dyn KeyValueStore>, identifier: &str) -> Self {
        Self {
            state: SessionState {
                identifier: identifier.trim().to_string(),
                ..SessionState::default()
            },
            store,
            pending_identifier: None,
            generation: 0,
            latest_ticket: 0,
            persisted_time: 0.0,
        }
    }

    /// Load the persisted session, or start empty on `fallback_identifier`.
    pub fn restore(
        store: Box<dyn KeyValueStore>,
        fallback_identifier: &str,
    ) -> (Self, RestoreOutcome) {
        let Some(mut state) = load_json::<SessionState>(store.as_ref(), SESSION_KEY) else {
            info!("no stored session, starting cold");
            return (Self::new(store, fallback_identifier), RestoreOutcome::ColdStart);
        };

        let repaired = state.repair();
        if state.identifier.trim().is_empty() {
            state.identifier = fallback_identifier.trim().to_string();
        }
        let outcome = if state.tracks.is_empty() {
            RestoreOutcome::NeedsFetch
        } else if repaired {
            RestoreOutcome::Repaired
        } else {
            RestoreOutcome::Restored
        };
        info!(
            identifier = %state.identifier,
            tracks = state.tracks.len(),
            index = state.current_index,
            ?outcome,
            "session restored"
        );

        let persisted_time = state.current_time;
        let mut session = Self {
            state,
            store,
            pending_identifier: None,
            generation: 0,
            latest_ticket: 0,
            persisted_time,
        };
        if repaired {
            session.persist();
        }
        (session, outcome)
    }

    pub fn state(&self) -> &SessionState {
        &self.state
    }

    /// The identifier being shown: the pending one while its catalog loads.
    pub fn identifier(&self) -> &str {
        self.pending_identifier
            .as_deref()
            .unwrap_or(&self.state.identifier)
    }

    /// The identifier the current track list belongs to.
    pub fn loaded_identifier(&self) -> &str {
        &self.state.identifier
    }

    pub fn tracks(&self) -> &[Track] {
        &self.state.tracks
    }

    pub fn current_index(&self) -> usize {
        self.state.current_index
    }

    pub fn current_time(&self) -> f64 {
        self.state.current_time
    }

    pub fn current_track(&self) -> Option<&Track> {
        self.state.current_track()
    }

    /// Bumped whenever the track list is replaced or reordered.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Switch to another item. The stored snapshot keeps the old identifier
    /// next to the old tracks until [`apply_fetch`](Self::apply_fetch) brings
    /// the new catalog.
    pub fn set_identifier(&mut self, identifier: &str) {
        let identifier = identifier.trim();
        if identifier == self.state.identifier {
            self.pending_identifier = None;
        } else {
            self.pending_identifier = Some(identifier.to_string());
        }
    }

    /// Swap in a new catalog and start over at its first track.
    pub fn replace_tracks(&mut self, tracks: Vec<Track>) {
        self.state.tracks = tracks;
        self.state.current_index = 0;
        self.state.current_time = 0.0;
        self.generation += 1;
        self.persist();
    }

    /// Jump to `index`. Out-of-range indices are ignored.
    pub fn select(&mut self, index: usize) -> bool {
        if index >= self.state.tracks.len() {
            return false;
        }
        if index != self.state.current_index {
            self.state.current_index = index;
            self.state.current_time = 0.0;
            self.persist();
        }
        true
    }

    /// Move by `delta` tracks with wraparound; returns the new index.
    pub fn step(&mut self, delta: i64) -> usize {
        let len = self.state.tracks.len();
        if len == 0 {
            return 0;
        }
        let next = circular_index(self.state.current_index, delta, len);
        self.state.current_index = next;
        self.state.current_time = 0.0;
        self.persist();
        next
    }

    pub fn shuffle_tracks(&mut self) {
        if self.state.tracks.is_empty() {
            return;
        }
        let shuffled = shuffle(&self.state.tracks);
        self.replace_tracks(shuffled);
    }

    pub fn set_current_time(&mut self, seconds: f64) {
        if !seconds.is_finite() || seconds < 0.0 {
            return;
        }
        self.state.current_time = seconds;
        if (seconds - self.persisted_time).abs() >= TIME_PERSIST_STEP_SECS {
            self.persist();
        }
    }

    /// Write the position even if it moved less than the usual step.
    pub fn flush(&mut self) {
        if self.state.current_time != self.persisted_time {
            self.persist();
        }
    }

    pub fn persist(&mut self) {
        match save_json(self.store.as_ref(), SESSION_KEY, &self.state) {
            Ok(()) => self.persisted_time = self.state.current_time,
            Err(err) => warn!(%err, "failed to persist session"),
        }
    }

    pub fn begin_fetch(&mut self) -> FetchTicket {
        self.latest_ticket += 1;
        FetchTicket(self.latest_ticket)
    }

    /// Apply a finished catalog request. Responses that were overtaken by a
    /// newer request are dropped and `false` is returned.
    pub fn apply_fetch(&mut self, ticket: FetchTicket, identifier: &str, tracks: Vec<Track>) -> bool {
        if ticket.0 != self.latest_ticket {
            debug!(
                ticket = ticket.0,
                latest = self.latest_ticket,
                "dropping stale catalog response"
            );
            return false;
        }
        let identifier = identifier.trim();
        if self.pending_identifier.as_deref() == Some(identifier) {
            self.pending_identifier = None;
        }
        self.state.identifier = identifier.to_string();
        self.replace_tracks(tracks);
        true
    }
}

#[cfg(all(test, not(target_arch = "wasm32")))]
mod tests {
    use super::*;
    use crate::db::SqliteStore;
    use proptest::prelude::*;
    use std::rc::Rc;

    fn tracks(n: usize) -> Vec<Track> {
        (0..n)
            .map(|i| Track {
                id: i.to_string(),
                title: format!("Track {i}"),
                url: format!("https://archive.org/download/x/{i}.mp3"),
            })
            .collect()
    }

    fn shared_store() -> Rc<SqliteStore> {
        Rc::new(SqliteStore::open_in_memory().unwrap())
    }

    fn stored(store: &Rc<SqliteStore>) -> SessionState {
        load_json(&**store, SESSION_KEY).unwrap()
    }

    #[test]
    fn empty_store_is_a_cold_start() {
        let (session, outcome) = SessionStore::restore(Box::new(shared_store()), "item");
        assert_eq!(outcome, RestoreOutcome::ColdStart);
        assert!(outcome.needs_fetch());
        assert_eq!(session.identifier(), "item");
        assert!(session.tracks().is_empty());
    }

    #[test]
    fn malformed_blob_is_a_cold_start() {
        let store = shared_store();
        store.set_raw(SESSION_KEY, "{\"tracks\": 12").unwrap();
        let (_, outcome) = SessionStore::restore(Box::new(store), "item");
        assert_eq!(outcome, RestoreOutcome::ColdStart);
    }

    #[test]
    fn out_of_range_index_is_clamped_to_first_track() {
        let store = shared_store();
        let stale = SessionState {
            identifier: "X".to_string(),
            tracks: tracks(5),
            current_index: 5,
            current_time: 93.5,
        };
        save_json(&*store, SESSION_KEY, &stale).unwrap();

        let (session, outcome) = SessionStore::restore(Box::new(store.clone()), "fallback");
        assert_eq!(outcome, RestoreOutcome::Repaired);
        assert_eq!(session.identifier(), "X");
        assert_eq!(session.current_index(), 0);
        assert_eq!(session.current_time(), 0.0);
        // The repaired snapshot is written back.
        assert_eq!(stored(&store).current_index, 0);
    }

    #[test]
    fn stored_session_without_tracks_needs_fetch() {
        let store = shared_store();
        store
            .set_raw(SESSION_KEY, r#"{"identifier":"","currentIndex":0}"#)
            .unwrap();
        let (session, outcome) = SessionStore::restore(Box::new(store), "fallback");
        assert_eq!(outcome, RestoreOutcome::NeedsFetch);
        assert_eq!(session.identifier(), "fallback");
    }

    #[test]
    fn next_and_prev_wrap_around() {
        let store = shared_store();
        let mut session = SessionStore::new(Box::new(store.clone()), "item");
        session.replace_tracks(tracks(3));
        assert!(session.select(2));

        assert_eq!(session.step(1), 0);
        assert_eq!(stored(&store).current_index, 0);
        assert_eq!(session.step(-1), 2);
        assert_eq!(stored(&store).current_index, 2);
    }

    #[test]
    fn select_ignores_out_of_range() {
        let mut session = SessionStore::new(Box::new(shared_store()), "item");
        session.replace_tracks(tracks(2));
        assert!(!session.select(2));
        assert_eq!(session.current_index(), 0);
        assert_eq!(session.step(1), 1);
    }

    #[test]
    fn step_on_empty_catalog_is_a_no_op() {
        let mut session = SessionStore::new(Box::new(shared_store()), "item");
        assert_eq!(session.step(1), 0);
        assert_eq!(session.step(-1), 0);
        assert!(session.current_track().is_none());
    }

    #[test]
    fn every_structural_change_is_persisted() {
        let store = shared_store();
        let mut session = SessionStore::new(Box::new(store.clone()), "item");

        session.replace_tracks(tracks(4));
        assert_eq!(stored(&store).tracks.len(), 4);

        session.select(3);
        assert_eq!(stored(&store).current_index, 3);

        let before = session.generation();
        session.shuffle_tracks();
        assert_eq!(session.generation(), before + 1);
        assert_eq!(stored(&store), session.state().clone());
        assert_eq!(session.current_index(), 0);
    }

    #[test]
    fn position_is_written_in_steps_and_on_flush() {
        let store = shared_store();
        let mut session = SessionStore::new(Box::new(store.clone()), "item");
        session.replace_tracks(tracks(1));

        session.set_current_time(0.4);
        assert_eq!(stored(&store).current_time, 0.0);
        session.set_current_time(1.25);
        assert_eq!(stored(&store).current_time, 1.25);
        session.set_current_time(1.5);
        assert_eq!(stored(&store).current_time, 1.25);

        session.flush();
        assert_eq!(stored(&store).current_time, 1.5);

        session.set_current_time(f64::NAN);
        assert_eq!(session.current_time(), 1.5);
    }

    #[test]
    fn stale_fetch_responses_are_dropped() {
        let mut session = SessionStore::new(Box::new(shared_store()), "a");
        let first = session.begin_fetch();
        let second = session.begin_fetch();

        assert!(session.apply_fetch(second, "b", tracks(2)));
        assert!(!session.apply_fetch(first, "a", tracks(7)));
        assert_eq!(session.identifier(), "b");
        assert_eq!(session.tracks().len(), 2);
    }

    #[test]
    fn pending_identifier_is_stored_only_with_its_catalog() {
        let store = shared_store();
        let mut session = SessionStore::new(Box::new(store.clone()), "a");
        session.replace_tracks(tracks(3));

        session.set_identifier("b");
        let ticket = session.begin_fetch();
        assert_eq!(session.identifier(), "b");
        assert_eq!(session.loaded_identifier(), "a");
        assert_eq!(stored(&store).identifier, "a");

        // Reloading mid-fetch restores the old item with its own tracks.
        let (restored, outcome) = SessionStore::restore(Box::new(store.clone()), "fallback");
        assert_eq!(outcome, RestoreOutcome::Restored);
        assert_eq!(restored.identifier(), "a");
        assert_eq!(restored.tracks(), session.tracks());

        let mut fresh = tracks(2);
        for track in &mut fresh {
            track.url = track.url.replace("/x/", "/b/");
        }
        assert!(session.apply_fetch(ticket, "b", fresh.clone()));
        assert_eq!(session.loaded_identifier(), "b");
        let snapshot = stored(&store);
        assert_eq!(snapshot.identifier, "b");
        assert_eq!(snapshot.tracks, fresh);
    }

    #[test]
    fn setting_the_loaded_identifier_clears_the_pending_one() {
        let mut session = SessionStore::new(Box::new(shared_store()), "a");
        session.set_identifier("b");
        session.set_identifier("a");
        assert_eq!(session.identifier(), "a");
    }

    fn arbitrary_state() -> impl Strategy<Value = SessionState> {
        (
            "[a-z0-9_-]{1,16}",
            prop::collection::vec(("[A-Za-z0-9 #]{0,20}", "[a-z0-9%._-]{1,20}"), 1..20),
            any::<prop::sample::Index>(),
            0u32..40_000,
        )
            .prop_map(|(identifier, entries, index, quarter_secs)| {
                let tracks: Vec<Track> = entries
                    .into_iter()
                    .enumerate()
                    .map(|(i, (title, file))| Track {
                        id: i.to_string(),
                        title,
                        url: format!("https://archive.org/download/{identifier}/{file}"),
                    })
                    .collect();
                SessionState {
                    current_index: index.index(tracks.len()),
                    identifier,
                    tracks,
                    current_time: quarter_secs as f64 / 4.0,
                }
            })
    }

    proptest! {
        #[test]
        fn restore_after_persist_is_identity(state in arbitrary_state()) {
            let store = shared_store();
            save_json(&*store, SESSION_KEY, &state).unwrap();

            let (session, outcome) = SessionStore::restore(Box::new(store), "fallback");
            prop_assert_eq!(outcome, RestoreOutcome::Restored);
            prop_assert_eq!(session.state(), &state);
        }
    }
}
