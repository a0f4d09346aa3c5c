//! Transport controller: binds the current track to a playback element and
//! tracks the play/pause/loading state around it.
//!
//! The controller never touches the DOM itself. It drives anything that
//! implements [`PlaybackElement`] and is fed the element's events through
//! [`Transport::handle`], which keeps it testable with fake elements.

use crate::api::Track;
use crate::utils::circular_index;
use tracing::debug;

/// The operations the transport needs from an audio element.
pub trait PlaybackElement {
    fn set_source(&mut self, url: &str);
    fn clear_source(&mut self);
    /// Start playback. Rejections are the element's business; the transport
    /// only trusts the `Play` event that follows a successful start.
    fn play(&mut self);
    fn pause(&mut self);
    fn seek(&mut self, seconds: f64);
    fn current_time(&self) -> f64;
    /// `NaN` until metadata is known.
    fn duration(&self) -> f64;
}

impl<E: PlaybackElement + ?Sized> PlaybackElement for Box<E> {
    fn set_source(&mut self, url: &str) {
        (**self).set_source(url)
    }
    fn clear_source(&mut self) {
        (**self).clear_source()
    }
    fn play(&mut self) {
        (**self).play()
    }
    fn pause(&mut self) {
        (**self).pause()
    }
    fn seek(&mut self, seconds: f64) {
        (**self).seek(seconds)
    }
    fn current_time(&self) -> f64 {
        (**self).current_time()
    }
    fn duration(&self) -> f64 {
        (**self).duration()
    }
}

/// Element events the transport reacts to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MediaEvent {
    LoadedMetadata,
    DurationChange,
    Play,
    Pause,
    TimeUpdate,
    Ended,
    Error,
}

#[cfg_attr(not(target_arch = "wasm32"), allow(dead_code))]
impl MediaEvent {
    pub const ALL: [MediaEvent; 7] = [
        MediaEvent::LoadedMetadata,
        MediaEvent::DurationChange,
        MediaEvent::Play,
        MediaEvent::Pause,
        MediaEvent::TimeUpdate,
        MediaEvent::Ended,
        MediaEvent::Error,
    ];

    /// DOM event name.
    pub fn name(self) -> &'static str {
        match self {
            Self::LoadedMetadata => "loadedmetadata",
            Self::DurationChange => "durationchange",
            Self::Play => "play",
            Self::Pause => "pause",
            Self::TimeUpdate => "timeupdate",
            Self::Ended => "ended",
            Self::Error => "error",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Phase {
    /// No source bound.
    #[default]
    Idle,
    /// Source set, metadata not yet loaded.
    Loading,
    /// Loaded and paused.
    Ready,
    Playing,
}

/// What the owner of the transport has to act on.
#[derive(Debug, Clone, PartialEq)]
pub enum TransportNotice {
    /// The current track finished; step the session forward.
    Advance,
    Position(f64),
    Started,
    Stopped,
    Duration(f64),
    Failed(String),
}

struct Slot<E> {
    element: E,
    source: Option<String>,
    loaded: bool,
}

impl<E: PlaybackElement> Slot<E> {
    fn load(&mut self, url: &str) {
        self.element.set_source(url);
        self.source = Some(url.to_string());
        self.loaded = false;
    }

    fn holds(&self, url: &str) -> bool {
        self.source.as_deref() == Some(url)
    }

    fn reset(&mut self) {
        self.element.pause();
        self.element.clear_source();
        self.source = None;
        self.loaded = false;
    }
}

pub struct Transport<E> {
    slots: Vec<Slot<E>>,
    active: usize,
    active_index: Option<usize>,
    phase: Phase,
    wants_play: bool,
    /// The active track played to its end; syncing to it again restarts it.
    finished: bool,
    pending_seek: Option<f64>,
    scrub: Option<f64>,
    position: f64,
    duration: f64,
}

impl<E: PlaybackElement> Transport<E> {
    /// One element; the source is swapped on every track change.
    pub fn single(element: E) -> Self {
        Self::with_elements(vec![element])
    }

    /// Three elements: current, next and previous are kept loaded.
    pub fn prebuffered(current: E, next: E, previous: E) -> Self {
        Self::with_elements(vec![current, next, previous])
    }

    fn with_elements(elements: Vec<E>) -> Self {
        Self {
            slots: elements
                .into_iter()
                .map(|element| Slot {
                    element,
                    source: None,
                    loaded: false,
                })
                .collect(),
            active: 0,
            active_index: None,
            phase: Phase::Idle,
            wants_play: false,
            finished: false,
            pending_seek: None,
            scrub: None,
            position: 0.0,
            duration: f64::NAN,
        }
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn is_playing(&self) -> bool {
        self.phase == Phase::Playing
    }

    pub fn is_loading(&self) -> bool {
        self.phase == Phase::Loading
    }

    /// Whether playback is active or requested.
    pub fn wants_play(&self) -> bool {
        self.wants_play
    }

    #[cfg(test)]
    pub fn active_slot(&self) -> usize {
        self.active
    }

    /// Session index bound to the active slot.
    pub fn active_index(&self) -> Option<usize> {
        self.active_index
    }

    #[cfg(test)]
    pub fn current_source(&self) -> Option<&str> {
        self.slots[self.active].source.as_deref()
    }

    /// Position shown to the user; follows the thumb while scrubbing.
    pub fn display_time(&self) -> f64 {
        self.scrub.unwrap_or(self.position)
    }

    pub fn position(&self) -> f64 {
        self.position
    }

    pub fn duration(&self) -> f64 {
        self.duration
    }

    pub fn is_scrubbing(&self) -> bool {
        self.scrub.is_some()
    }

    /// Bind `tracks[index]` to the active slot, rotating to a pre-buffered
    /// slot when one already holds it.
    pub fn sync(&mut self, tracks: &[Track], index: usize) {
        let Some(track) = tracks.get(index) else {
            self.clear();
            return;
        };

        let unchanged = !self.finished
            && self.active_index == Some(index)
            && self.slots[self.active].holds(&track.url);
        if !unchanged {
            self.bind_current(&track.url);
            self.active_index = Some(index);
        }
        self.assign_neighbours(tracks, index);
    }

    fn bind_current(&mut self, url: &str) {
        self.finished = false;
        self.scrub = None;
        self.pending_seek = None;
        self.position = 0.0;

        let previous = self.active;
        if let Some(slot) = self.slots.iter().position(|slot| slot.holds(url)) {
            self.active = slot;
        } else {
            self.slots[self.active].load(url);
        }
        if previous != self.active {
            self.slots[previous].element.pause();
            debug!(from = previous, to = self.active, "rotated to pre-buffered slot");
        }

        let slot = &mut self.slots[self.active];
        if slot.loaded {
            slot.element.seek(0.0);
            self.duration = slot.element.duration();
            self.phase = Phase::Ready;
            if self.wants_play {
                slot.element.play();
            }
        } else {
            self.duration = f64::NAN;
            self.phase = Phase::Loading;
        }
        debug!(url, phase = ?self.phase, "bound track");
    }

    fn assign_neighbours(&mut self, tracks: &[Track], index: usize) {
        if self.slots.len() < 3 {
            return;
        }
        let len = tracks.len();
        let current_url = tracks[index].url.as_str();
        let mut wanted: Vec<&str> = Vec::with_capacity(2);
        for neighbour in [circular_index(index, 1, len), circular_index(index, -1, len)] {
            let url = tracks[neighbour].url.as_str();
            if url != current_url && !wanted.contains(&url) {
                wanted.push(url);
            }
        }

        let mut free = Vec::new();
        for slot in (0..self.slots.len()).filter(|&slot| slot != self.active) {
            let held = wanted.iter().position(|url| self.slots[slot].holds(url));
            match held {
                Some(pos) => {
                    wanted.remove(pos);
                }
                None => free.push(slot),
            }
            self.slots[slot].element.pause();
        }
        for (slot, url) in free.into_iter().zip(wanted) {
            self.slots[slot].load(url);
        }
    }

    pub fn play(&mut self) {
        match self.phase {
            Phase::Idle => {}
            Phase::Loading => {
                debug!("play requested while loading, deferring");
                self.wants_play = true;
            }
            Phase::Ready | Phase::Playing => {
                self.wants_play = true;
                self.slots[self.active].element.play();
            }
        }
    }

    pub fn pause(&mut self) {
        self.wants_play = false;
        if self.phase == Phase::Playing {
            self.slots[self.active].element.pause();
        }
    }

    pub fn toggle_play(&mut self) {
        let active =
            self.phase == Phase::Playing || (self.phase == Phase::Loading && self.wants_play);
        if active {
            self.pause();
        } else {
            self.play();
        }
    }

    /// Move the displayed position while the seek bar is dragged.
    pub fn scrub(&mut self, seconds: f64) {
        if seconds.is_finite() {
            self.scrub = Some(seconds.max(0.0));
        }
    }

    /// Apply the dragged position on release.
    pub fn commit_scrub(&mut self, seconds: f64) {
        self.scrub = None;
        if seconds.is_finite() {
            self.seek_to(seconds.max(0.0));
        }
    }

    /// Seek to a restored position, now or once metadata has loaded.
    pub fn restore_position(&mut self, seconds: f64) {
        if seconds.is_finite() && seconds > 0.0 {
            self.seek_to(seconds);
        }
    }

    fn seek_to(&mut self, seconds: f64) {
        self.position = seconds;
        let slot = &mut self.slots[self.active];
        if slot.loaded {
            slot.element.seek(seconds);
        } else if slot.source.is_some() {
            self.pending_seek = Some(seconds);
        }
    }

    /// Drop every source and return to `Idle`.
    pub fn clear(&mut self) {
        for slot in &mut self.slots {
            slot.reset();
        }
        self.active = 0;
        self.active_index = None;
        self.phase = Phase::Idle;
        self.wants_play = false;
        self.finished = false;
        self.pending_seek = None;
        self.scrub = None;
        self.position = 0.0;
        self.duration = f64::NAN;
    }

    /// Feed an element event from `slot`.
    pub fn handle(&mut self, slot: usize, event: MediaEvent) -> Option<TransportNotice> {
        if slot >= self.slots.len() {
            return None;
        }
        if slot != self.active {
            // Spare slots only report readiness.
            if event == MediaEvent::LoadedMetadata {
                self.slots[slot].loaded = true;
            }
            return None;
        }

        match event {
            MediaEvent::LoadedMetadata => {
                let slot = &mut self.slots[self.active];
                slot.loaded = true;
                if let Some(seconds) = self.pending_seek.take() {
                    slot.element.seek(seconds);
                }
                self.duration = slot.element.duration();
                if self.phase == Phase::Loading {
                    self.phase = Phase::Ready;
                }
                if self.wants_play {
                    slot.element.play();
                }
                Some(TransportNotice::Duration(self.duration))
            }
            MediaEvent::DurationChange => {
                self.duration = self.slots[self.active].element.duration();
                Some(TransportNotice::Duration(self.duration))
            }
            MediaEvent::Play => {
                if self.phase == Phase::Idle {
                    return None;
                }
                self.phase = Phase::Playing;
                self.wants_play = true;
                Some(TransportNotice::Started)
            }
            MediaEvent::Pause => {
                if self.phase != Phase::Playing {
                    return None;
                }
                self.phase = Phase::Ready;
                self.wants_play = false;
                Some(TransportNotice::Stopped)
            }
            MediaEvent::TimeUpdate => {
                if self.phase == Phase::Loading || self.phase == Phase::Idle {
                    return None;
                }
                self.position = self.slots[self.active].element.current_time();
                Some(TransportNotice::Position(self.position))
            }
            MediaEvent::Ended => {
                if self.phase == Phase::Idle {
                    return None;
                }
                // Ending is a pause the listener did not ask for.
                self.wants_play = true;
                self.finished = true;
                self.phase = Phase::Ready;
                Some(TransportNotice::Advance)
            }
            MediaEvent::Error => {
                // Forget the binding so the next sync fetches the track again.
                let slot = &mut self.slots[self.active];
                let url = slot.source.take().unwrap_or_default();
                slot.loaded = false;
                self.active_index = None;
                self.pending_seek = None;
                self.phase = Phase::Idle;
                self.wants_play = false;
                Some(TransportNotice::Failed(format!("Could not load {url}")))
            }
        }
    }
}
