//! The components module contains all shared components for our app.

mod app;
mod audio_manager;
mod icons;
mod integrations;
mod player;
mod settings_row;
mod timer;
mod track_list;

pub use app::*;
pub use audio_manager::*;
pub use icons::*;
pub use integrations::*;
pub use player::*;
pub use settings_row::*;
pub use timer::*;
pub use track_list::*;
