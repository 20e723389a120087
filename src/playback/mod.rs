pub mod audio_player;
pub mod sync;

pub use audio_player::{MiniaudioEngine, PlaybackEngine};
pub use sync::{PlaybackSync, TickOutcome, TransportState};
