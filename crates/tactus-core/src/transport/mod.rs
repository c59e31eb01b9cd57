pub mod clock;
pub(crate) mod fsm;
pub(crate) mod handle;
pub(crate) mod metronome;
pub(crate) mod state;
pub(crate) mod sync;
pub(crate) mod tap_tempo;

pub use fsm::{EngineLifecycle, EngineState, LifecycleEvent, TransitionResult};
pub use handle::{MetronomeHandle, TransportHandle};
pub use metronome::{Click, Metronome};
pub use state::{TempoChange, TransportState, TransportStatus};
pub use sync::{ClockAnomaly, ExternalClock, ExternalPosition, SyncSource, SyncState, SyncStatus};
pub use tap_tempo::TapTempo;
pub(crate) use sync::{ClockFollower, ClockReading};
