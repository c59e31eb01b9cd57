//! Engine lifecycle state machine.

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, PartialOrd, Ord)]
#[repr(u8)]
pub enum EngineState {
    #[default]
    Uninitialized = 0,
    /// Internal queues and the metronome instrument exist.
    Initialized = 1,
    /// Audio/MIDI drivers attached, no song.
    Prepared = 2,
    /// Song loaded, transport stopped.
    Ready = 3,
    Playing = 4,
}

impl EngineState {
    pub(crate) fn from_u8(value: u8) -> Self {
        match value {
            1 => EngineState::Initialized,
            2 => EngineState::Prepared,
            3 => EngineState::Ready,
            4 => EngineState::Playing,
            _ => EngineState::Uninitialized,
        }
    }

    /// States in which the audio callback does any work.
    #[inline]
    pub fn is_active(self) -> bool {
        matches!(self, EngineState::Ready | EngineState::Playing)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleEvent {
    Init,
    Prepare,
    Unprepare,
    AttachSong,
    DetachSong,
    Start,
    Stop,
    Shutdown,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransitionResult {
    /// Event accepted, state unchanged.
    None,
    Changed { from: EngineState, to: EngineState },
    /// Event is not valid in the current state.
    Rejected(EngineState),
}

#[derive(Debug, Default)]
pub struct EngineLifecycle {
    state: EngineState,
}

impl EngineLifecycle {
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub fn state(&self) -> EngineState {
        self.state
    }

    pub fn transition(&mut self, event: LifecycleEvent) -> TransitionResult {
        use EngineState::*;
        use LifecycleEvent::*;

        let next = match (event, self.state) {
            (Init, Uninitialized) => Initialized,
            (Prepare, Initialized) => Prepared,
            (Unprepare, Prepared | Ready) => Initialized,
            (AttachSong, Prepared) => Ready,
            (AttachSong, Ready) => return TransitionResult::None,
            (DetachSong, Ready) => Prepared,
            (DetachSong, Prepared) => return TransitionResult::None,
            (Start, Ready) => Playing,
            (Start, Playing) => return TransitionResult::None,
            (Stop, Playing) => Ready,
            (Stop, Ready) => return TransitionResult::None,
            (Shutdown, Uninitialized) => return TransitionResult::None,
            (Shutdown, _) => Uninitialized,
            (_, state) => return TransitionResult::Rejected(state),
        };

        let from = self.state;
        self.state = next;
        TransitionResult::Changed { from, to: next }
    }
}
