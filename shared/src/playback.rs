use crate::AlgorithmStep;

pub const DEFAULT_SPEED_MS: u64 = 1000;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PlaybackError {
    #[error("step index {index} out of range (trace has {len} steps)")]
    InvalidIndex { index: usize, len: usize },
    #[error("playback driver has shut down")]
    Closed,
}

/// Replay state for a step trace: forward-only auto-advance plus random-access jumps.
///
/// The model holds no timer. Whoever drives it calls [`Playback::advance`]
/// every `speed_ms` while [`Playback::is_playing`] is true.
#[derive(Debug, Clone)]
pub struct Playback {
    steps: Vec<AlgorithmStep>,
    current_index: usize,
    is_playing: bool,
    speed_ms: u64,
}

impl Default for Playback {
    fn default() -> Self {
        Self::new(Vec::new())
    }
}

impl Playback {
    pub fn new(steps: Vec<AlgorithmStep>) -> Self {
        Self {
            steps,
            current_index: 0,
            is_playing: false,
            speed_ms: DEFAULT_SPEED_MS,
        }
    }

    /// Replace the trace. Playback rewinds to the first step and pauses.
    pub fn load(&mut self, steps: Vec<AlgorithmStep>) {
        self.steps = steps;
        self.current_index = 0;
        self.is_playing = false;
    }

    /// Returns whether playback is now running. Refused on an empty trace or at the last step.
    pub fn play(&mut self) -> bool {
        self.is_playing = !self.at_end();
        self.is_playing
    }

    pub fn pause(&mut self) {
        self.is_playing = false;
    }

    pub fn jump(&mut self, index: usize) -> Result<(), PlaybackError> {
        if index >= self.steps.len() {
            return Err(PlaybackError::InvalidIndex {
                index,
                len: self.steps.len(),
            });
        }
        self.current_index = index;
        if self.at_end() {
            self.is_playing = false;
        }
        Ok(())
    }

    /// Move one step forward. Playback stops once the last step is reached.
    pub fn advance(&mut self) -> Option<&AlgorithmStep> {
        if self.at_end() {
            self.is_playing = false;
            return None;
        }
        self.current_index += 1;
        if self.at_end() {
            self.is_playing = false;
        }
        self.steps.get(self.current_index)
    }

    pub fn set_speed(&mut self, speed_ms: u64) {
        self.speed_ms = speed_ms.max(1);
    }

    pub fn current_step(&self) -> Option<&AlgorithmStep> {
        self.steps.get(self.current_index)
    }

    pub fn steps(&self) -> &[AlgorithmStep] {
        &self.steps
    }

    pub fn current_index(&self) -> usize {
        self.current_index
    }

    pub fn is_playing(&self) -> bool {
        self.is_playing
    }

    pub fn speed_ms(&self) -> u64 {
        self.speed_ms
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    fn at_end(&self) -> bool {
        self.current_index + 1 >= self.steps.len()
    }
}
