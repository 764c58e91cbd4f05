use std::time::Duration;

use tokio::{
    sync::{mpsc, oneshot, watch},
    task::JoinHandle,
    time::{Instant, sleep_until},
};

use crate::models::AlgorithmStep;

pub use shared::{DEFAULT_SPEED_MS, Playback, PlaybackError};

/// What a viewer needs to render the current playback position.
#[derive(Debug, Clone, PartialEq)]
pub struct PlaybackSnapshot {
    pub current_index: usize,
    pub is_playing: bool,
    pub speed_ms: u64,
    pub len: usize,
    pub current_step: Option<AlgorithmStep>,
}

impl PlaybackSnapshot {
    fn of(playback: &Playback) -> Self {
        Self {
            current_index: playback.current_index(),
            is_playing: playback.is_playing(),
            speed_ms: playback.speed_ms(),
            len: playback.len(),
            current_step: playback.current_step().cloned(),
        }
    }
}

enum Command {
    Play,
    Pause,
    Jump {
        index: usize,
        reply: oneshot::Sender<Result<(), PlaybackError>>,
    },
    SetSpeed(u64),
    Load(Vec<AlgorithmStep>),
}

/// Timer-driven step playback.
///
/// A single task owns the [`Playback`] state. At most one advance is pending
/// at any time: every command drops it and a new one is scheduled only if
/// playback is still running afterwards.
pub struct PlaybackDriver {
    commands: mpsc::UnboundedSender<Command>,
    snapshots: watch::Receiver<PlaybackSnapshot>,
    task: JoinHandle<()>,
}

impl PlaybackDriver {
    /// Must be called from within a tokio runtime.
    pub fn spawn(steps: Vec<AlgorithmStep>, speed_ms: u64) -> Self {
        let mut playback = Playback::new(steps);
        playback.set_speed(speed_ms);

        let (commands, receiver) = mpsc::unbounded_channel();
        let (publisher, snapshots) = watch::channel(PlaybackSnapshot::of(&playback));
        let task = tokio::spawn(run(playback, receiver, publisher));

        Self {
            commands,
            snapshots,
            task,
        }
    }

    pub fn play(&self) -> Result<(), PlaybackError> {
        self.send(Command::Play)
    }

    pub fn pause(&self) -> Result<(), PlaybackError> {
        self.send(Command::Pause)
    }

    pub fn set_speed(&self, speed_ms: u64) -> Result<(), PlaybackError> {
        self.send(Command::SetSpeed(speed_ms))
    }

    /// Replace the trace; playback rewinds and pauses.
    pub fn load(&self, steps: Vec<AlgorithmStep>) -> Result<(), PlaybackError> {
        self.send(Command::Load(steps))
    }

    /// Resolves once the new position is visible through [`Self::snapshot`].
    pub async fn jump(&self, index: usize) -> Result<(), PlaybackError> {
        let (reply, response) = oneshot::channel();
        self.send(Command::Jump { index, reply })?;
        response.await.map_err(|_| PlaybackError::Closed)?
    }

    pub fn snapshot(&self) -> PlaybackSnapshot {
        self.snapshots.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<PlaybackSnapshot> {
        self.snapshots.clone()
    }

    pub async fn shutdown(self) -> Result<(), PlaybackError> {
        drop(self.commands);
        self.task.await.map_err(|_| PlaybackError::Closed)
    }

    fn send(&self, command: Command) -> Result<(), PlaybackError> {
        self.commands.send(command).map_err(|_| PlaybackError::Closed)
    }
}

async fn run(
    mut playback: Playback,
    mut commands: mpsc::UnboundedReceiver<Command>,
    publisher: watch::Sender<PlaybackSnapshot>,
) {
    let mut deadline = next_advance(&playback);

    loop {
        tokio::select! {
            command = commands.recv() => {
                let Some(command) = command else {
                    break;
                };
                let reply = apply(&mut playback, command);
                deadline = next_advance(&playback);
                publisher.send_replace(PlaybackSnapshot::of(&playback));
                if let Some((reply, result)) = reply {
                    let _ = reply.send(result);
                }
            }
            _ = wait_until(deadline) => {
                if let Some(step) = playback.advance() {
                    tracing::trace!("playback at step {} ({:?})", step.step, step.action);
                }
                deadline = next_advance(&playback);
                publisher.send_replace(PlaybackSnapshot::of(&playback));
            }
        }
    }

    tracing::debug!("playback driver stopped");
}

type JumpReply = (oneshot::Sender<Result<(), PlaybackError>>, Result<(), PlaybackError>);

fn apply(playback: &mut Playback, command: Command) -> Option<JumpReply> {
    match command {
        Command::Play => {
            if !playback.play() {
                tracing::debug!("play refused at step {}", playback.current_index());
            }
        }
        Command::Pause => playback.pause(),
        Command::SetSpeed(speed_ms) => playback.set_speed(speed_ms),
        Command::Load(steps) => playback.load(steps),
        Command::Jump { index, reply } => return Some((reply, playback.jump(index))),
    }
    None
}

fn next_advance(playback: &Playback) -> Option<Instant> {
    playback
        .is_playing()
        .then(|| Instant::now() + Duration::from_millis(playback.speed_ms()))
}

async fn wait_until(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}
