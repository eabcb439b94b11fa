use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{Instant, interval_at};

/// One countdown step for a specific question run.
///
/// The generation changes on every `start`, so ticks queued by an earlier run can be told
/// apart from the current one even when the question index repeats.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Tick {
    pub question_index: usize,
    generation: u64,
}

pub type TickReceiver = mpsc::UnboundedReceiver<Tick>;

#[derive(Debug)]
enum Mode {
    Interval {
        period: Duration,
        sender: mpsc::UnboundedSender<Tick>,
    },
    /// No timer task and no channel.
    Manual,
}

/// Per-question countdown timer owned by a session.
///
/// `start` and `stop` are the only operations that touch the timer task. In interval mode a
/// tokio task sends one `Tick` per period; in manual mode nothing is spawned and the caller
/// feeds `current()` ticks itself.
#[derive(Debug)]
pub struct Countdown {
    mode: Mode,
    handle: Option<JoinHandle<()>>,
    generation: u64,
    running: Option<Tick>,
}

impl Countdown {
    /// One tick per second.
    #[must_use]
    pub fn interval() -> (Self, TickReceiver) {
        Self::with_period(Duration::from_secs(1))
    }

    #[must_use]
    pub fn with_period(period: Duration) -> (Self, TickReceiver) {
        let (sender, receiver) = mpsc::unbounded_channel();
        (Self::build(Mode::Interval { period, sender }), receiver)
    }

    /// A countdown that never spawns a timer task.
    #[must_use]
    pub fn manual() -> Self {
        Self::build(Mode::Manual)
    }

    fn build(mode: Mode) -> Self {
        Self {
            mode,
            handle: None,
            generation: 0,
            running: None,
        }
    }

    /// Restart the countdown for `question_index`, cancelling any previous run.
    pub(crate) fn start(&mut self, question_index: usize) -> Tick {
        self.stop();
        self.generation += 1;
        let tick = Tick {
            question_index,
            generation: self.generation,
        };
        self.running = Some(tick);

        if let Mode::Interval { period, sender } = &self.mode {
            let (period, sender) = (*period, sender.clone());
            self.handle = Some(tokio::spawn(async move {
                let mut interval = interval_at(Instant::now() + period, period);
                loop {
                    interval.tick().await;
                    if sender.send(tick).is_err() {
                        break;
                    }
                }
            }));
        }
        log::debug!("countdown started for question {question_index}");
        tick
    }

    pub(crate) fn stop(&mut self) {
        if let Some(handle) = self.handle.take() {
            handle.abort();
        }
        self.running = None;
    }

    /// The tick the current run accepts, if a run is active.
    #[must_use]
    pub fn current(&self) -> Option<Tick> {
        self.running
    }

    #[must_use]
    pub fn is_running(&self) -> bool {
        self.running.is_some()
    }

    pub(crate) fn accepts(&self, tick: Tick) -> bool {
        self.running == Some(tick)
    }
}

impl Drop for Countdown {
    fn drop(&mut self) {
        self.stop();
    }
}
