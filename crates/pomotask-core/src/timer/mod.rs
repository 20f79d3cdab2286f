mod clock;
mod engine;
mod phase;
mod runner;

pub use clock::{Clock, ManualClock, SystemClock};
pub use engine::{PomodoroEngine, TimerSnapshot};
pub use phase::{Phase, TimerConfig};
pub use runner::TimerRunner;
