mod gate;
mod progress;
mod run;
mod schedule;
mod vu;

pub use gate::DeadlineGate;
pub use progress::{ProgressFn, ProgressUpdate};
pub use run::{run_scenario, run_scenario_until};
pub use schedule::{ramp_offset, ramp_offsets};
pub use vu::{ActiveVuGuard, VuCounters};
