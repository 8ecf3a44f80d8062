// Checkpoint daemon
//
// The scheduler runs setup once (remote, branch, credentials) and then polls
// the working tree at a fixed interval for as long as git keeps the pushed
// credentials cached. Each poll is one engine cycle: commit, then push.

mod engine;
mod scheduler;
mod state;

pub use engine::PushOutcome;
pub use scheduler::{Scheduler, StopReason};
pub use state::StateStore;
