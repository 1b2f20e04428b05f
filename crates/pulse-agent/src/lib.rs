pub mod agent;
pub mod intake;
pub mod notify;
pub mod scheduler;

pub use agent::{run, Agent};
pub use notify::{CollectNotifier, Notifier, StdoutNotifier};
pub use scheduler::FlushOutcome;
