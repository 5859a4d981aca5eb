pub mod error;
pub mod notifier;
pub mod queue;

pub use error::{QueueError, Result};
pub use notifier::{AgentNotifier, NoopNotifier, NotifyError};
pub use queue::HumanAgentQueue;
