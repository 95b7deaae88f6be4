//! Subscription lifecycle, message dispatch and error recovery.

mod dispatch;
mod manager;
mod recovery;
mod shutdown;

pub use dispatch::{DispatchOutcome, DropReason, MessageDispatcher};
pub use manager::{ActiveSubscription, SubscriptionManager};
pub use recovery::{ErrorRecovery, RecoveryAction};
pub use shutdown::ShutdownSignal;
