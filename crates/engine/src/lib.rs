pub mod batch;
pub mod bybit;
pub mod dispatcher;
pub mod scanner;
pub mod scheduler;

pub use batch::{BatchFetch, BatchOutcome};
pub use bybit::BybitClient;
pub use dispatcher::AlertDispatcher;
pub use scanner::{Scanner, TickOutcome};
pub use scheduler::{ScanScheduler, SchedulerHandle};
