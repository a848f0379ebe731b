pub mod dispatcher;
pub mod execution;
pub mod inline;
pub mod pool;
pub mod processors;
pub mod runner;
pub mod work_unit;

pub use dispatcher::Dispatcher;
pub use execution::JobExecutor;
pub use inline::InlineExecutor;
pub use pool::WorkerPool;
pub use processors::SteppedWorkUnit;
pub use runner::{start_background, BackgroundHandle, BackgroundOptions};
pub use work_unit::{ExecutionContext, WorkUnit};
