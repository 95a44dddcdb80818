pub mod process;
pub mod proxy;
pub mod readiness;

pub use process::WorkerProcess;
pub use proxy::GameProxy;
pub use readiness::wait_until_ready;
