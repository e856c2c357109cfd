//! Window services.
//!
//! Services orchestrate the window store and the emitter:
//!
//! - [`DedupWindow`]: concurrent adds and the atomic drain
//! - [`WindowScheduler`]: the periodic drain-and-publish loop
//! - [`RequestAcceptor`]: the ingestion boundary
//! - [`BackendFactory`]: builds backends from configuration

mod acceptor;
mod backend_factory;
mod scheduler;
mod shutdown;
mod window;

pub use acceptor::RequestAcceptor;
pub use backend_factory::{BackendFactory, BackendSet};
pub use scheduler::{TickReport, WindowScheduler};
pub use shutdown::{ShutdownSignal, ShutdownTrigger, shutdown_channel};
pub use window::DedupWindow;
