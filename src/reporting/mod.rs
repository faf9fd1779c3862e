//! Error reporting subsystem.
//!
//! # Data Flow
//! ```text
//! handler (caught SimulatedBusiness / Forced errors)
//!     → event.rs (ErrorEvent + tags + scope breadcrumbs)
//!     → reporter.rs (bounded queue, never blocks)
//!     → transport.rs (HTTP to the tracker, or log-only without a DSN)
//!
//! uncaught panic (diagnostic route)
//!     → panic.rs hook (RuntimeFault + scope breadcrumbs)
//!     → reporter.rs → transport.rs
//! ```
//!
//! # Design Decisions
//! - Breadcrumbs are per request (task-local scope), not process-wide
//! - Reporting failures are logged and never affect the response

pub mod dsn;
pub mod event;
pub mod panic;
pub mod reporter;
pub mod scope;
pub mod transport;

pub use dsn::{Dsn, DsnError};
pub use event::{Breadcrumb, ErrorEvent, EventLevel, Stacktrace};
pub use panic::{install_panic_hook, RUNTIME_FAULT};
pub use reporter::{ErrorReporter, ReporterOptions, ReporterWorker};
pub use scope::RequestScope;
pub use transport::{HttpTransport, LogTransport, MemoryTransport, Transport, TransportError};
