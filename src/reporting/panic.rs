//! Process-level capture of uncaught faults.
//!
//! The hook observes a panic, queues a `RuntimeFault` event carrying the
//! current request scope, and then defers to the previously installed hook.
//! It never stops the panic from unwinding.

use std::any::Any;
use std::panic;
use std::sync::atomic::{AtomicBool, Ordering};

use super::event::{ErrorEvent, Stacktrace};
use super::reporter::ErrorReporter;
use super::scope;

/// Exception type used for uncaught faults.
pub const RUNTIME_FAULT: &str = "RuntimeFault";

static INSTALLED: AtomicBool = AtomicBool::new(false);

/// Install the fault-capturing hook in front of the existing one.
///
/// Only the first call per process installs a hook; later calls return
/// `false` and leave the installed reporter in place.
pub fn install_panic_hook(reporter: ErrorReporter) -> bool {
    if INSTALLED.swap(true, Ordering::AcqRel) {
        tracing::debug!("Fault hook already installed");
        return false;
    }
    let previous = panic::take_hook();
    panic::set_hook(Box::new(move |info| {
        let message = panic_message(info.payload());
        let location = info
            .location()
            .map(|l| format!("{}:{}:{}", l.file(), l.line(), l.column()));

        let event = fault_event(&message, location.as_deref());
        let event_id = reporter
            .capture(event)
            .map(|id| id.simple().to_string())
            .unwrap_or_default();
        tracing::error!(
            event_id = %event_id,
            location = location.as_deref().unwrap_or("unknown"),
            "Uncaught fault: {}",
            message
        );

        previous(info);
    }));
    true
}

/// Build the report for a fault raised at `location`, attaching the current scope.
pub fn fault_event(message: &str, location: Option<&str>) -> ErrorEvent {
    let mut event = ErrorEvent::exception(RUNTIME_FAULT, message, false)
        .with_stacktrace(Stacktrace::capture());
    if let Some(location) = location {
        event = event.with_tag("location", location);
    }
    if let Some(scope) = scope::snapshot() {
        for (key, value) in scope.tags() {
            event = event.with_tag(key.clone(), value.clone());
        }
        event = event.with_breadcrumbs(scope.breadcrumbs().cloned());
    }
    event
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "Box<dyn Any>".to_string()
    }
}
