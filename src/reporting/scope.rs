//! Per-request breadcrumb trail and tags.
//!
//! The scope lives in a Tokio task-local for the duration of one request, so
//! both explicit captures and the panic hook (which runs on the panicking
//! task's thread) see the same trail.

use std::cell::RefCell;
use std::collections::{BTreeMap, VecDeque};
use std::future::Future;

use super::event::Breadcrumb;

/// Default cap on breadcrumbs kept per request.
pub const DEFAULT_MAX_BREADCRUMBS: usize = 100;

tokio::task_local! {
    static REQUEST_SCOPE: RefCell<RequestScope>;
}

/// Contextual data attached to every report raised while the scope is active.
#[derive(Debug, Clone, Default)]
pub struct RequestScope {
    breadcrumbs: VecDeque<Breadcrumb>,
    tags: BTreeMap<String, String>,
    max_breadcrumbs: usize,
}

impl RequestScope {
    pub fn new(max_breadcrumbs: usize) -> Self {
        Self {
            breadcrumbs: VecDeque::new(),
            tags: BTreeMap::new(),
            max_breadcrumbs: max_breadcrumbs.max(1),
        }
    }

    /// Append a breadcrumb, evicting the oldest once the cap is reached.
    pub fn push(&mut self, breadcrumb: Breadcrumb) {
        if self.breadcrumbs.len() == self.max_breadcrumbs {
            self.breadcrumbs.pop_front();
        }
        self.breadcrumbs.push_back(breadcrumb);
    }

    pub fn set_tag(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.tags.insert(key.into(), value.into());
    }

    pub fn breadcrumbs(&self) -> impl Iterator<Item = &Breadcrumb> {
        self.breadcrumbs.iter()
    }

    pub fn tags(&self) -> &BTreeMap<String, String> {
        &self.tags
    }
}

/// Run `fut` with a fresh scope installed.
pub async fn scoped<F: Future>(scope: RequestScope, fut: F) -> F::Output {
    REQUEST_SCOPE.scope(RefCell::new(scope), fut).await
}

/// Record a breadcrumb in the current request's scope. No-op outside a scope.
pub fn add_breadcrumb(breadcrumb: Breadcrumb) {
    let _ = REQUEST_SCOPE.try_with(|scope| {
        if let Ok(mut scope) = scope.try_borrow_mut() {
            scope.push(breadcrumb);
        }
    });
}

/// Tag every report raised in the current request's scope. No-op outside a scope.
pub fn set_tag(key: &str, value: &str) {
    let _ = REQUEST_SCOPE.try_with(|scope| {
        if let Ok(mut scope) = scope.try_borrow_mut() {
            scope.set_tag(key, value);
        }
    });
}

/// Copy of the current scope, if any.
pub fn snapshot() -> Option<RequestScope> {
    REQUEST_SCOPE
        .try_with(|scope| scope.try_borrow().ok().map(|s| s.clone()))
        .ok()
        .flatten()
}
