//! Execution context carrying attributes staged for the next log records.
//!
//! A [`LogContext`] is an immutable value: every staging call returns a new
//! context and leaves the receiver untouched, so it can be handed to
//! concurrent tasks freely. Contexts are passed explicitly to
//! [`Handler`](crate::handler::Handler)s, or installed for the duration of a
//! future with [`LogContext::scope`] and read back with
//! [`LogContext::current`] (this is what the `tracing` bridge does).

use crate::attr::Attr;
use std::collections::BTreeMap;
use std::future::Future;
use std::sync::Arc;

tokio::task_local! {
    static CURRENT: LogContext;
}

#[derive(Debug, Clone, Default)]
struct Staged {
    propagated: Vec<Attr>,
    added: Vec<Attr>,
    groups: BTreeMap<String, Vec<Attr>>,
}

#[derive(Debug, Clone, Default)]
pub struct LogContext {
    staged: Arc<Staged>,
}

impl LogContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stage attributes that are prepended to every record, outside of any
    /// group.
    pub fn add(&self, attrs: impl IntoIterator<Item = Attr>) -> LogContext {
        self.derive(|staged| staged.added.extend(attrs))
    }

    /// Stage attributes for group `group`. They land inside that group when
    /// the handler chain opens it, or at the root when it never does.
    pub fn add_to_group(
        &self,
        group: impl Into<String>,
        attrs: impl IntoIterator<Item = Attr>,
    ) -> LogContext {
        let group = group.into();
        self.derive(|staged| staged.groups.entry(group).or_default().extend(attrs))
    }

    /// Stage attributes like [`add`](Self::add) that also survive
    /// [`detached`](Self::detached).
    pub fn propagate(&self, attrs: impl IntoIterator<Item = Attr>) -> LogContext {
        self.derive(|staged| staged.propagated.extend(attrs))
    }

    /// Context for work that outlives the current request: keeps the
    /// propagated attributes and drops everything else.
    pub fn detached(&self) -> LogContext {
        LogContext {
            staged: Arc::new(Staged {
                propagated: self.staged.propagated.clone(),
                ..Staged::default()
            }),
        }
    }

    pub fn propagated(&self) -> &[Attr] {
        &self.staged.propagated
    }

    pub fn added(&self) -> &[Attr] {
        &self.staged.added
    }

    pub fn groups(&self) -> &BTreeMap<String, Vec<Attr>> {
        &self.staged.groups
    }

    pub fn is_empty(&self) -> bool {
        self.staged.propagated.is_empty()
            && self.staged.added.is_empty()
            && self.staged.groups.is_empty()
    }

    fn derive(&self, apply: impl FnOnce(&mut Staged)) -> LogContext {
        let mut staged = Arc::clone(&self.staged);
        apply(Arc::make_mut(&mut staged));
        LogContext { staged }
    }

    /// Context installed by the innermost enclosing [`scope`](Self::scope),
    /// or an empty one.
    pub fn current() -> LogContext {
        CURRENT.try_with(LogContext::clone).unwrap_or_default()
    }

    /// Run `fut` with this context as [`current`](Self::current).
    pub async fn scope<F: Future>(self, fut: F) -> F::Output {
        CURRENT.scope(self, fut).await
    }

    /// Synchronous counterpart of [`scope`](Self::scope).
    pub fn sync_scope<R>(self, f: impl FnOnce() -> R) -> R {
        CURRENT.sync_scope(self, f)
    }
}
