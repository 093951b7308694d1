use crate::attr::Attr;
use crate::chain::Chain;
use crate::context::LogContext;
use crate::record::LogRecord;
use std::error::Error;
use std::sync::Arc;
use tracing::Level;

/// Error returned by [`Handler::handle`]. Middleware hands it back to the
/// caller exactly as the downstream handler produced it.
pub type HandleError = Box<dyn Error + Send + Sync>;

/// A stage in the record pipeline: either a middleware that rewrites the
/// record and forwards it, or a terminal sink.
///
/// Handlers are immutable. `with_attrs` and `with_group` return a derived
/// handler and never change the receiver, so derived handlers can be used
/// concurrently with their ancestors.
pub trait Handler: Send + Sync {
    /// Whether records at `level` would be handled at all.
    fn enabled(&self, ctx: &LogContext, level: Level) -> bool;

    /// Process one record.
    fn handle(&self, ctx: &LogContext, record: LogRecord) -> Result<(), HandleError>;

    /// Handler whose records carry `attrs` at the current scope.
    fn with_attrs(&self, attrs: Vec<Attr>) -> Arc<dyn Handler>;

    /// Handler whose later attributes are nested under group `name`.
    fn with_group(&self, name: &str) -> Arc<dyn Handler>;
}

/// A handler that drops every record.
///
/// Useful for measuring the overhead of the middleware itself and for tests
/// that only care about the return path.
#[derive(Clone, Default)]
pub struct NoopHandler;

impl Handler for NoopHandler {
    fn enabled(&self, _ctx: &LogContext, _level: Level) -> bool {
        true
    }

    fn handle(&self, _ctx: &LogContext, _record: LogRecord) -> Result<(), HandleError> {
        Ok(())
    }

    fn with_attrs(&self, _attrs: Vec<Attr>) -> Arc<dyn Handler> {
        Arc::new(NoopHandler)
    }

    fn with_group(&self, _name: &str) -> Arc<dyn Handler> {
        Arc::new(NoopHandler)
    }
}

/// Scoping state for terminal handlers that apply `with_attrs` /
/// `with_group` themselves instead of delegating.
#[derive(Debug, Clone, Default)]
pub(crate) struct Scoped {
    pub(crate) chain: Chain,
}

impl Scoped {
    pub(crate) fn with_attrs(&self, attrs: Vec<Attr>) -> Scoped {
        Scoped {
            chain: self.chain.with_attrs(attrs),
        }
    }

    pub(crate) fn with_group(&self, name: &str) -> Scoped {
        Scoped {
            chain: self.chain.with_group(name),
        }
    }

    /// The record with the chain's scoping applied to its attributes.
    pub(crate) fn apply(&self, mut record: LogRecord) -> LogRecord {
        if !self.chain.is_empty() {
            let attrs = std::mem::take(&mut record.attrs);
            record.attrs = crate::compose::resolve(&self.chain, attrs);
        }
        record
    }
}
