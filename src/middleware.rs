use crate::attr::Attr;
use crate::chain::Chain;
use crate::compose::compose;
use crate::context::LogContext;
use crate::extract::{default_extractors, extract_added_to_group, AttrExtractor};
use crate::handler::{HandleError, Handler};
use crate::record::LogRecord;
use std::sync::Arc;
use tracing::Level;

/// Middleware that merges context attributes into each record before
/// passing it to the next handler.
///
/// Scoped attributes and groups are kept on an immutable [`Chain`] rather
/// than forwarded to `next`, so that attributes staged in the context for a
/// group can be placed inside that group when the record is composed.
#[derive(Clone)]
pub struct ContextHandler {
    next: Arc<dyn Handler>,
    chain: Chain,
    extractors: Arc<[Arc<dyn AttrExtractor>]>,
}

impl ContextHandler {
    /// Wrap `next` with the default extractors: propagated attributes, then
    /// added attributes.
    pub fn new(next: Arc<dyn Handler>) -> Self {
        Self::with_extractors(next, default_extractors())
    }

    /// Wrap `next` with a custom extractor list. Their outputs are placed at
    /// the front of each record, first registered first.
    pub fn with_extractors(next: Arc<dyn Handler>, extractors: Vec<Arc<dyn AttrExtractor>>) -> Self {
        ContextHandler {
            next,
            chain: Chain::empty(),
            extractors: extractors.into(),
        }
    }

    fn derive(&self, chain: Chain) -> Arc<dyn Handler> {
        Arc::new(ContextHandler {
            next: Arc::clone(&self.next),
            chain,
            extractors: Arc::clone(&self.extractors),
        })
    }
}

/// Constructor usable when assembling a pipeline of middleware:
///
/// ```
/// use std::sync::Arc;
/// use tracing_ctx_attrs::{capture::CaptureHandler, handler::Handler, middleware::middleware};
///
/// let sink: Arc<dyn Handler> = Arc::new(CaptureHandler::new());
/// let handler = middleware()(sink);
/// # let _ = handler;
/// ```
pub fn middleware() -> impl Fn(Arc<dyn Handler>) -> Arc<dyn Handler> {
    |next: Arc<dyn Handler>| -> Arc<dyn Handler> { Arc::new(ContextHandler::new(next)) }
}

impl Handler for ContextHandler {
    fn enabled(&self, ctx: &LogContext, level: Level) -> bool {
        self.next.enabled(ctx, level)
    }

    fn handle(&self, ctx: &LogContext, mut record: LogRecord) -> Result<(), HandleError> {
        let (time, level, message) = (record.timestamp, record.level, record.message.as_str());

        let group_attrs = extract_added_to_group(ctx, time, level, message);
        let prepended = self
            .extractors
            .iter()
            .map(|e| e.extract(ctx, time, level, message))
            .collect();

        let own = std::mem::take(&mut record.attrs);
        let attrs = compose(&self.chain, group_attrs, prepended, own);
        self.next.handle(ctx, record.rebuild(attrs))
    }

    fn with_attrs(&self, attrs: Vec<Attr>) -> Arc<dyn Handler> {
        self.derive(self.chain.with_attrs(attrs))
    }

    fn with_group(&self, name: &str) -> Arc<dyn Handler> {
        self.derive(self.chain.with_group(name))
    }
}
