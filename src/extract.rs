use crate::attr::Attr;
use crate::context::LogContext;
use chrono::{DateTime, Utc};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::Level;

/// Produces attributes from the active context and a record's basic fields.
///
/// Extractors run once per handled record, in registration order, and must
/// only read from the context.
pub trait AttrExtractor: Send + Sync {
    fn extract(
        &self,
        ctx: &LogContext,
        time: DateTime<Utc>,
        level: Level,
        message: &str,
    ) -> Vec<Attr>;
}

impl<F> AttrExtractor for F
where
    F: Fn(&LogContext, DateTime<Utc>, Level, &str) -> Vec<Attr> + Send + Sync,
{
    fn extract(
        &self,
        ctx: &LogContext,
        time: DateTime<Utc>,
        level: Level,
        message: &str,
    ) -> Vec<Attr> {
        self(ctx, time, level, message)
    }
}

/// Attributes staged with [`LogContext::propagate`].
pub fn extract_propagated(
    ctx: &LogContext,
    _time: DateTime<Utc>,
    _level: Level,
    _message: &str,
) -> Vec<Attr> {
    ctx.propagated().to_vec()
}

/// Attributes staged with [`LogContext::add`].
pub fn extract_added(
    ctx: &LogContext,
    _time: DateTime<Utc>,
    _level: Level,
    _message: &str,
) -> Vec<Attr> {
    ctx.added().to_vec()
}

/// Attributes staged with [`LogContext::add_to_group`], keyed by group.
pub fn extract_added_to_group(
    ctx: &LogContext,
    _time: DateTime<Utc>,
    _level: Level,
    _message: &str,
) -> BTreeMap<String, Vec<Attr>> {
    ctx.groups().clone()
}

/// Extractors registered by [`ContextHandler::new`](crate::middleware::ContextHandler::new):
/// propagated attributes first, then added ones.
pub fn default_extractors() -> Vec<Arc<dyn AttrExtractor>> {
    let propagated: Arc<dyn AttrExtractor> = Arc::new(extract_propagated);
    let added: Arc<dyn AttrExtractor> = Arc::new(extract_added);
    vec![propagated, added]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builtins_read_staged_attrs() {
        let ctx = LogContext::new()
            .propagate([Attr::new("trace_id", "abc")])
            .add([Attr::new("user", "u1")])
            .add_to_group("req", [Attr::new("status", 200)]);
        let now = Utc::now();

        assert_eq!(
            extract_propagated(&ctx, now, Level::INFO, "m"),
            vec![Attr::new("trace_id", "abc")]
        );
        assert_eq!(
            extract_added(&ctx, now, Level::INFO, "m"),
            vec![Attr::new("user", "u1")]
        );
        let groups = extract_added_to_group(&ctx, now, Level::INFO, "m");
        assert_eq!(groups["req"], vec![Attr::new("status", 200)]);
    }

    #[test]
    fn closures_are_extractors() {
        let by_level = |_: &LogContext, _: DateTime<Utc>, level: Level, _: &str| {
            vec![Attr::new("severity", level.to_string())]
        };
        let extractor: Arc<dyn AttrExtractor> = Arc::new(by_level);
        let out = extractor.extract(&LogContext::new(), Utc::now(), Level::WARN, "m");
        assert_eq!(out, vec![Attr::new("severity", "WARN")]);
    }

    #[test]
    fn default_order_is_propagated_then_added() {
        let ctx = LogContext::new()
            .add([Attr::new("added", 1)])
            .propagate([Attr::new("propagated", 2)]);
        let keys: Vec<String> = default_extractors()
            .iter()
            .flat_map(|e| e.extract(&ctx, Utc::now(), Level::INFO, "m"))
            .map(|a| a.key)
            .collect();
        assert_eq!(keys, vec!["propagated", "added"]);
    }
}
