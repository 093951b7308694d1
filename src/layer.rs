use crate::attr::{Attr, Value};
use crate::context::LogContext;
use crate::handler::Handler;
use crate::record::LogRecord;
use chrono::Utc;
use std::sync::Arc;
use tracing::field::{Field, Visit};
use tracing::{span, Event, Subscriber};
use tracing_subscriber::layer::{Context, Layer};
use tracing_subscriber::registry::LookupSpan;

/// `tracing_subscriber` layer that turns events into [`LogRecord`]s and
/// passes them to a [`Handler`] pipeline.
///
/// Fields of the spans an event is in are applied with `with_attrs`, root
/// span first. With [`with_span_groups`](Self::with_span_groups) each span
/// also opens a group named after it, so context attributes staged with
/// [`LogContext::add_to_group`] for that span name are nested inside it.
/// The context is the one installed by [`LogContext::scope`].
pub struct AttrLayer {
    handler: Arc<dyn Handler>,
    span_groups: bool,
}

impl AttrLayer {
    pub fn new(handler: Arc<dyn Handler>) -> Self {
        AttrLayer {
            handler,
            span_groups: false,
        }
    }

    pub fn with_span_groups(mut self, enabled: bool) -> Self {
        self.span_groups = enabled;
        self
    }
}

/// Fields recorded on a span, stored in its extensions.
struct SpanAttrs(Vec<Attr>);

impl<S> Layer<S> for AttrLayer
where
    S: Subscriber + for<'span> LookupSpan<'span>,
{
    fn on_new_span(&self, attrs: &span::Attributes<'_>, id: &span::Id, ctx: Context<'_, S>) {
        let Some(span) = ctx.span(id) else {
            return;
        };
        let mut fields = Vec::new();
        attrs.record(&mut FieldVisitor {
            attrs: &mut fields,
            message: None,
        });
        span.extensions_mut().insert(SpanAttrs(fields));
    }

    fn on_record(&self, id: &span::Id, values: &span::Record<'_>, ctx: Context<'_, S>) {
        let Some(span) = ctx.span(id) else {
            return;
        };
        let mut extensions = span.extensions_mut();
        if let Some(SpanAttrs(fields)) = extensions.get_mut::<SpanAttrs>() {
            values.record(&mut FieldVisitor {
                attrs: fields,
                message: None,
            });
        }
    }

    fn on_event(&self, event: &Event<'_>, ctx: Context<'_, S>) {
        let meta = event.metadata();
        let log_ctx = LogContext::current();
        if !self.handler.enabled(&log_ctx, *meta.level()) {
            return;
        }

        let mut handler = Arc::clone(&self.handler);
        if let Some(scope) = ctx.event_scope(event) {
            for span in scope.from_root() {
                if self.span_groups {
                    handler = handler.with_group(span.name());
                }
                if let Some(SpanAttrs(fields)) = span.extensions().get::<SpanAttrs>() {
                    handler = handler.with_attrs(fields.clone());
                }
            }
        }

        let mut attrs = Vec::new();
        let mut message = None;
        event.record(&mut FieldVisitor {
            attrs: &mut attrs,
            message: Some(&mut message),
        });

        let record = LogRecord {
            timestamp: Utc::now(),
            level: *meta.level(),
            message: message.unwrap_or_default(),
            target: meta.target().to_string(),
            module_path: meta.module_path().map(|s| s.to_string()),
            file: meta.file().map(|s| s.to_string()),
            line: meta.line(),
            attrs,
        };

        if let Err(e) = handler.handle(&log_ctx, record) {
            eprintln!("log handler failed: {}", e);
        }
    }
}

/// Collects `tracing` fields as [`Attr`]s. The `message` field is routed
/// to `message` when one is given.
struct FieldVisitor<'a> {
    attrs: &'a mut Vec<Attr>,
    message: Option<&'a mut Option<String>>,
}

impl FieldVisitor<'_> {
    fn take_message(&mut self, field: &Field, text: impl FnOnce() -> String) -> bool {
        if field.name() != "message" {
            return false;
        }
        match &mut self.message {
            Some(message) => {
                **message = Some(text());
                true
            }
            None => false,
        }
    }

    fn push(&mut self, field: &Field, value: impl Into<Value>) {
        self.attrs.push(Attr::new(field.name(), value));
    }
}

impl Visit for FieldVisitor<'_> {
    fn record_str(&mut self, field: &Field, value: &str) {
        if !self.take_message(field, || value.to_string()) {
            self.push(field, value);
        }
    }

    fn record_i64(&mut self, field: &Field, value: i64) {
        self.push(field, value);
    }

    fn record_u64(&mut self, field: &Field, value: u64) {
        self.push(field, value);
    }

    fn record_f64(&mut self, field: &Field, value: f64) {
        self.push(field, value);
    }

    fn record_bool(&mut self, field: &Field, value: bool) {
        self.push(field, value);
    }

    fn record_debug(&mut self, field: &Field, value: &dyn std::fmt::Debug) {
        if !self.take_message(field, || format!("{:?}", value)) {
            self.push(field, format!("{:?}", value));
        }
    }
}
