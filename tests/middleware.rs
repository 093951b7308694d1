use std::error::Error;
use std::sync::Arc;
use std::thread;

use chrono::{DateTime, Utc};
use tracing::Level;
use tracing_ctx_attrs::{
    attr::Attr,
    capture::{CaptureError, CaptureHandler},
    context::LogContext,
    extract::AttrExtractor,
    handler::Handler,
    middleware::{middleware, ContextHandler},
    record::LogRecord,
};

fn pipeline() -> (CaptureHandler, Arc<dyn Handler>) {
    let capture = CaptureHandler::new();
    let sink: Arc<dyn Handler> = Arc::new(capture.clone());
    (capture, middleware()(sink))
}

fn emit(handler: &Arc<dyn Handler>, ctx: &LogContext, attrs: Vec<Attr>) {
    let record = LogRecord::new(Level::INFO, "msg").with_attrs(attrs);
    handler.handle(ctx, record).expect("handle");
}

#[test]
fn request_group_scenario() {
    let (capture, root) = pipeline();
    let handler = root
        .with_group("req")
        .with_attrs(vec![Attr::new("method", "GET")]);
    let ctx = LogContext::new().add_to_group("req", [Attr::new("status", 200)]);

    emit(&handler, &ctx, vec![Attr::new("path", "/x")]);

    assert_eq!(
        capture.last_attrs().unwrap(),
        vec![Attr::group(
            "req",
            vec![
                Attr::new("status", 200),
                Attr::new("method", "GET"),
                Attr::new("path", "/x"),
            ]
        )]
    );
}

#[test]
fn added_attrs_scenario() {
    let (capture, root) = pipeline();
    let handler = root.with_attrs(vec![Attr::new("service", "api")]);
    let ctx = LogContext::new().add([Attr::new("trace_id", "abc")]);

    emit(&handler, &ctx, vec![Attr::new("msg_attr", 1)]);

    assert_eq!(
        capture.last_attrs().unwrap(),
        vec![
            Attr::new("trace_id", "abc"),
            Attr::new("service", "api"),
            Attr::new("msg_attr", 1),
        ]
    );
}

#[test]
fn empty_everything_yields_no_attrs() {
    let (capture, handler) = pipeline();
    emit(&handler, &LogContext::new(), Vec::new());
    assert_eq!(capture.last_attrs().unwrap(), Vec::<Attr>::new());
}

#[test]
fn siblings_keep_call_order_across_scopes() {
    let (capture, root) = pipeline();
    let handler = root
        .with_attrs(vec![Attr::new("a", 1)])
        .with_attrs(vec![Attr::new("b", 2), Attr::new("c", 3)])
        .with_group("g")
        .with_attrs(vec![Attr::new("d", 4)]);

    emit(&handler, &LogContext::new(), vec![Attr::new("e", 5), Attr::new("f", 6)]);

    assert_eq!(
        capture.last_attrs().unwrap(),
        vec![
            Attr::new("a", 1),
            Attr::new("b", 2),
            Attr::new("c", 3),
            Attr::group(
                "g",
                vec![Attr::new("d", 4), Attr::new("e", 5), Attr::new("f", 6)]
            ),
        ]
    );
}

#[test]
fn group_context_applied_once_when_group_reopened() {
    let (capture, root) = pipeline();
    let handler = root
        .with_group("g")
        .with_attrs(vec![Attr::new("outer", true)])
        .with_group("g");
    let ctx = LogContext::new().add_to_group("g", [Attr::new("ctx", 1)]);

    emit(&handler, &ctx, Vec::new());

    assert_eq!(
        capture.last_attrs().unwrap(),
        vec![Attr::group(
            "g",
            vec![
                Attr::new("outer", true),
                Attr::group("g", vec![Attr::new("ctx", 1)]),
            ]
        )]
    );
}

#[test]
fn orphaned_group_surfaces_at_root() {
    let (capture, root) = pipeline();
    let handler = root.with_attrs(vec![Attr::new("svc", "api")]);
    let ctx = LogContext::new()
        .add([Attr::new("added", 1)])
        .add_to_group("db", [Attr::new("rows", 3)]);

    emit(&handler, &ctx, vec![Attr::new("rec", 0)]);

    assert_eq!(
        capture.last_attrs().unwrap(),
        vec![
            Attr::new("added", 1),
            Attr::new("rows", 3),
            Attr::new("svc", "api"),
            Attr::new("rec", 0),
        ]
    );
}

#[test]
fn propagated_attrs_come_before_added() {
    let (capture, handler) = pipeline();
    let ctx = LogContext::new()
        .add([Attr::new("user", "u1")])
        .propagate([Attr::new("trace_id", "abc")]);

    emit(&handler, &ctx, Vec::new());
    emit(&handler, &ctx.detached(), Vec::new());

    let records = capture.records();
    assert_eq!(
        records[0].attrs,
        vec![Attr::new("trace_id", "abc"), Attr::new("user", "u1")]
    );
    assert_eq!(records[1].attrs, vec![Attr::new("trace_id", "abc")]);
}

#[test]
fn deriving_does_not_affect_siblings() {
    let (capture, root) = pipeline();
    let parent = root.with_group("req");
    let before = parent.with_attrs(vec![Attr::new("left", 1)]);
    let _later = parent.with_attrs(vec![Attr::new("right", 2)]).with_group("x");
    let _more = before.with_attrs(vec![Attr::new("child", 3)]);

    emit(&before, &LogContext::new(), Vec::new());

    assert_eq!(
        capture.last_attrs().unwrap(),
        vec![Attr::group("req", vec![Attr::new("left", 1)])]
    );
}

#[test]
fn record_metadata_is_preserved_and_input_untouched() {
    let (capture, root) = pipeline();
    let handler = root.with_attrs(vec![Attr::new("svc", "api")]);
    let record = LogRecord::new(Level::WARN, "careful")
        .with_target("app::db")
        .with_location("src/db.rs", 7)
        .with_attrs([Attr::new("q", "select")]);

    handler.handle(&LogContext::new(), record.clone()).unwrap();

    let records = capture.records();
    let out = &records[0];
    assert_eq!(out.timestamp, record.timestamp);
    assert_eq!(out.level, Level::WARN);
    assert_eq!(out.message, "careful");
    assert_eq!(out.target, "app::db");
    assert_eq!(out.line, Some(7));
    assert_eq!(out.attrs, vec![Attr::new("svc", "api"), Attr::new("q", "select")]);
    assert_eq!(record.attrs, vec![Attr::new("q", "select")]);
}

#[test]
fn downstream_error_is_returned_unchanged() {
    let failing = CaptureHandler::failing("sink offline");
    let handler = ContextHandler::new(Arc::new(failing));

    let err = handler
        .handle(&LogContext::new(), LogRecord::new(Level::ERROR, "x"))
        .unwrap_err();

    assert_eq!(
        err.downcast_ref::<CaptureError>(),
        Some(&CaptureError("sink offline".to_string()))
    );
}

#[test]
fn enabled_delegates_to_next() {
    struct WarnOnly;
    impl Handler for WarnOnly {
        fn enabled(&self, _ctx: &LogContext, level: Level) -> bool {
            level <= Level::WARN
        }
        fn handle(&self, _ctx: &LogContext, _record: LogRecord) -> Result<(), Box<dyn Error + Send + Sync>> {
            Ok(())
        }
        fn with_attrs(&self, _attrs: Vec<Attr>) -> Arc<dyn Handler> {
            Arc::new(WarnOnly)
        }
        fn with_group(&self, _name: &str) -> Arc<dyn Handler> {
            Arc::new(WarnOnly)
        }
    }

    let handler = ContextHandler::new(Arc::new(WarnOnly)).with_group("g");
    let ctx = LogContext::new();
    assert!(handler.enabled(&ctx, Level::ERROR));
    assert!(handler.enabled(&ctx, Level::WARN));
    assert!(!handler.enabled(&ctx, Level::INFO));
}

#[test]
fn custom_extractors_run_in_registration_order() {
    let capture = CaptureHandler::new();
    let by_level = |_: &LogContext, _: DateTime<Utc>, level: Level, _: &str| {
        vec![Attr::new("severity", level.to_string())]
    };
    let by_message = |_: &LogContext, _: DateTime<Utc>, _: Level, message: &str| {
        vec![Attr::new("msg_len", message.len() as u64)]
    };
    let by_level: Arc<dyn AttrExtractor> = Arc::new(by_level);
    let by_message: Arc<dyn AttrExtractor> = Arc::new(by_message);
    let extractors = vec![by_level, by_message];
    let handler = ContextHandler::with_extractors(Arc::new(capture.clone()), extractors)
        .with_attrs(vec![Attr::new("svc", "api")]);

    handler
        .handle(&LogContext::new(), LogRecord::new(Level::ERROR, "four"))
        .unwrap();

    assert_eq!(
        capture.last_attrs().unwrap(),
        vec![
            Attr::new("severity", "ERROR"),
            Attr::new("msg_len", 4u64),
            Attr::new("svc", "api"),
        ]
    );
}

#[test]
fn chained_middleware_composes() {
    let capture = CaptureHandler::new();
    let inner: Arc<dyn Handler> = Arc::new(ContextHandler::new(Arc::new(capture.clone())));
    let outer = middleware()(inner).with_group("app");
    let ctx = LogContext::new().add([Attr::new("req_id", "r1")]);

    emit(&outer, &ctx, vec![Attr::new("k", "v")]);

    // Each layer prepends the context's added attributes.
    assert_eq!(
        capture.last_attrs().unwrap(),
        vec![
            Attr::new("req_id", "r1"),
            Attr::new("req_id", "r1"),
            Attr::group("app", vec![Attr::new("k", "v")]),
        ]
    );
}

#[test]
fn shared_ancestor_used_from_many_threads() {
    let (capture, root) = pipeline();
    let shared = root.with_attrs(vec![Attr::new("svc", "api")]).with_group("req");

    let workers: Vec<_> = (0..8)
        .map(|i| {
            let handler = shared.with_attrs(vec![Attr::new("worker", i as i64)]);
            thread::spawn(move || {
                let ctx = LogContext::new().add_to_group("req", [Attr::new("id", i as i64)]);
                emit(&handler, &ctx, Vec::new());
            })
        })
        .collect();
    for worker in workers {
        worker.join().unwrap();
    }

    let records = capture.records();
    assert_eq!(records.len(), 8);
    for record in records {
        let inner = record.attrs[1].value.as_group().unwrap();
        assert_eq!(record.attrs[0], Attr::new("svc", "api"));
        assert_eq!(inner[0].key, "id");
        assert_eq!(inner[1].key, "worker");
        assert_eq!(inner[0].value, inner[1].value);
    }
}
