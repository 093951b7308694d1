use crate::attr::{serialize_attrs, Attr};
use chrono::{DateTime, Utc};
use serde::{Serialize, Serializer};
use tracing::Level;

/// A log event as seen by [`Handler`](crate::handler::Handler)s.
///
/// `target`, `module_path`, `file` and `line` identify the call site and
/// are carried through every middleware untouched. `attrs` are the
/// attributes supplied at the call site, oldest first.
#[derive(Debug, Clone, Serialize)]
pub struct LogRecord {
    pub timestamp: DateTime<Utc>,
    #[serde(serialize_with = "serialize_level")]
    pub level: Level,
    pub message: String,
    pub target: String,
    pub module_path: Option<String>,
    pub file: Option<String>,
    pub line: Option<u32>,
    #[serde(serialize_with = "serialize_attr_vec")]
    pub attrs: Vec<Attr>,
}

impl LogRecord {
    /// New record stamped with the current time and no call site.
    pub fn new(level: Level, message: impl Into<String>) -> Self {
        LogRecord {
            timestamp: Utc::now(),
            level,
            message: message.into(),
            target: String::new(),
            module_path: None,
            file: None,
            line: None,
            attrs: Vec::new(),
        }
    }

    pub fn with_target(mut self, target: impl Into<String>) -> Self {
        self.target = target.into();
        self
    }

    pub fn with_location(mut self, file: impl Into<String>, line: u32) -> Self {
        self.file = Some(file.into());
        self.line = Some(line);
        self
    }

    pub fn with_attrs(mut self, attrs: impl IntoIterator<Item = Attr>) -> Self {
        self.add_attrs(attrs);
        self
    }

    /// Append attributes after the ones already on the record.
    pub fn add_attrs(&mut self, attrs: impl IntoIterator<Item = Attr>) {
        self.attrs.extend(attrs);
    }

    /// The same time, level, message and call site, carrying `attrs` in
    /// place of this record's attributes.
    pub fn rebuild(self, attrs: Vec<Attr>) -> LogRecord {
        LogRecord { attrs, ..self }
    }
}

fn serialize_level<S: Serializer>(level: &Level, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.collect_str(level)
}

fn serialize_attr_vec<S: Serializer>(attrs: &Vec<Attr>, serializer: S) -> Result<S::Ok, S::Error> {
    serialize_attrs(attrs, serializer)
}
