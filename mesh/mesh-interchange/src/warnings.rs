//! Warning side channel of a read.
//!
//! Warnings never change the outcome of a read. Every warning is logged with
//! `tracing` and forwarded to the callback registered on the reader, if any.

use std::fmt;
use std::path::PathBuf;

use hashbrown::HashMap;
use tracing::warn;

/// Number of warnings of one kind delivered before further ones are dropped.
pub const WARNING_REPEAT_LIMIT: usize = 10;

/// Where a warning originated.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WarningContext {
    /// One-based line number in the source, for text formats.
    pub line: Option<usize>,
    /// Auxiliary file involved (e.g. an OBJ material library).
    pub path: Option<PathBuf>,
}

impl WarningContext {
    /// Context pointing at a source line.
    #[must_use]
    pub const fn line(line: usize) -> Self {
        Self {
            line: Some(line),
            path: None,
        }
    }

    /// Context pointing at an auxiliary file.
    #[must_use]
    pub fn path(path: impl Into<PathBuf>) -> Self {
        Self {
            line: None,
            path: Some(path.into()),
        }
    }
}

/// A non-fatal problem found while reading.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReadWarning {
    /// Human readable description.
    pub message: String,
    /// Optional location data.
    pub context: Option<WarningContext>,
}

impl fmt::Display for ReadWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.context {
            Some(WarningContext {
                line: Some(line), ..
            }) => write!(f, "line {line}: {}", self.message),
            Some(WarningContext {
                path: Some(path), ..
            }) => write!(f, "{}: {}", path.display(), self.message),
            _ => f.write_str(&self.message),
        }
    }
}

/// Callback receiving warnings.
pub type WarningHandler<'a> = dyn FnMut(&ReadWarning) + Send + 'a;

/// Warning sink for one read.
pub struct Warnings<'a> {
    handler: Option<&'a mut WarningHandler<'a>>,
    repeats: HashMap<&'static str, usize>,
    emitted: usize,
}

impl fmt::Debug for Warnings<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Warnings")
            .field("has_handler", &self.handler.is_some())
            .field("emitted", &self.emitted)
            .finish_non_exhaustive()
    }
}

impl<'a> Warnings<'a> {
    /// Sink forwarding to `handler`.
    #[must_use]
    pub fn new(handler: Option<&'a mut WarningHandler<'a>>) -> Self {
        Self {
            handler,
            repeats: HashMap::new(),
            emitted: 0,
        }
    }

    /// Sink that only logs.
    #[must_use]
    pub fn silent() -> Self {
        Self::new(None)
    }

    /// Number of warnings delivered so far.
    #[must_use]
    pub const fn emitted(&self) -> usize {
        self.emitted
    }

    /// Emit a warning.
    pub fn emit(&mut self, message: impl Into<String>, context: Option<WarningContext>) {
        let warning = ReadWarning {
            message: message.into(),
            context,
        };
        warn!("{warning}");
        self.emitted += 1;
        if let Some(handler) = self.handler.as_deref_mut() {
            handler(&warning);
        }
    }

    /// Emit a warning that may repeat once per line.
    ///
    /// Warnings sharing `kind` are delivered [`WARNING_REPEAT_LIMIT`] times;
    /// the last delivered one says that further ones are suppressed.
    pub fn emit_repeated(
        &mut self,
        kind: &'static str,
        message: impl Into<String>,
        context: Option<WarningContext>,
    ) {
        let count = self.repeats.entry(kind).or_insert(0);
        *count += 1;
        match (*count).cmp(&WARNING_REPEAT_LIMIT) {
            std::cmp::Ordering::Less => self.emit(message, context),
            std::cmp::Ordering::Equal => {
                let mut message = message.into();
                message.push_str(" (additional messages suppressed)");
                self.emit(message, context);
            }
            std::cmp::Ordering::Greater => {}
        }
    }
}
