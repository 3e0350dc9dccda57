use parking_lot::Mutex;
use std::error::Error;
use std::fs::{File, OpenOptions};
use std::io::{self, Write};
use std::panic::{self, AssertUnwindSafe};
use std::path::Path;
use std::sync::Arc;

/// Text-consuming diagnostic sink injected into a database.
pub type LogSink = Arc<dyn Fn(&str) + Send + Sync>;

pub const DEFAULT_DISPLAY_WIDTH: usize = 80;

/// A sink that discards everything.
pub fn noop_sink() -> LogSink {
    Arc::new(|_: &str| {})
}

/// A sink appending one line per message to `path`.
///
/// The file is truncated when the sink is created and starts with a single
/// start-up line. Write failures are logged and otherwise ignored.
pub fn file_sink(path: impl AsRef<Path>) -> io::Result<LogSink> {
    let path = path.as_ref().to_path_buf();
    let mut file = File::create(&path)?;
    writeln!(file, "Starting vidb")?;
    drop(file);

    let file = OpenOptions::new().append(true).open(&path)?;
    let file = Mutex::new(file);
    Ok(Arc::new(move |message: &str| {
        let mut file = file.lock();
        if let Err(e) = writeln!(file, "{message}") {
            log::warn!("Failed to write to log file {}: {e}", path.display());
        }
    }))
}

/// Routes store diagnostics to the `log` facade, the injected sink, and, for
/// failures, a banner on stderr.
#[derive(Clone)]
pub struct Diagnostics {
    sink: LogSink,
    width: usize,
}

impl Diagnostics {
    pub fn new(sink: LogSink, width: usize) -> Self {
        Diagnostics { sink, width }
    }

    /// Low-level trace of store activity. Sink only, plus `log::debug!`.
    pub fn trace(&self, message: &str) {
        log::debug!("{message}");
        self.emit(message);
    }

    /// Something the operator should see, e.g. a default being substituted.
    pub fn notice(&self, message: &str) {
        log::warn!("{message}");
        eprintln!("{message}");
        self.emit(message);
    }

    /// Report a caught failure with its full source chain.
    pub fn report(&self, stage: &str, err: &(dyn Error + 'static)) {
        let detail = error_chain(err);
        log::error!("{stage} error: {detail}");

        eprintln!("{}", self.banner(&format!("{stage} error")));
        eprintln!("{detail}");
        eprintln!("Caught {} error, continuing", stage.to_lowercase());

        self.emit(&format!("\n\n\n{stage} error\n\n{detail}\n\n\n"));
    }

    /// `title` centered in a rule of the configured display width.
    pub fn banner(&self, title: &str) -> String {
        let pad = self.width.saturating_sub(title.chars().count()) / 2;
        let rule = "─".repeat(pad);
        format!("{rule}{title}{rule}")
    }

    fn emit(&self, message: &str) {
        let sink = &self.sink;
        if panic::catch_unwind(AssertUnwindSafe(|| sink(message))).is_err() {
            log::warn!("Log sink panicked; message dropped");
        }
    }
}

impl Default for Diagnostics {
    fn default() -> Self {
        Diagnostics::new(noop_sink(), DEFAULT_DISPLAY_WIDTH)
    }
}

/// Render an error followed by each of its sources.
pub fn error_chain(err: &(dyn Error + 'static)) -> String {
    let mut out = err.to_string();
    let mut source = err.source();
    while let Some(cause) = source {
        out.push_str("\n  caused by: ");
        out.push_str(&cause.to_string());
        source = cause.source();
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::VidbError;
    use tempfile::TempDir;

    fn capture() -> (LogSink, Arc<Mutex<Vec<String>>>) {
        let lines = Arc::new(Mutex::new(Vec::new()));
        let captured = Arc::clone(&lines);
        let sink: LogSink = Arc::new(move |m: &str| captured.lock().push(m.to_string()));
        (sink, lines)
    }

    #[test]
    fn test_banner_centered() {
        let diag = Diagnostics::new(noop_sink(), 10);
        assert_eq!(diag.banner("ab"), "────ab────");
        let narrow = Diagnostics::new(noop_sink(), 1);
        assert_eq!(narrow.banner("title"), "title");
    }

    #[test]
    fn test_report_sends_full_chain() {
        let (sink, lines) = capture();
        let diag = Diagnostics::new(sink, 40);
        let err = VidbError::Persist {
            path: "db.json".into(),
            source: io::Error::new(io::ErrorKind::PermissionDenied, "read-only"),
        };
        diag.report("Updating", &err);

        let lines = lines.lock();
        assert_eq!(lines.len(), 1);
        assert!(lines[0].contains("Updating error"));
        assert!(lines[0].contains("db.json"));
        assert!(lines[0].contains("caused by: read-only"));
    }

    #[test]
    fn test_panicking_sink_is_not_fatal() {
        let sink: LogSink = Arc::new(|_: &str| panic!("sink broke"));
        let diag = Diagnostics::new(sink, 80);
        diag.trace("still alive");
    }

    #[test]
    fn test_file_sink_truncates_and_appends() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("log.txt");
        std::fs::write(&path, "old contents\n").unwrap();

        let sink = file_sink(&path).unwrap();
        sink("first");
        sink("second");

        let text = std::fs::read_to_string(&path).unwrap();
        assert_eq!(text, "Starting vidb\nfirst\nsecond\n");
    }
}
