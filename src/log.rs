//! Output sinks for everything the host prints on behalf of a script.

use std::{
    cell::RefCell,
    fs::File,
    io::{self, Stdout, Write},
    path::Path,
    rc::Rc,
    sync::LazyLock,
};

use chrono::Local;
use regex::Regex;

static ANSI_COLOR: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\x1b\[\d\dm").expect("valid ANSI color regex"));

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Level {
    Info,
    Error,
}

/// Destination for formatted host output.
pub trait LogSink {
    fn write(&self, level: Level, message: &str);

    fn info(&self, message: &str) {
        self.write(Level::Info, message);
    }

    fn error(&self, message: &str) {
        self.write(Level::Error, message);
    }
}

pub type SinkRef = Rc<dyn LogSink>;

/// Removes `ESC [ NN m` color sequences.
pub fn strip_ansi(text: &str) -> String {
    ANSI_COLOR.replace_all(text, "").into_owned()
}

/// Info to stdout, errors to stderr.
#[derive(Debug, Default)]
pub struct TerminalSink;

impl LogSink for TerminalSink {
    fn write(&self, level: Level, message: &str) {
        match level {
            Level::Info => println!("{message}"),
            Level::Error => eprintln!("{message}"),
        }
    }
}

/// Duplicates every line to a file (colors stripped) and to the terminal
/// (unmodified). Both levels go to the same pair of streams.
pub struct TeeSink<F: Write, T: Write> {
    file: RefCell<F>,
    terminal: RefCell<T>,
}

impl TeeSink<File, Stdout> {
    /// Truncates or creates `path`.
    pub fn create(path: &Path) -> io::Result<Self> {
        let file = File::create(path)?;
        Ok(Self::new(file, io::stdout()))
    }
}

impl<F: Write, T: Write> TeeSink<F, T> {
    pub fn new(file: F, terminal: T) -> Self {
        Self {
            file: RefCell::new(file),
            terminal: RefCell::new(terminal),
        }
    }

    pub fn into_parts(self) -> (F, T) {
        (self.file.into_inner(), self.terminal.into_inner())
    }
}

impl<F: Write, T: Write> LogSink for TeeSink<F, T> {
    fn write(&self, _level: Level, message: &str) {
        let plain = strip_ansi(message);
        if let Err(err) = writeln!(self.file.borrow_mut(), "{plain}") {
            tracing::warn!(error = %err, "failed to write log file");
        }
        if let Err(err) = writeln!(self.terminal.borrow_mut(), "{message}") {
            tracing::warn!(error = %err, "failed to write terminal output");
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActivityLevel {
    Info,
    Fail,
    Success,
}

impl ActivityLevel {
    fn label(self) -> &'static str {
        match self {
            Self::Info => "info   ",
            Self::Fail => "fail   ",
            Self::Success => "success",
        }
    }
}

/// Writes timestamped script activity lines, dropping a line that repeats the
/// previous one verbatim.
pub struct Reporter {
    sink: SinkRef,
    previous: RefCell<String>,
}

impl Reporter {
    pub fn new(sink: SinkRef) -> Self {
        Self {
            sink,
            previous: RefCell::new(String::new()),
        }
    }

    pub fn sink(&self) -> &SinkRef {
        &self.sink
    }

    pub fn report(&self, level: ActivityLevel, message: &str) {
        let body = format!("{} | {message}", level.label());
        if *self.previous.borrow() == body {
            return;
        }
        let time = Local::now().format("%H:%M:%S");
        self.sink.info(&format!("| {time} | {body}"));
        *self.previous.borrow_mut() = body;
    }
}
