#![allow(dead_code)]

use std::{cell::RefCell, fs, path::Path, rc::Rc};

use jspy_host::log::{Level, LogSink, SinkRef};

/// Records every line written to it.
#[derive(Default)]
pub struct CaptureSink {
    lines: RefCell<Vec<(Level, String)>>,
}

impl CaptureSink {
    pub fn new() -> Rc<Self> {
        Rc::new(Self::default())
    }

    pub fn lines(&self) -> Vec<String> {
        self.lines
            .borrow()
            .iter()
            .map(|(_, line)| line.clone())
            .collect()
    }

    pub fn errors(&self) -> Vec<String> {
        self.lines
            .borrow()
            .iter()
            .filter(|(level, _)| *level == Level::Error)
            .map(|(_, line)| line.clone())
            .collect()
    }

    pub fn contains(&self, needle: &str) -> bool {
        self.lines().iter().any(|line| line.contains(needle))
    }
}

impl LogSink for CaptureSink {
    fn write(&self, level: Level, message: &str) {
        self.lines.borrow_mut().push((level, message.to_string()));
    }
}

pub fn sink_ref(sink: &Rc<CaptureSink>) -> SinkRef {
    Rc::clone(sink) as SinkRef
}

pub fn write_file(root: &Path, relative: &str, contents: &str) {
    let path = root.join(relative);
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).expect("create parent directories");
    }
    fs::write(path, contents).expect("write fixture file");
}
