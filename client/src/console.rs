// console.rs

use colored::Colorize;
use std::{
    io::{self, Write},
    sync::{Arc, Mutex, MutexGuard},
};

pub const PROMPT: &str = "> ";

/// Shared handle to the terminal output. Both the command loop and the receive
/// task print through it; one call holds the lock for its whole output so a
/// server line and the prompt after it never get split by the other task.
#[derive(Clone)]
pub struct Console {
    out: Arc<Mutex<Box<dyn Write + Send>>>,
}

impl Console {
    pub fn stdout() -> Self {
        Console::from_writer(io::stdout())
    }

    pub fn from_writer(out: impl Write + Send + 'static) -> Self {
        Console { out: Arc::new(Mutex::new(Box::new(out))) }
    }

    pub fn prompt(&self) {
        self.write(PROMPT.as_bytes());
    }

    pub fn println(&self, line: &str) {
        self.write(format!("{line}\n").as_bytes());
    }

    pub fn notice(&self, line: &str) {
        self.println(&line.yellow().to_string());
    }

    pub fn failure(&self, line: &str) {
        self.println(&line.red().to_string());
    }

    /// Prints a line from the server exactly as received, then re-prompts.
    pub fn server_line(&self, line: &[u8]) {
        self.write_parts(&[line, b"\n", PROMPT.as_bytes()]);
    }

    fn write(&self, bytes: &[u8]) {
        self.write_parts(&[bytes]);
    }

    // stdout going away is not worth tearing the session down for
    fn write_parts(&self, parts: &[&[u8]]) {
        let mut out = self.lock();
        let _ = parts
            .iter()
            .try_for_each(|part| out.write_all(part))
            .and_then(|_| out.flush());
    }

    fn lock(&self) -> MutexGuard<'_, Box<dyn Write + Send>> {
        self.out.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}
