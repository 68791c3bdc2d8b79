use env_logger::{Builder, Env, Target};
use std::fs::File;
use std::io::{self, Write};
use std::sync::Mutex;

use crate::config::Config;

// Lets env_logger share one log file between threads.
struct MutexWriter {
    inner: Mutex<File>,
}

impl MutexWriter {
    fn new(file: File) -> Self {
        Self {
            inner: Mutex::new(file),
        }
    }

    fn file(&self) -> io::Result<std::sync::MutexGuard<'_, File>> {
        self.inner
            .lock()
            .map_err(|_| io::Error::new(io::ErrorKind::Other, "log file lock poisoned"))
    }
}

impl Write for MutexWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.file()?.write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.file()?.flush()
    }
}

/// Logs go to `COHOST_LOG_FILE` when set, stderr otherwise. `RUST_LOG`
/// overrides the default `info` filter.
pub fn setup_logging(config: &Config) -> Result<(), Box<dyn std::error::Error>> {
    let mut builder = Builder::from_env(Env::default().default_filter_or("info"));

    if let Some(path) = &config.log_file {
        let writer = MutexWriter::new(File::create(path)?);
        builder
            .target(Target::Pipe(Box::new(writer)))
            .format(|buf, record| writeln!(buf, "[{}] - {}", record.level(), record.args()));
    }

    builder.try_init()?;
    Ok(())
}
