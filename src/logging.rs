use anyhow::Result;
use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::Path;
use std::sync::{Arc, Mutex};
use tracing_subscriber::fmt::MakeWriter;
use tracing_subscriber::{EnvFilter, FmtSubscriber};

use crate::platform::{NativePlatform, Platform};

/// Tees formatted log lines to an optional file and, unless suppressed, stdout.
#[derive(Clone)]
pub(crate) struct LogMakeWriter {
    pub file: Option<Arc<Mutex<File>>>,
    pub suppress_stdout: bool,
}

impl<'a> MakeWriter<'a> for LogMakeWriter {
    type Writer = LogWriter;

    fn make_writer(&'a self) -> Self::Writer {
        LogWriter {
            file: self.file.clone(),
            suppress_stdout: self.suppress_stdout,
        }
    }
}

pub(crate) struct LogWriter {
    file: Option<Arc<Mutex<File>>>,
    suppress_stdout: bool,
}

impl Write for LogWriter {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        if let Some(file) = &self.file
            && let Ok(mut file) = file.lock()
        {
            file.write_all(buf)?;
        }
        if !self.suppress_stdout {
            std::io::stdout().write_all(buf)?;
        }
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        if let Some(file) = &self.file
            && let Ok(mut file) = file.lock()
        {
            file.flush()?;
        }
        if !self.suppress_stdout {
            std::io::stdout().flush()?;
        }
        Ok(())
    }
}

/// Install the global subscriber. `RUST_LOG` wins over `level` when set.
pub(crate) fn init(level: &str, log_file: Option<&Path>, suppress_stdout: bool) -> Result<()> {
    let file = match log_file {
        Some(path) => {
            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent)?;
            }
            let file = OpenOptions::new().create(true).append(true).open(path)?;
            NativePlatform::restrict_file_permissions(path);
            Some(Arc::new(Mutex::new(file)))
        }
        None => None,
    };
    let ansi = file.is_none() && !suppress_stdout;

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_ansi(ansi)
        .with_writer(LogMakeWriter {
            file,
            suppress_stdout,
        })
        .finish();
    tracing::subscriber::set_global_default(subscriber).ok(); // already set in tests
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn writer_tees_into_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("run").join("scorekeeper.log");
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        let file = File::create(&path).unwrap();
        let make = LogMakeWriter {
            file: Some(Arc::new(Mutex::new(file))),
            suppress_stdout: true,
        };

        let mut writer = make.make_writer();
        writer.write_all(b"tick committed\n").unwrap();
        writer.flush().unwrap();

        let content = std::fs::read_to_string(&path).unwrap();
        assert_eq!(content, "tick committed\n");
    }
}
