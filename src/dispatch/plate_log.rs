use std::fs::{File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use chrono::Local;

/// Log file of one plate's run
///
/// Each job owns its own sink; lines read
/// `[2024-01-17 10:00:00,123] [Process ID: 4242] message`.
#[derive(Debug)]
pub struct PlateLog {
    path: PathBuf,
    pid: u32,
    writer: BufWriter<File>,
}

impl PlateLog {
    /// Log path for a plate and run name
    pub fn path_for(log_dir: &Path, plate: &str, run_name: &str) -> PathBuf {
        log_dir.join(format!("{}_{}_run.log", plate, run_name))
    }

    /// Open (appending) the log at `path`, stamping lines with `pid`
    pub fn create<P: AsRef<Path>>(path: P, pid: u32) -> std::io::Result<Self> {
        let path = path.as_ref().to_path_buf();
        let file = OpenOptions::new().create(true).append(true).open(&path)?;
        Ok(Self {
            path,
            pid,
            writer: BufWriter::new(file),
        })
    }

    /// Append one message
    pub fn log(&mut self, message: &str) -> std::io::Result<()> {
        writeln!(
            self.writer,
            "[{}] [Process ID: {}] {}",
            Local::now().format("%Y-%m-%d %H:%M:%S,%3f"),
            self.pid,
            message
        )
    }

    /// Flush and close the log, returning its path
    pub fn finish(mut self) -> std::io::Result<PathBuf> {
        self.writer.flush()?;
        Ok(self.path)
    }
}
