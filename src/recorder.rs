use anyhow::{Context, Result};
use chrono::{Local, SecondsFormat, Utc};
use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::Path;
use std::sync::Mutex;

/// Append-only sink of raw decoded feed events for offline analysis.
/// One record per line: `local_time \t utc_time \t decoded_json`.
pub struct FeedRecorder {
    file: Mutex<File>,
}

impl FeedRecorder {
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path.as_ref())
            .with_context(|| format!("open feed record file {:?}", path.as_ref()))?;
        Ok(Self {
            file: Mutex::new(file),
        })
    }

    pub fn append(&self, decoded_json: &str) -> Result<()> {
        let local = Local::now().to_rfc3339_opts(SecondsFormat::Micros, false);
        let utc = Utc::now().to_rfc3339_opts(SecondsFormat::Micros, true);
        let mut file = self
            .file
            .lock()
            .map_err(|_| anyhow::anyhow!("feed record lock poisoned"))?;
        writeln!(file, "{local}\t{utc}\t{decoded_json}").context("write feed record")?;
        Ok(())
    }
}
