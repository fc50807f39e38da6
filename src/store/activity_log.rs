use super::record::{LogRecord, parse_json_line};
use crate::errors::AppResult;
use crate::models::LogEntry;
use std::collections::VecDeque;
use std::fs::{self, File, OpenOptions};
use std::io::{self, BufRead, BufReader, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use tracing::warn;

/// Append-only activity log mirrored to JSONL and CSV.
///
/// A record whose JSON line landed but whose CSV row did not is remembered,
/// so a retry only writes the missing row.
#[derive(Debug, Clone)]
pub struct ActivityLog {
    json_path: PathBuf,
    csv_path: PathBuf,
    csv_owed: Option<LogRecord>,
}

/// Open `path` for appending. A final line left without its newline by an
/// interrupted write is terminated first so the next record starts clean.
fn open_append(path: &Path) -> io::Result<File> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let mut file = OpenOptions::new()
        .create(true)
        .read(true)
        .append(true)
        .open(path)?;

    let len = file.metadata()?.len();
    if len > 0 {
        let mut last = [0u8; 1];
        file.seek(SeekFrom::Start(len - 1))?;
        file.read_exact(&mut last)?;
        if last[0] != b'\n' {
            warn!(path = %path.display(), "terminating a torn final line");
            file.write_all(b"\n")?;
        }
    }
    Ok(file)
}

impl ActivityLog {
    pub fn new(json_path: PathBuf, csv_path: PathBuf) -> Self {
        Self {
            json_path,
            csv_path,
            csv_owed: None,
        }
    }

    pub fn json_path(&self) -> &Path {
        &self.json_path
    }

    pub fn csv_path(&self) -> &Path {
        &self.csv_path
    }

    /// Durably append one entry to both mirrors.
    pub fn append(&mut self, entry: &LogEntry) -> AppResult<()> {
        let record = LogRecord::from(entry);

        // A row owed for an earlier record goes out before anything newer.
        if let Some(owed) = self.csv_owed.take_if(|owed| *owed != record) {
            if let Err(e) = self.append_csv(&owed) {
                self.csv_owed = Some(owed);
                return Err(e);
            }
        }

        if self.csv_owed.is_none() {
            self.append_json(&record)?;
            self.csv_owed = Some(record.clone());
        }
        self.append_csv(&record)?;
        self.csv_owed = None;

        Ok(())
    }

    fn append_json(&self, record: &LogRecord) -> AppResult<()> {
        let mut line = serde_json::to_string(record)?;
        line.push('\n');
        let mut json = open_append(&self.json_path)?;
        json.write_all(line.as_bytes())?;
        json.sync_data()?;
        Ok(())
    }

    fn append_csv(&self, record: &LogRecord) -> AppResult<()> {
        let csv_file = open_append(&self.csv_path)?;
        let needs_header = csv_file.metadata()?.len() == 0;
        let mut wtr = csv::WriterBuilder::new()
            .has_headers(needs_header)
            .from_writer(csv_file);
        wtr.serialize(record)?;
        wtr.flush()?;
        let csv_file = wtr
            .into_inner()
            .map_err(|e| io::Error::other(format!("CSV flush error: {e}")))?;
        csv_file.sync_data()?;
        Ok(())
    }

    /// The last `n` well-formed entries, oldest first. Malformed lines (for
    /// instance a record cut short by a crash, even mid-character) are skipped.
    pub fn tail(&self, n: usize) -> AppResult<Vec<LogEntry>> {
        let file = match File::open(&self.json_path) {
            Ok(f) => f,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let mut tail = VecDeque::with_capacity(n.min(1024));
        for (idx, raw) in BufReader::new(file).split(b'\n').enumerate() {
            let line = match String::from_utf8(raw?) {
                Ok(line) => line,
                Err(e) => {
                    warn!(line = idx + 1, error = %e, "skipping undecodable activity log line");
                    continue;
                }
            };
            if line.trim().is_empty() {
                continue;
            }
            match parse_json_line(&line) {
                Ok(entry) => {
                    if n == 0 {
                        continue;
                    }
                    if tail.len() == n {
                        tail.pop_front();
                    }
                    tail.push_back(entry);
                }
                Err(e) => warn!(line = idx + 1, error = %e, "skipping malformed activity log line"),
            }
        }

        Ok(tail.into())
    }
}
