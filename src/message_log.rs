use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use std::collections::VecDeque;
use std::fs::OpenOptions;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use tokio::sync::Mutex;
use tracing::{debug, error};

/// A message as it looked when the bot observed it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoggedMessage {
    pub id: u64,
    pub author: u64,
    pub content: String,
    pub created_at: DateTime<Utc>,
}

impl LoggedMessage {
    /// `id:timestamp:author:content`. The timestamp is Unix seconds and content
    /// comes last, so colons inside content survive a `splitn(4, ':')`.
    pub fn to_line(&self) -> String {
        format!(
            "{}:{}:{}:{}",
            self.id,
            self.created_at.timestamp(),
            self.author,
            escape(&self.content)
        )
    }

    #[allow(dead_code)]
    pub fn parse_line(line: &str) -> Result<Self> {
        let mut fields = line.splitn(4, ':');
        let mut next = |name: &str| {
            fields
                .next()
                .with_context(|| format!("Log line is missing the {} field", name))
        };
        let id = next("id")?.parse().context("Invalid message id")?;
        let secs: i64 = next("timestamp")?.parse().context("Invalid timestamp")?;
        let author = next("author")?.parse().context("Invalid author id")?;
        let content = unescape(next("content")?);
        let created_at =
            DateTime::from_timestamp(secs, 0).context("Timestamp out of range")?;

        Ok(Self {
            id,
            author,
            content,
            created_at,
        })
    }
}

fn escape(content: &str) -> String {
    let mut out = String::with_capacity(content.len());
    for c in content.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            c => out.push(c),
        }
    }
    out
}

fn unescape(content: &str) -> String {
    let mut out = String::with_capacity(content.len());
    let mut chars = content.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('n') => out.push('\n'),
            Some('r') => out.push('\r'),
            Some(other) => out.push(other),
            None => out.push('\\'),
        }
    }
    out
}

/// Bounded FIFO of observed messages, drained to an append-only file.
///
/// `record` never drops an entry to make room: when the buffer is full the
/// caller waits for a flush instead. A capacity of 0 disables automatic
/// flushing entirely, so owners must call [`MessageLog::flush`] on shutdown.
pub struct MessageLog {
    capacity: usize,
    buffer: Mutex<VecDeque<LoggedMessage>>,
    // Held across drain + write so batches reach the file in record order.
    writer: Mutex<PathBuf>,
}

impl MessageLog {
    pub fn new(path: impl Into<PathBuf>, capacity: usize) -> Self {
        Self {
            capacity,
            buffer: Mutex::new(VecDeque::new()),
            writer: Mutex::new(path.into()),
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    #[allow(dead_code)]
    pub async fn len(&self) -> usize {
        self.buffer.lock().await.len()
    }

    #[allow(dead_code)]
    pub async fn is_empty(&self) -> bool {
        self.buffer.lock().await.is_empty()
    }

    fn is_full(&self, buffered: usize) -> bool {
        self.capacity > 0 && buffered >= self.capacity
    }

    /// Append a message, flushing first if the buffer is already full and
    /// again once this entry fills it.
    ///
    /// A failed flush still drains the buffer, so the new entry is always
    /// stored; the flush error is returned afterwards.
    pub async fn record(&self, message: LoggedMessage) -> Result<()> {
        let mut flush_error = None;
        let reached_capacity = loop {
            let mut buffer = self.buffer.lock().await;
            if !self.is_full(buffer.len()) {
                buffer.push_back(message);
                break self.is_full(buffer.len());
            }
            drop(buffer);
            // Another recorder may refill the buffer before we re-lock.
            if let Err(e) = self.flush().await {
                flush_error = Some(e);
            }
        };

        if reached_capacity {
            self.flush().await?;
        }
        match flush_error {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    /// Drain every buffered entry and append it to the log file.
    ///
    /// Entries drained by a failed write are not put back; the failure is
    /// logged with the number of lost entries and returned.
    pub async fn flush(&self) -> Result<usize> {
        let path = self.writer.lock().await;
        let batch: Vec<LoggedMessage> = self.buffer.lock().await.drain(..).collect();
        if batch.is_empty() {
            return Ok(0);
        }

        let count = batch.len();
        let result = tokio::task::spawn_blocking({
            let target = path.clone();
            move || append_lines(&target, &batch)
        })
        .await
        .context("Log writer task panicked")
        .and_then(|r| r);

        match result {
            Ok(()) => {
                debug!("Flushed {} message(s) to {}", count, path.display());
                Ok(count)
            }
            Err(e) => {
                error!(
                    "Failed to flush message log to {}; {} message(s) lost: {:#}",
                    path.display(),
                    count,
                    e
                );
                Err(e)
            }
        }
    }
}

fn append_lines(path: &Path, batch: &[LoggedMessage]) -> Result<()> {
    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .with_context(|| format!("Failed to open log file: {}", path.display()))?;
    let mut out = BufWriter::new(file);
    for entry in batch {
        writeln!(out, "{}", entry.to_line())?;
    }
    out.flush()
        .with_context(|| format!("Failed to write log file: {}", path.display()))?;
    Ok(())
}
