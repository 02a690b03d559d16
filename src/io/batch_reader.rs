//! Upstream detection batch reader
//!
//! Reads JSON lines, one `DetectionBatch` per line, from a file or stdin.
//! Blank lines are ignored; malformed lines are logged and skipped.

use crate::domain::types::DetectionBatch;
use std::path::Path;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader};
use tracing::{debug, warn};

/// Parse one JSON line into a detection batch
pub fn parse_batch_line(line: &str) -> Option<DetectionBatch> {
    let line = line.trim();
    if line.is_empty() {
        return None;
    }

    match serde_json::from_str(line) {
        Ok(batch) => Some(batch),
        Err(e) => {
            warn!(error = %e, "detection_batch_malformed");
            None
        }
    }
}

/// Line-oriented batch reader
pub struct BatchReader<R> {
    lines: tokio::io::Lines<R>,
    line_no: u64,
    malformed: u64,
}

impl<R: AsyncBufRead + Unpin> BatchReader<R> {
    pub fn new(reader: R) -> Self {
        Self { lines: reader.lines(), line_no: 0, malformed: 0 }
    }

    /// Next well-formed batch, `None` at end of input
    pub async fn next_batch(&mut self) -> std::io::Result<Option<DetectionBatch>> {
        while let Some(line) = self.lines.next_line().await? {
            self.line_no += 1;
            if line.trim().is_empty() {
                continue;
            }
            match parse_batch_line(&line) {
                Some(batch) => return Ok(Some(batch)),
                None => {
                    self.malformed += 1;
                    debug!(line = %self.line_no, "detection_batch_skipped");
                }
            }
        }
        Ok(None)
    }

    /// Lines read so far
    pub fn lines_read(&self) -> u64 {
        self.line_no
    }

    pub fn malformed(&self) -> u64 {
        self.malformed
    }
}

/// Input source chosen on the command line
pub enum BatchSource {
    Stdin(BatchReader<BufReader<tokio::io::Stdin>>),
    File(BatchReader<BufReader<tokio::fs::File>>),
}

impl BatchSource {
    /// Open `path`, or stdin when it is `-`
    pub async fn open(path: &Path) -> std::io::Result<Self> {
        if path.as_os_str() == "-" {
            return Ok(BatchSource::Stdin(BatchReader::new(BufReader::new(tokio::io::stdin()))));
        }
        let file = tokio::fs::File::open(path).await?;
        Ok(BatchSource::File(BatchReader::new(BufReader::new(file))))
    }

    pub async fn next_batch(&mut self) -> std::io::Result<Option<DetectionBatch>> {
        match self {
            BatchSource::Stdin(reader) => reader.next_batch().await,
            BatchSource::File(reader) => reader.next_batch().await,
        }
    }

    pub fn malformed(&self) -> u64 {
        match self {
            BatchSource::Stdin(reader) => reader.malformed(),
            BatchSource::File(reader) => reader.malformed(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    const LINE: &str = r#"{"status":"fps 25.0","frames":[{"frame_num":7,"source_id":0,"objects":[{"object_id":3,"class_id":1,"crossings":["N-exit"]}]}]}"#;

    #[test]
    fn test_parse_batch_line() {
        let batch = parse_batch_line(LINE).unwrap();
        assert_eq!(batch.status.as_deref(), Some("fps 25.0"));
        assert_eq!(batch.frames.len(), 1);
        assert_eq!(batch.frames[0].frame_num, 7);
        assert_eq!(batch.frames[0].objects[0].crossings, vec!["N-exit".to_string()]);
        assert!(batch.frames[0].analytics.is_none());
    }

    #[test]
    fn test_parse_rejects_garbage() {
        assert!(parse_batch_line("").is_none());
        assert!(parse_batch_line("   ").is_none());
        assert!(parse_batch_line("{not json").is_none());
        assert!(parse_batch_line(r#"{"frames": 3}"#).is_none());
    }

    #[tokio::test]
    async fn test_reader_skips_blank_and_malformed_lines() {
        let input = format!("{}\n\n{{broken\n{}\n", LINE, LINE);
        let mut reader = BatchReader::new(BufReader::new(input.as_bytes()));

        assert!(reader.next_batch().await.unwrap().is_some());
        assert!(reader.next_batch().await.unwrap().is_some());
        assert!(reader.next_batch().await.unwrap().is_none());
        assert_eq!(reader.lines_read(), 4);
        assert_eq!(reader.malformed(), 1);
    }

    #[tokio::test]
    async fn test_source_reads_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "{}", LINE).unwrap();

        let mut source = BatchSource::open(file.path()).await.unwrap();
        let batch = source.next_batch().await.unwrap().unwrap();
        assert_eq!(batch.frames[0].objects[0].object_id.0, 3);
        assert!(source.next_batch().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_source_missing_file_errors() {
        assert!(BatchSource::open(Path::new("/nonexistent/batches.jsonl")).await.is_err());
    }
}
