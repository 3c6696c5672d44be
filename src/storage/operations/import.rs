use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};

use csv::{Reader, ReaderBuilder, StringRecord};
use serde::Serialize;
use thiserror::Error;

use super::membership::record_event;
use crate::storage::client::Store;
use crate::storage::models::ChatEvent;
use crate::storage::models::event::RowProblem;

#[derive(Debug, Error)]
pub enum ImportError {
    #[error("无法打开文件 {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("读取 {path} 失败: {source}")]
    Csv {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },

    #[error("{path} 第 {line} 行格式错误: {problem}")]
    Row {
        path: PathBuf,
        line: u64,
        problem: RowProblem,
    },

    #[error("读取任务异常退出: {0}")]
    Task(#[from] tokio::task::JoinError),
}

/// 单行写入失败
#[derive(Debug, Clone, Serialize)]
pub struct RowFailure {
    pub row: usize,
    pub event: ChatEvent,
    pub error: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct ImportReport {
    /// 作为表头跳过的首行；没有表头时为 `None`
    pub header: Option<Vec<String>>,
    pub rows: usize,
    pub written: usize,
    pub failures: Vec<RowFailure>,
}

/// CSV 导入器
///
/// 读取或解析文件出错时整个导入中止；写入阶段单行失败只记录，继续处理后续行。
/// 行按文件顺序依次写入，保证同一用户的哈希记录以最后一行为准。
#[derive(Debug, Clone)]
pub struct CsvImporter {
    path: PathBuf,
    has_header: bool,
}

impl CsvImporter {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            has_header: true,
        }
    }

    /// 首行是否为表头；表头不计入导入行数
    pub fn has_header(mut self, has_header: bool) -> Self {
        self.has_header = has_header;
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn open(&self, has_header: bool) -> Result<Reader<BufReader<File>>, ImportError> {
        let file = File::open(&self.path).map_err(|source| {
            tracing::error!(path = %self.path.display(), error = %source, "Failed to open file");
            ImportError::Io {
                path: self.path.clone(),
                source,
            }
        })?;

        Ok(ReaderBuilder::new()
            .has_headers(has_header)
            .flexible(true)
            .from_reader(BufReader::new(file)))
    }

    fn csv_error(&self, source: csv::Error) -> ImportError {
        tracing::error!(path = %self.path.display(), error = %source, "Failed to read data from file");
        ImportError::Csv {
            path: self.path.clone(),
            source,
        }
    }

    /// 只读取首行作为表头，空文件返回 `None`
    pub fn read_headers(&self) -> Result<Option<Vec<String>>, ImportError> {
        let mut reader = self.open(true)?;
        let headers = reader.headers().map_err(|e| self.csv_error(e))?;

        if headers.is_empty() {
            tracing::info!(path = %self.path.display(), "File is empty");
            return Ok(None);
        }

        tracing::info!(path = %self.path.display(), "Headers read successfully");
        Ok(Some(headers.iter().map(str::to_string).collect()))
    }

    /// 数据行数（不含表头）
    pub fn count_rows(&self) -> Result<usize, ImportError> {
        let mut reader = self.open(self.has_header)?;
        let mut rows = 0;

        for record in reader.records() {
            record.map_err(|e| self.csv_error(e))?;
            rows += 1;
        }

        Ok(rows)
    }

    /// 读取最多 `limit` 行数据并解析为事件
    pub fn read_records(&self, limit: Option<usize>) -> Result<Vec<ChatEvent>, ImportError> {
        let mut reader = self.open(self.has_header)?;
        let limit = limit.unwrap_or(usize::MAX);
        let mut events = Vec::new();

        for record in reader.records().take(limit) {
            let record = record.map_err(|e| self.csv_error(e))?;
            let event = ChatEvent::try_from(&record).map_err(|problem| {
                let line = record.position().map(|p| p.line()).unwrap_or_default();
                tracing::error!(path = %self.path.display(), line, %problem, "Malformed row");
                ImportError::Row {
                    path: self.path.clone(),
                    line,
                    problem,
                }
            })?;
            events.push(event);
        }

        tracing::info!(path = %self.path.display(), rows_read = events.len(), "Data read successfully");
        Ok(events)
    }

    /// 读取文件并写入存储
    pub async fn import(&self, store: &dyn Store, limit: Option<usize>) -> Result<ImportReport, ImportError> {
        let reader = self.clone();
        let (header, events) = tokio::task::spawn_blocking(move || {
            let header = if reader.has_header { reader.read_headers()? } else { None };
            reader.read_records(limit).map(|events| (header, events))
        })
        .await??;

        if header.as_deref().is_some_and(looks_like_data) {
            tracing::warn!(
                path = %self.path.display(),
                ?header,
                "First row parses as data but was skipped as a header, use --no-header to import it"
            );
        }

        tracing::info!(total_records = events.len(), "Starting to write records");

        let mut written = 0;
        let mut failures = Vec::new();

        for (index, event) in events.iter().enumerate() {
            match record_event(store, event).await {
                Ok(()) => {
                    written += 1;
                    tracing::debug!(row = index + 1, "Record processed");
                }
                Err(err) => {
                    tracing::warn!(
                        row = index + 1,
                        chat_id = %event.chat_id,
                        user_id = %event.user_id,
                        error = %err,
                        "Failed to write record"
                    );
                    failures.push(RowFailure {
                        row: index + 1,
                        event: event.clone(),
                        error: err.to_string(),
                    });
                }
            }
        }

        let report = ImportReport {
            header,
            rows: events.len(),
            written,
            failures,
        };

        tracing::info!(
            rows = report.rows,
            written = report.written,
            failed = report.failures.len(),
            "Import finished"
        );
        Ok(report)
    }
}

/// 表头能按数据行解析，多半是文件本来就没有表头
fn looks_like_data(header: &[String]) -> bool {
    ChatEvent::try_from(&StringRecord::from(header.to_vec())).is_ok()
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use tempfile::NamedTempFile;

    use super::*;

    fn csv_file(content: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(content.as_bytes()).unwrap();
        file
    }

    #[test]
    fn header_read_separately_and_not_counted() {
        let file = csv_file("chat_id,user_id,type,last_event\n1,100,CHANNEL,t1\n2,101,GROUP,t2\n");
        let importer = CsvImporter::new(file.path());

        assert_eq!(
            importer.read_headers().unwrap().unwrap(),
            vec!["chat_id", "user_id", "type", "last_event"]
        );
        assert_eq!(importer.count_rows().unwrap(), 2);
        assert_eq!(importer.read_records(None).unwrap().len(), 2);
    }

    #[test]
    fn limit_caps_rows_read() {
        let file = csv_file("1,100,CHANNEL,t1\n1,101,CHANNEL,t2\n1,102,CHANNEL,t3\n");
        let importer = CsvImporter::new(file.path()).has_header(false);

        assert_eq!(importer.read_records(Some(2)).unwrap().len(), 2);
    }

    #[test]
    fn empty_file_has_no_headers() {
        let file = csv_file("");
        let importer = CsvImporter::new(file.path());

        assert_eq!(importer.read_headers().unwrap(), None);
        assert_eq!(importer.count_rows().unwrap(), 0);
    }

    #[test]
    fn malformed_row_aborts_with_line_number() {
        let file = csv_file("1,100,CHANNEL,t1\nx,101,CHANNEL,t2\n");
        let importer = CsvImporter::new(file.path()).has_header(false);

        let err = importer.read_records(None).unwrap_err();
        assert!(matches!(err, ImportError::Row { line: 2, .. }));
    }

    #[test]
    fn missing_file_is_io_error() {
        let importer = CsvImporter::new("/definitely/not/here.csv");
        assert!(matches!(importer.count_rows(), Err(ImportError::Io { .. })));
    }

    #[test]
    fn numeric_first_row_looks_like_data() {
        let row = |cells: &[&str]| cells.iter().map(|c| c.to_string()).collect::<Vec<_>>();

        assert!(looks_like_data(&row(&["1", "100", "CHANNEL", "t1"])));
        assert!(!looks_like_data(&row(&["chat_id", "user_id", "type", "last_event"])));
    }
}
