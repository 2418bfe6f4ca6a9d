//! The built-in `writer` tool server: creates/appends rows
//! in a tabular spreadsheet file under `<root>/excel/`.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use calamine::{open_workbook, Reader, Xlsx};
use orch_proto::error::ToolError;
use orch_proto::tool::ToolServerHandle;
use rust_xlsxwriter::Workbook;
use serde::Deserialize;
use serde_json::Value;

/// The one tool this server exposes.
pub const TOOL_WRITE_ROWS: &str = "write_rows";

/// Environment-driven configuration for [`WriterServer`].
#[derive(Debug, Clone)]
pub struct Config {
    /// Root directory the writer owns. Spreadsheets live under
    /// `<root>/excel/`.
    pub storage_root: PathBuf,
}

impl Config {
    /// Build from `ORCH_TOOL_STORAGE_ROOT`, defaulting to `./data`.
    pub fn from_env() -> Self {
        Self {
            storage_root: std::env::var("ORCH_TOOL_STORAGE_ROOT")
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from("./data")),
        }
    }
}

#[derive(Debug, Deserialize)]
struct WriteRowsInput {
    rows: Vec<serde_json::Map<String, Value>>,
    #[serde(default)]
    columns: Option<Vec<String>>,
    #[serde(default)]
    file_name: Option<String>,
    #[serde(default)]
    sheet_name: Option<String>,
}

/// Spreadsheet-writer tool server. One instance owns one `<root>/excel/`
/// tree; every call is sandboxed under it (no `..`, no absolute paths,
/// matching the `/files/excel/{path}` sandboxing rule in spec §6).
pub struct WriterServer {
    excel_root: PathBuf,
}

impl WriterServer {
    /// Build a writer rooted at `config.storage_root/excel`.
    pub fn new(config: Config) -> std::io::Result<Self> {
        let excel_root = config.storage_root.join("excel");
        std::fs::create_dir_all(&excel_root)?;
        Ok(Self { excel_root })
    }

    /// Resolve a caller-supplied file name to a sandboxed path under
    /// `excel_root`, rejecting `..` components and absolute paths.
    fn resolve_path(&self, file_name: &str) -> Result<PathBuf, ToolError> {
        let candidate = Path::new(file_name);
        if candidate.is_absolute() || candidate.components().any(|c| c == std::path::Component::ParentDir) {
            return Err(ToolError::InvalidInput {
                tool: format!("svc.writer.{TOOL_WRITE_ROWS}"),
                message: format!("unsafe file name: {file_name}"),
            });
        }
        Ok(self.excel_root.join(candidate))
    }

    fn write_rows(&self, input: WriteRowsInput) -> Result<PathBuf, ToolError> {
        let sheet_name = input.sheet_name.unwrap_or_else(|| "Sheet1".to_string());
        let mut file_name = input.file_name.unwrap_or_else(|| sheet_name.clone());
        if !file_name.to_lowercase().ends_with(".xlsx") {
            file_name.push_str(".xlsx");
        }
        let path = self.resolve_path(&file_name)?;

        let columns = resolve_columns(input.columns, &input.rows);

        let mut existing_rows: Vec<Vec<String>> = Vec::new();
        if path.exists() {
            existing_rows = read_existing_rows(&path, &sheet_name)?;
        }

        let mut workbook = Workbook::new();
        let sheet = workbook
            .add_worksheet()
            .set_name(&sheet_name)
            .map_err(|e| write_error(&file_name, e))?;

        for (col_idx, column) in columns.iter().enumerate() {
            sheet
                .write_string(0, col_idx as u16, column)
                .map_err(|e| write_error(&file_name, e))?;
        }

        let mut row_idx = 1u32;
        for row in &existing_rows {
            for (col_idx, value) in row.iter().enumerate() {
                sheet
                    .write_string(row_idx, col_idx as u16, value)
                    .map_err(|e| write_error(&file_name, e))?;
            }
            row_idx += 1;
        }
        for row in &input.rows {
            for (col_idx, column) in columns.iter().enumerate() {
                let cell = row.get(column).map(value_to_cell_string).unwrap_or_default();
                sheet
                    .write_string(row_idx, col_idx as u16, cell)
                    .map_err(|e| write_error(&file_name, e))?;
            }
            row_idx += 1;
        }

        workbook
            .save(&path)
            .map_err(|e| write_error(&file_name, e))?;

        Ok(path)
    }
}

fn write_error(file_name: &str, e: impl std::fmt::Display) -> ToolError {
    ToolError::ExecutionFailed {
        tool: format!("svc.writer.{TOOL_WRITE_ROWS}"),
        message: format!("{file_name}: {e}"),
    }
}

fn value_to_cell_string(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

/// Resolve the target column list: explicit columns
/// win; otherwise infer from the first row's keys; otherwise a single
/// `data` column.
fn resolve_columns(
    explicit: Option<Vec<String>>,
    rows: &[serde_json::Map<String, Value>],
) -> Vec<String> {
    if let Some(columns) = explicit {
        if !columns.is_empty() {
            return columns;
        }
    }
    if let Some(first) = rows.first() {
        let keys: Vec<String> = first.keys().cloned().collect();
        if !keys.is_empty() {
            return keys;
        }
    }
    vec!["data".to_string()]
}

fn read_existing_rows(path: &Path, sheet_name: &str) -> Result<Vec<Vec<String>>, ToolError> {
    let mut workbook: Xlsx<_> = open_workbook(path).map_err(|e| ToolError::ExecutionFailed {
        tool: format!("svc.writer.{TOOL_WRITE_ROWS}"),
        message: format!("reading existing workbook: {e}"),
    })?;

    let range = match workbook.worksheet_range(sheet_name) {
        Ok(range) => range,
        Err(_) => workbook
            .worksheet_range_at(0)
            .transpose()
            .map_err(|e| ToolError::ExecutionFailed {
                tool: format!("svc.writer.{TOOL_WRITE_ROWS}"),
                message: format!("reading existing sheet: {e}"),
            })?
            .ok_or_else(|| ToolError::ExecutionFailed {
                tool: format!("svc.writer.{TOOL_WRITE_ROWS}"),
                message: "workbook has no sheets".to_string(),
            })?,
    };

    let mut rows: Vec<Vec<String>> = Vec::new();
    for (idx, row) in range.rows().enumerate() {
        if idx == 0 {
            continue; // header row, regenerated from `columns`
        }
        rows.push(row.iter().map(|cell| cell.to_string()).collect());
    }
    Ok(rows)
}

#[async_trait]
impl ToolServerHandle for WriterServer {
    fn server_name(&self) -> &str {
        "writer"
    }

    fn tool_names(&self) -> Vec<String> {
        vec![TOOL_WRITE_ROWS.to_string()]
    }

    async fn call(&self, tool_name: &str, params: Value) -> Result<Value, ToolError> {
        if tool_name != TOOL_WRITE_ROWS {
            return Err(ToolError::NotFound(format!("svc.writer.{tool_name}")));
        }
        let input: WriteRowsInput =
            serde_json::from_value(params).map_err(|e| ToolError::InvalidInput {
                tool: format!("svc.writer.{TOOL_WRITE_ROWS}"),
                message: e.to_string(),
            })?;
        let path = self.write_rows(input)?;
        Ok(serde_json::json!({ "file_path": path.to_string_lossy() }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn server() -> (WriterServer, tempfile::TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let server = WriterServer::new(Config {
            storage_root: dir.path().to_path_buf(),
        })
        .unwrap();
        (server, dir)
    }

    #[tokio::test]
    async fn creates_a_new_sheet_with_header_and_rows() {
        let (server, _dir) = server();
        let result = server
            .call(
                TOOL_WRITE_ROWS,
                serde_json::json!({
                    "rows": [{"name": "Ratikesh Misra", "designation": "VP engineering"}],
                    "columns": ["name", "designation"],
                    "file_name": "leads",
                }),
            )
            .await
            .unwrap();
        let path = result["file_path"].as_str().unwrap();
        assert!(path.ends_with("leads.xlsx"));
        assert!(Path::new(path).exists());
    }

    #[tokio::test]
    async fn appending_preserves_prior_rows() {
        let (server, _dir) = server();
        server
            .call(
                TOOL_WRITE_ROWS,
                serde_json::json!({
                    "rows": [{"name": "A"}],
                    "columns": ["name"],
                    "file_name": "leads.xlsx",
                }),
            )
            .await
            .unwrap();
        server
            .call(
                TOOL_WRITE_ROWS,
                serde_json::json!({
                    "rows": [{"name": "B"}],
                    "columns": ["name"],
                    "file_name": "leads.xlsx",
                }),
            )
            .await
            .unwrap();

        let path = server.resolve_path("leads.xlsx").unwrap();
        let rows = read_existing_rows(&path, "Sheet1").unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0][0], "A");
        assert_eq!(rows[1][0], "B");
    }

    #[tokio::test]
    async fn rejects_path_traversal() {
        let (server, _dir) = server();
        let result = server
            .call(
                TOOL_WRITE_ROWS,
                serde_json::json!({"rows": [], "file_name": "../escape.xlsx"}),
            )
            .await;
        assert!(matches!(result, Err(ToolError::InvalidInput { .. })));
    }

    #[tokio::test]
    async fn missing_value_coerces_to_empty_string() {
        let (server, _dir) = server();
        server
            .call(
                TOOL_WRITE_ROWS,
                serde_json::json!({
                    "rows": [{"name": "A"}],
                    "columns": ["name", "designation"],
                    "file_name": "partial.xlsx",
                }),
            )
            .await
            .unwrap();
        let path = server.resolve_path("partial.xlsx").unwrap();
        let rows = read_existing_rows(&path, "Sheet1").unwrap();
        assert_eq!(rows[0][1], "");
    }
}
