#![deny(missing_docs)]
//! Data-extraction agent (C10): turns free-form text into structured
//! rows via the reasoner, then hands them to the `writer` tool server
//!. Column/sheet/file-name resolution and row
//! normalization live here as plain functions so they're testable
//! without a live reasoner; `execute` just wires them together.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use async_trait::async_trait;
use orch_proto::agent::{AgentContext, AgentResult, EvaluationResult};
use orch_proto::base::AgentBase;
use orch_proto::context::ContextStore;
use orch_proto::embed::Embedder;
use orch_proto::error::AgentError;
use orch_proto::json_extract::extract_first_json_array;
use orch_proto::reasoner::Reasoner;
use orch_proto::tool::ToolServerHandle;
use orch_proto::Agent;
use orch_registry::AgentBuildArgs;
use serde_json::{Map, Value};

const CALLER_TAG: &str = "data_extraction";
const CONTEXT_INPUT_COLUMN_KEYS: &[&str] = &["columns", "fields", "headers"];
const SHEET_NAME_KEYS: &[&str] = &["sheet_name", "sheet", "worksheet", "tab_name"];
const FILE_NAME_KEYS: &[&str] = &["file_name", "filename", "file", "excel_file_name"];

/// Column/sheet/file resolution, normalization, and row-level
/// evaluation a spreadsheet-writing agent needs. Kept
/// free of any reasoner/tool dependency so it's independently testable.
struct Plan {
    columns: Vec<String>,
    sheet_name: Option<String>,
    file_name: String,
}

/// First non-empty array of strings found under `keys`, trimmed and
/// deduplicated in order.
fn parse_columns_from_input(input: &Map<String, Value>, keys: &[&str]) -> Option<Vec<String>> {
    for key in keys {
        if let Some(Value::Array(items)) = input.get(*key) {
            let strings: Vec<&str> = items.iter().filter_map(Value::as_str).collect();
            if !strings.is_empty() {
                let normalized = normalize_columns(strings.into_iter());
                if !normalized.is_empty() {
                    return Some(normalized);
                }
            }
        }
    }
    None
}

fn normalize_columns<'a>(iter: impl Iterator<Item = &'a str>) -> Vec<String> {
    let mut seen = HashSet::new();
    let mut out = Vec::new();
    for raw in iter {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            continue;
        }
        if seen.insert(trimmed.to_string()) {
            out.push(trimmed.to_string());
        }
    }
    out
}

/// Resolve requested columns: explicit `columns`/`fields`/`headers`
/// array wins, context input before task input; otherwise fall back to
/// the dictionary keys of whichever input carries any.
fn resolve_columns(context_input: &Map<String, Value>, task_input: &Map<String, Value>) -> Vec<String> {
    if let Some(columns) = parse_columns_from_input(context_input, CONTEXT_INPUT_COLUMN_KEYS) {
        return columns;
    }
    if let Some(columns) = parse_columns_from_input(task_input, CONTEXT_INPUT_COLUMN_KEYS) {
        return columns;
    }
    let context_keys = normalize_columns(context_input.keys().map(String::as_str));
    if !context_keys.is_empty() {
        return context_keys;
    }
    normalize_columns(task_input.keys().map(String::as_str))
}

fn parse_first_string(input: &Map<String, Value>, keys: &[&str]) -> Option<String> {
    for key in keys {
        if let Some(s) = input.get(*key).and_then(Value::as_str) {
            let trimmed = s.trim();
            if !trimmed.is_empty() {
                return Some(trimmed.to_string());
            }
        }
    }
    None
}

fn resolve_sheet_name(context_input: &Map<String, Value>, task_input: &Map<String, Value>) -> Option<String> {
    parse_first_string(context_input, SHEET_NAME_KEYS).or_else(|| parse_first_string(task_input, SHEET_NAME_KEYS))
}

fn resolve_file_name(
    context_input: &Map<String, Value>,
    task_input: &Map<String, Value>,
    sheet_name: Option<&str>,
) -> String {
    let explicit = parse_first_string(context_input, FILE_NAME_KEYS).or_else(|| parse_first_string(task_input, FILE_NAME_KEYS));
    let mut name = explicit.or_else(|| sheet_name.map(str::to_string)).unwrap_or_else(|| "extracted_data".to_string());
    if !name.to_lowercase().ends_with(".xlsx") {
        name.push_str(".xlsx");
    }
    name
}

fn build_plan(context_input: &Map<String, Value>, task_input: &Map<String, Value>) -> Plan {
    let columns = resolve_columns(context_input, task_input);
    let sheet_name = resolve_sheet_name(context_input, task_input);
    let file_name = resolve_file_name(context_input, task_input, sheet_name.as_deref());
    Plan {
        columns,
        sheet_name,
        file_name,
    }
}

/// First row's keys, in their own order (used when no explicit column
/// list was resolved and extraction still produced rows).
fn infer_columns(rows: &[Map<String, Value>]) -> Vec<String> {
    rows.first()
        .map(|row| row.keys().cloned().collect())
        .unwrap_or_default()
}

/// Coerce every extracted row onto `columns`, turning every cell into a
/// string (missing or null becomes empty, per the writer's own
/// convention).
fn normalize_rows(raw_rows: &[Map<String, Value>], columns: &[String]) -> Vec<Map<String, Value>> {
    raw_rows
        .iter()
        .map(|row| {
            let mut normalized = Map::new();
            for column in columns {
                let cell = match row.get(column) {
                    Some(Value::String(s)) => s.clone(),
                    Some(Value::Null) | None => String::new(),
                    Some(other) => other.to_string(),
                };
                normalized.insert(column.clone(), Value::String(cell));
            }
            normalized
        })
        .collect()
}

fn build_extraction_prompt(raw_text: &str, columns: &[String]) -> String {
    if columns.is_empty() {
        format!(
            "Extract every row of tabular data you can find in the following \
             text as a JSON array of objects, one object per row, using \
             whatever field names best describe the data. Reply with the \
             JSON array only.\n\n{raw_text}"
        )
    } else {
        format!(
            "Extract every row of tabular data you can find in the following \
             text as a JSON array of objects, one object per row, using \
             exactly these fields: {}. Reply with the JSON array only.\n\n{raw_text}",
            columns.join(", ")
        )
    }
}

/// Per-column pass/fail against the raw extracted rows: a column missing from every row is an error; a column
/// present but holding a non-string, non-null value in some row is a
/// warning.
fn evaluate_extraction(columns: &[String], raw_rows: &[Map<String, Value>]) -> EvaluationResult {
    let mut errors = Vec::new();
    let mut warnings = Vec::new();

    for column in columns {
        let present_anywhere = raw_rows.iter().any(|row| row.contains_key(column));
        if !present_anywhere {
            errors.push(format!("column \"{column}\" was not present in any extracted row"));
            continue;
        }
        let has_non_string_value = raw_rows.iter().any(|row| {
            matches!(row.get(column), Some(v) if !v.is_string() && !v.is_null())
        });
        if has_non_string_value {
            warnings.push(format!("column \"{column}\" holds a non-string value in at least one row"));
        }
    }

    let denom = columns.len().max(1) as f32;
    let score = (1.0 - errors.len() as f32 / denom).max(0.0);
    EvaluationResult {
        passed: errors.is_empty(),
        score,
        errors,
        warnings,
    }
}

/// Reads free-form text, asks the reasoner to structure it into rows,
/// and writes those rows to a spreadsheet through the `writer` tool
/// server.
pub struct DataExtractionAgent {
    reasoner: Arc<dyn Reasoner>,
    tool_servers: HashMap<String, Arc<dyn ToolServerHandle>>,
    embedder: Option<Arc<dyn Embedder>>,
    context_store: Option<Arc<dyn ContextStore>>,
}

impl DataExtractionAgent {
    /// Build an agent around a reasoner and this execution's composed
    /// tool servers.
    pub fn new(reasoner: Arc<dyn Reasoner>, tool_servers: HashMap<String, Arc<dyn ToolServerHandle>>) -> Self {
        Self {
            reasoner,
            tool_servers,
            embedder: None,
            context_store: None,
        }
    }

    /// Adapter matching [`orch_registry::AgentFactory`]'s signature, for
    /// registration under the `"data_extraction"` loadable class name.
    pub fn factory(args: AgentBuildArgs) -> Arc<dyn Agent> {
        Arc::new(Self {
            reasoner: args.reasoner,
            tool_servers: args.tool_servers,
            embedder: args.embedder,
            context_store: args.context_store,
        })
    }
}

#[async_trait]
impl Agent for DataExtractionAgent {
    async fn execute(&self, task_input: Map<String, Value>, context: AgentContext) -> Result<AgentResult, AgentError> {
        let base = AgentBase::new(
            CALLER_TAG,
            self.reasoner.clone(),
            self.tool_servers.clone(),
            self.embedder.clone(),
            self.context_store.clone(),
            context.user_id.clone(),
        );

        let context_input = &context.task_identification.input;
        let plan = build_plan(context_input, &task_input);

        let prompt = build_extraction_prompt(&context.raw_text, &plan.columns);
        let response = base.reason(&prompt, None, None).await;

        let Some(text) = response.text else {
            return Ok(AgentResult::failed(
                response.error.unwrap_or_else(|| "reasoner returned no text".to_string()),
            ));
        };
        let Some(span) = extract_first_json_array(&text) else {
            return Ok(AgentResult::failed("no JSON array found in the reasoner's response"));
        };
        let raw_rows: Vec<Map<String, Value>> = match serde_json::from_str(span) {
            Ok(rows) => rows,
            Err(e) => return Ok(AgentResult::failed(format!("extracted JSON was not a list of row objects: {e}"))),
        };
        if raw_rows.is_empty() {
            return Ok(AgentResult::failed("reasoner extracted zero rows"));
        }

        let columns = if !plan.columns.is_empty() {
            plan.columns
        } else {
            let inferred = infer_columns(&raw_rows);
            if inferred.is_empty() {
                vec!["data".to_string()]
            } else {
                inferred
            }
        };
        let normalized_rows = normalize_rows(&raw_rows, &columns);

        let writer = self.tool_servers.get("writer").ok_or_else(|| {
            AgentError::InvalidInput("data extraction requires a \"writer\" tool server".to_string())
        })?;

        let mut call_params = Map::new();
        call_params.insert("rows".to_string(), Value::Array(normalized_rows.iter().cloned().map(Value::Object).collect()));
        call_params.insert("columns".to_string(), Value::Array(columns.iter().cloned().map(Value::String).collect()));
        call_params.insert("file_name".to_string(), Value::String(plan.file_name));
        if let Some(sheet_name) = plan.sheet_name {
            call_params.insert("sheet_name".to_string(), Value::String(sheet_name));
        }

        let tool_response = writer.call("write_rows", Value::Object(call_params)).await?;
        let file_path = tool_response.get("file_path").and_then(Value::as_str).map(str::to_string);

        let evaluation = evaluate_extraction(&columns, &raw_rows);

        let mut result = Map::new();
        result.insert("extracted_data".to_string(), Value::Array(normalized_rows.iter().cloned().map(Value::Object).collect()));
        result.insert("columns".to_string(), Value::Array(columns.iter().cloned().map(Value::String).collect()));
        result.insert("row_count".to_string(), Value::from(normalized_rows.len()));
        if let Some(path) = &file_path {
            result.insert("excel_file_path".to_string(), Value::String(path.clone()));
        }

        let mut built = AgentResult::completed(result).with_rows(normalized_rows).with_validation(evaluation);
        if let Some(path) = file_path {
            built = built.with_file_path(path);
        }
        Ok(built)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use orch_proto::error::ToolError;
    use orch_proto::id::UserId;
    use orch_proto::model::{AgentResultStatus, TaskIdentificationResult, TaskType};
    use orch_reasoner::MockReasoner;

    fn map(pairs: &[(&str, Value)]) -> Map<String, Value> {
        pairs.iter().map(|(k, v)| (k.to_string(), v.clone())).collect()
    }

    #[test]
    fn resolves_explicit_columns_from_context_before_task_input() {
        let context_input = map(&[("columns", Value::Array(vec![Value::from("name"), Value::from("role")]))]);
        let task_input = map(&[("columns", Value::Array(vec![Value::from("ignored")]))]);
        assert_eq!(resolve_columns(&context_input, &task_input), vec!["name", "role"]);
    }

    #[test]
    fn falls_back_to_dictionary_keys_when_no_explicit_columns() {
        let context_input = map(&[("name", Value::from("A")), ("role", Value::from("B"))]);
        let task_input = Map::new();
        let mut resolved = resolve_columns(&context_input, &task_input);
        resolved.sort();
        assert_eq!(resolved, vec!["name", "role"]);
    }

    #[test]
    fn file_name_defaults_to_sheet_name_with_xlsx_suffix() {
        let context_input = map(&[("sheet_name", Value::from("Leads"))]);
        let task_input = Map::new();
        let sheet = resolve_sheet_name(&context_input, &task_input);
        assert_eq!(sheet.as_deref(), Some("Leads"));
        assert_eq!(resolve_file_name(&context_input, &task_input, sheet.as_deref()), "Leads.xlsx");
    }

    #[test]
    fn normalize_rows_coerces_missing_and_non_string_cells() {
        let raw = vec![map(&[("name", Value::from("A")), ("count", Value::from(3))])];
        let columns = vec!["name".to_string(), "count".to_string(), "missing".to_string()];
        let normalized = normalize_rows(&raw, &columns);
        assert_eq!(normalized[0]["name"], Value::from("A"));
        assert_eq!(normalized[0]["count"], Value::from("3"));
        assert_eq!(normalized[0]["missing"], Value::from(""));
    }

    #[test]
    fn evaluate_extraction_flags_absent_column_as_error_and_mixed_type_as_warning() {
        let raw = vec![
            map(&[("name", Value::from("A")), ("count", Value::from(3))]),
            map(&[("name", Value::from("B")), ("count", Value::from("4"))]),
        ];
        let columns = vec!["name".to_string(), "count".to_string(), "missing".to_string()];
        let evaluation = evaluate_extraction(&columns, &raw);
        assert!(!evaluation.passed);
        assert_eq!(evaluation.errors.len(), 1);
        assert_eq!(evaluation.warnings.len(), 1);
        assert!((evaluation.score - (1.0 - 1.0 / 3.0)).abs() < 1e-6);
    }

    struct RecordingWriter {
        calls: tokio::sync::Mutex<Vec<Value>>,
    }

    #[async_trait]
    impl ToolServerHandle for RecordingWriter {
        fn server_name(&self) -> &str {
            "writer"
        }
        fn tool_names(&self) -> Vec<String> {
            vec!["write_rows".to_string()]
        }
        async fn call(&self, tool_name: &str, params: Value) -> Result<Value, ToolError> {
            assert_eq!(tool_name, "write_rows");
            self.calls.lock().await.push(params);
            Ok(serde_json::json!({ "file_path": "/data/excel/extracted_data.xlsx" }))
        }
    }

    fn test_context(input: Map<String, Value>) -> AgentContext {
        AgentContext::new(
            "Name: Ann, Role: VP\nName: Bo, Role: CTO",
            TaskIdentificationResult {
                task_type: TaskType::ExtractDataToSheet,
                confidence: 0.9,
                reasoning: "x".to_string(),
                alternatives: vec![],
                input,
                output: Map::new(),
            },
            UserId::new("u1"),
            vec![],
        )
    }

    #[tokio::test]
    async fn executes_full_pipeline_and_writes_through_the_writer_tool() {
        let reasoner = Arc::new(MockReasoner::always(
            r#"[{"name": "Ann", "role": "VP"}, {"name": "Bo", "role": "CTO"}]"#,
        ));
        let writer = Arc::new(RecordingWriter { calls: tokio::sync::Mutex::new(Vec::new()) });
        let mut servers: HashMap<String, Arc<dyn ToolServerHandle>> = HashMap::new();
        servers.insert("writer".to_string(), writer.clone());

        let agent = DataExtractionAgent::new(reasoner, servers);
        let context_input = map(&[("columns", Value::Array(vec![Value::from("name"), Value::from("role")]))]);
        let result = agent.execute(Map::new(), test_context(context_input)).await.unwrap();

        assert_eq!(result.status, AgentResultStatus::Completed);
        assert_eq!(result.file_path.as_deref(), Some("/data/excel/extracted_data.xlsx"));
        assert_eq!(result.rows.as_ref().unwrap().len(), 2);
        assert!(result.validation.unwrap().passed);
        assert_eq!(writer.calls.lock().await.len(), 1);
    }

    #[tokio::test]
    async fn unparseable_reasoner_output_yields_failed_not_an_error() {
        let reasoner = Arc::new(MockReasoner::always("I could not find any rows."));
        let agent = DataExtractionAgent::new(reasoner, HashMap::new());
        let result = agent.execute(Map::new(), test_context(Map::new())).await.unwrap();
        assert_eq!(result.status, AgentResultStatus::Failed);
    }

    #[tokio::test]
    async fn missing_writer_tool_server_is_a_hard_error_not_a_failed_result() {
        let reasoner = Arc::new(MockReasoner::always(r#"[{"name": "Ann"}]"#));
        let agent = DataExtractionAgent::new(reasoner, HashMap::new());
        let result = agent.execute(Map::new(), test_context(Map::new())).await;
        assert!(matches!(result, Err(AgentError::InvalidInput(_))));
    }
}
