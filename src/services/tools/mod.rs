//! MCP tool catalogue and execution.

pub mod args;
pub mod catalog;

pub use args::ToolArgs;
pub use catalog::{TOOLS, ToolAction, ToolSpec, find_tool, tool_definitions};

use crate::models::{CallToolResult, ContentBlock, ToolDefinition};
use crate::services::documents::DocumentService;
use crate::services::fhir_client::{FhirClient, SearchParams};
use crate::services::formatting::{
    bundle_entries, bundle_resources, is_operation_outcome, outcome_text, patient_ids_from_conditions,
    patient_summary,
};
use crate::services::medicines::{MedicineQuery, MedicineSearchService};
use crate::services::metrics::AppMetrics;
use catalog::SearchOutput;
use serde_json::{Map, Value, json};
use std::sync::Arc;
use std::time::Instant;
use tracing::{info, warn};

#[derive(Debug, thiserror::Error)]
pub enum ToolError {
    #[error("Unknown tool: {0}")]
    UnknownTool(String),

    #[error("Invalid arguments for tool '{tool}': {message}")]
    InvalidArguments { tool: String, message: String },
}

/// Value produced by a tool before it is wrapped for the wire
#[derive(Debug, Clone, PartialEq)]
pub enum ToolOutput {
    Text(String),
    List(Vec<Value>),
    Object(Value),
}

impl ToolOutput {
    /// Whether the payload reports an upstream failure
    pub fn is_failure(&self) -> bool {
        match self {
            ToolOutput::Object(value) => is_operation_outcome(value) || value.get("error").is_some(),
            _ => false,
        }
    }

    pub fn into_call_result(self) -> CallToolResult {
        match self {
            ToolOutput::Text(text) => CallToolResult {
                content: vec![ContentBlock::text(text.clone())],
                structured_content: Some(json!({ "result": text })),
                is_error: false,
            },
            ToolOutput::List(items) => CallToolResult {
                content: items
                    .iter()
                    .map(|item| match item {
                        Value::String(s) => ContentBlock::text(s.clone()),
                        other => ContentBlock::text(pretty(other)),
                    })
                    .collect(),
                structured_content: Some(json!({ "result": items })),
                is_error: false,
            },
            ToolOutput::Object(value) => CallToolResult {
                content: vec![ContentBlock::text(pretty(&value))],
                structured_content: Some(value),
                is_error: false,
            },
        }
    }
}

fn pretty(value: &Value) -> String {
    serde_json::to_string_pretty(value).unwrap_or_else(|_| value.to_string())
}

/// Runs catalogue tools against the upstream services
pub struct ToolExecutor {
    fhir: Arc<FhirClient>,
    documents: DocumentService,
    medicines: MedicineSearchService,
    metrics: AppMetrics,
}

impl ToolExecutor {
    pub fn new(
        fhir: Arc<FhirClient>,
        medicines: MedicineSearchService,
        metrics: AppMetrics,
    ) -> Self {
        Self {
            documents: DocumentService::new(Arc::clone(&fhir)),
            fhir,
            medicines,
            metrics,
        }
    }

    pub fn definitions(&self) -> Vec<ToolDefinition> {
        tool_definitions()
    }

    /// Execute a tool by name
    ///
    /// Only an unknown tool is an `Err`; argument problems and upstream
    /// failures are reported inside the returned result.
    pub async fn call(
        &self,
        name: &str,
        arguments: Option<Map<String, Value>>,
    ) -> Result<CallToolResult, ToolError> {
        let spec = find_tool(name).ok_or_else(|| ToolError::UnknownTool(name.to_string()))?;
        let started = Instant::now();

        let args = match ToolArgs::parse(spec, arguments) {
            Ok(args) => args,
            Err(e) => {
                warn!(tool = name, error = %e, "Rejected tool arguments");
                self.metrics
                    .record_tool_call(name, "invalid_arguments", started.elapsed());
                return Ok(CallToolResult::error(e.to_string()));
            }
        };

        let output = self.run(spec, &args).await;
        let outcome = if output.is_failure() { "error" } else { "success" };
        let elapsed = started.elapsed();
        self.metrics.record_tool_call(name, outcome, elapsed);
        info!(
            tool = name,
            outcome,
            duration_ms = elapsed.as_millis() as u64,
            "Tool call completed"
        );

        Ok(output.into_call_result())
    }

    async fn run(&self, spec: &ToolSpec, args: &ToolArgs) -> ToolOutput {
        match spec.action {
            ToolAction::Search {
                resource_type,
                filters,
                output,
            } => {
                let mut params = SearchParams::with_count(args.int("count"));
                for (arg, search_param) in filters {
                    params.push(search_param, args.str(arg));
                }
                let bundle = self.fhir.search(resource_type, params).await;
                match output {
                    SearchOutput::Bundle => ToolOutput::Object(bundle),
                    SearchOutput::Resources => ToolOutput::List(bundle_resources(&bundle)),
                    SearchOutput::PatientSummaries => ToolOutput::List(
                        bundle_entries(&bundle)
                            .iter()
                            .filter_map(|entry| entry.get("resource"))
                            .map(|patient| Value::String(patient_summary(patient)))
                            .collect(),
                    ),
                }
            }
            ToolAction::Read {
                resource_type,
                id_param,
            } => {
                let id = args.str(id_param).unwrap_or_default();
                ToolOutput::Object(self.fhir.read(resource_type, id).await)
            }
            ToolAction::PatientSummary => {
                let id = args.str("patient_id").unwrap_or_default();
                let patient = self.fhir.read("Patient", id).await;
                ToolOutput::Text(outcome_text(&patient).unwrap_or_else(|| patient_summary(&patient)))
            }
            ToolAction::Capabilities => ToolOutput::Object(self.fhir.capabilities().await),
            ToolAction::PatientsWithConditions => {
                let params = SearchParams::with_count(args.int("count")).filter("code", args.str("code"));
                let bundle = self.fhir.search("Condition", params).await;
                ToolOutput::List(
                    patient_ids_from_conditions(&bundle)
                        .into_iter()
                        .map(Value::String)
                        .collect(),
                )
            }
            ToolAction::DocumentContent => {
                let id = args.str("document_reference_id").unwrap_or_default();
                ToolOutput::Object(
                    self.documents
                        .get_document_content(id, args.bool("extract_text"))
                        .await,
                )
            }
            ToolAction::MedicineSearch => {
                let query = MedicineQuery {
                    medicine_name: args.str("medicine_name").unwrap_or_default().to_string(),
                    from_index: args.int("from_index"),
                    size: args.int("size"),
                    is_trending: args.bool("is_trending"),
                    pharmacy_type_id: args.int("pharmacy_type_id"),
                };
                ToolOutput::Object(self.medicines.search(&query).await)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_text_output_encoding() {
        let result = ToolOutput::Text("🆔 p1 | Jane Doe | DOB ? | ?".into()).into_call_result();
        assert_eq!(result.content.len(), 1);
        assert_eq!(
            result.structured_content,
            Some(json!({"result": "🆔 p1 | Jane Doe | DOB ? | ?"}))
        );
        assert!(!result.is_error);
    }

    #[test]
    fn test_list_output_encoding() {
        let result = ToolOutput::List(vec![json!("a"), json!({"id": "x"})]).into_call_result();
        assert_eq!(result.content[0], ContentBlock::text("a"));
        assert_eq!(result.content[1], ContentBlock::text("{\n  \"id\": \"x\"\n}"));
        assert_eq!(
            result.structured_content,
            Some(json!({"result": ["a", {"id": "x"}]}))
        );

        let empty = ToolOutput::List(vec![]).into_call_result();
        assert!(empty.content.is_empty());
        assert_eq!(empty.structured_content, Some(json!({"result": []})));
    }

    #[test]
    fn test_object_output_encoding() {
        let bundle = json!({"resourceType": "Bundle", "total": 0});
        let result = ToolOutput::Object(bundle.clone()).into_call_result();
        assert_eq!(result.structured_content, Some(bundle));
    }

    #[test]
    fn test_failure_detection() {
        assert!(ToolOutput::Object(json!({"resourceType": "OperationOutcome"})).is_failure());
        assert!(ToolOutput::Object(json!({"error": "Failed to search medicines"})).is_failure());
        assert!(!ToolOutput::Object(json!({"resourceType": "Bundle"})).is_failure());
        assert!(!ToolOutput::Text("Resource not found".into()).is_failure());
    }
}
