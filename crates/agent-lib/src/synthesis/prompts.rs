//! Prompt templates for the model-backed steps
//!
//! Each prompt comes with a schema hint describing the JSON object the
//! caller expects back. The hint is sent alongside the prompt, not inside it.

use serde::Serialize;

/// Expected shape of an alert analysis
pub const ALERT_SCHEMA: &str = r#"{
  "issue": "Short description of the problem (e.g. High CPU Latency, Storage Hike, or Healthy State)",
  "why": "Explanation of the cause based on the data",
  "suggestion": "Concrete step to eradicate the issue or improve the system"
}"#;

/// Expected shape of the supervisor overview
pub const SYNTHESIS_SCHEMA: &str = r#"{
  "overview": "A concise paragraph summarizing the overall state of the system.",
  "suggestions": ["Suggestion 1", "Suggestion 2", "..."]
}"#;

/// Expected shape of a log root-cause summary
pub const ROOT_CAUSE_SCHEMA: &str = r#"{
  "summary": "One or two sentences describing what went wrong",
  "suspected_cause": "The most likely root cause, citing file and line when visible",
  "recommended_fix": "Concrete next step for the on-call engineer"
}"#;

fn render<T: Serialize + ?Sized>(data: &T) -> String {
    serde_json::to_string_pretty(data).unwrap_or_else(|e| format!("<unserializable: {}>", e))
}

/// Alert analysis over the current signals
pub struct AlertPrompt;

impl AlertPrompt {
    pub fn build<T: Serialize + ?Sized>(signals: &T) -> String {
        format!(
            "You are an AI Site Reliability Engineer. Analyze the following system metrics:\n\n\
             {}\n\n\
             Identify if there is any performance issue, anomaly, or risk.\n\
             If everything looks healthy, propose a potential future optimization \
             or risk prevention strategy.",
            render(signals)
        )
    }
}

/// Supervisor overview over every agent report
pub struct SynthesisPrompt;

impl SynthesisPrompt {
    pub fn build<T: Serialize + ?Sized>(agent_results: &T) -> String {
        format!(
            "You are a Chief Technology Supervisor AI.\n\
             You have received reports from various sub-agents monitoring a system.\n\n\
             Sub-Agent Reports:\n{}\n\n\
             1. Write a high-level overview summarizing the system status. \
             Is it healthy? At risk? Critical?\n\
             2. Provide general suggestions for the engineering team based on ALL the data \
             (combining logs, metrics, risks).",
            render(agent_results)
        )
    }
}

/// Root-cause summary over log snippets
pub struct RootCausePrompt;

impl RootCausePrompt {
    pub fn build<S, M>(snippets: &S, metric_issues: &M) -> String
    where
        S: Serialize + ?Sized,
        M: Serialize + ?Sized,
    {
        format!(
            "You are an incident investigator reading application logs.\n\n\
             Error snippets (with surrounding context):\n{}\n\n\
             Concurrent metric issues:\n{}\n\n\
             Explain the most likely root cause and how to fix it.",
            render(snippets),
            render(metric_issues)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_alert_prompt_embeds_signals() {
        let prompt = AlertPrompt::build(&serde_json::json!([
            {"metric": "cpu_load_1m", "value": 0.95}
        ]));
        assert!(prompt.contains("cpu_load_1m"));
        assert!(prompt.contains("0.95"));
    }

    #[test]
    fn test_synthesis_prompt_embeds_reports() {
        let prompt = SynthesisPrompt::build(&serde_json::json!({
            "health_agent": {"health_status": "critical"}
        }));
        assert!(prompt.contains("health_agent"));
        assert!(prompt.contains("critical"));
    }

    #[test]
    fn test_root_cause_prompt_with_no_metric_issues() {
        let issues: Vec<String> = Vec::new();
        let prompt = RootCausePrompt::build(&["ERROR boom"], &issues);
        assert!(prompt.contains("ERROR boom"));
        assert!(prompt.contains("[]"));
    }

    #[test]
    fn test_schemas_are_valid_json() {
        for schema in [ALERT_SCHEMA, SYNTHESIS_SCHEMA, ROOT_CAUSE_SCHEMA] {
            let value: serde_json::Value = serde_json::from_str(schema).unwrap();
            assert!(value.is_object());
        }
    }
}
