//! Agent commands

use agent_lib::{
    agents::{AlertReport, InvestigationReport},
    analyze_alert, analyze_reliability, evaluate_health,
    ingest::{FileLogSource, LogSource},
    AgentReport, Investigator, Supervisor, SupervisorReport,
};
use anyhow::Result;
use colored::Colorize;
use std::sync::Arc;
use std::time::Duration;
use tabled::Tabled;

use super::Session;
use crate::output::{
    color_score, color_status, format_percent, label, print_error, print_heading, print_info,
    print_rows, print_success, print_warning,
};

/// Caller-side bound on one model call from the CLI
const MODEL_DEADLINE: Duration = Duration::from_secs(15);

#[derive(Tabled)]
struct RiskRow {
    #[tabled(rename = "Risk")]
    risk_type: String,
    #[tabled(rename = "Probability")]
    probability: String,
    #[tabled(rename = "Severity")]
    severity: String,
    #[tabled(rename = "Prediction")]
    prediction: String,
}

#[derive(Tabled)]
struct AgentRow {
    #[tabled(rename = "Agent")]
    agent: String,
    #[tabled(rename = "Status")]
    status: String,
}

/// Evaluate the health rules
pub async fn health(session: &Session) -> Result<()> {
    let collected = session.collect().await?;
    let report = evaluate_health(&collected.normalized);

    session.emit(report, &collected, |report| {
        print_heading("Health");
        println!(
            "Status:   {}",
            color_status(&label(&report.health_status)).bold()
        );
        for issue in &report.issues {
            println!("  - {}", issue);
        }
        println!();
        println!("{}", report.message);
    })
}

/// Score reliability and list predicted risks
pub async fn reliability(session: &Session) -> Result<()> {
    let collected = session.collect().await?;
    let report = analyze_reliability(&collected.normalized);

    session.emit(report, &collected, |report| {
        print_heading("Reliability");
        println!(
            "Status:            {}",
            color_status(&label(&report.reliability_status)).bold()
        );
        println!("Reliability score: {}", color_score(report.reliability_score));
        println!("Risk score:        {:.1} / 10", report.risk_score);
        println!();

        let rows: Vec<RiskRow> = report
            .predicted_risks
            .iter()
            .map(|r| RiskRow {
                risk_type: r.risk_type.clone(),
                probability: format_percent(r.probability),
                severity: color_status(&label(&r.severity)),
                prediction: r.prediction.clone(),
            })
            .collect();
        print_rows(&rows, "No risks predicted");
    })
}

/// Scan a log file for errors and explain them
pub async fn investigate(session: &Session, log: Option<String>) -> Result<()> {
    let collected = session.collect().await?;
    let source: Arc<dyn LogSource> =
        Arc::new(FileLogSource::new(log.unwrap_or_else(|| session.log_path.clone())));

    let report = Investigator::new(session.generator(None))
        .with_deadline(MODEL_DEADLINE)
        .run(Some(source.as_ref()), &collected.normalized)
        .await;

    session.emit(report, &collected, print_investigation)
}

/// Ask the model for an alert about the current signals
pub async fn alert(session: &Session, api_key: Option<String>) -> Result<()> {
    let collected = session.collect().await?;
    let generator = session.generator(api_key.as_deref());
    let report = analyze_alert(generator.as_ref(), &collected.normalized, MODEL_DEADLINE).await;

    session.emit(report, &collected, print_alert)
}

/// Run the selected agents and synthesize their findings
pub async fn supervise(
    session: &Session,
    agents: Vec<String>,
    log: Option<String>,
    api_key: Option<String>,
) -> Result<()> {
    // Reject unknown agents before any fetch
    Supervisor::parse_agents(agents.as_slice())?;

    let collected = session.collect().await?;
    let log_source: Arc<dyn LogSource> =
        Arc::new(FileLogSource::new(log.unwrap_or_else(|| session.log_path.clone())));

    let report = Supervisor::new(session.generator.clone())
        .with_model_config(session.model_config.clone())
        .supervise(
            agents.as_slice(),
            &collected.normalized,
            Some(log_source),
            api_key.as_deref(),
        )
        .await?;

    session.emit(report, &collected, print_supervision)
}

fn print_investigation(report: &InvestigationReport) {
    print_heading("Investigation");
    if let Some(location) = &report.log_source {
        println!("Log:      {}", location.cyan());
    }
    if let Some(error) = &report.log_error {
        print_warning(error);
    }
    println!(
        "Scanned:  {} lines, {} errors, {} critical",
        report.summary.total_lines_scanned, report.summary.error_count, report.summary.critical_count
    );
    println!("{}", report.message);

    for snippet in &report.snippets {
        println!();
        println!(
            "{} line {} ({})",
            color_status(&label(&snippet.error_type)).bold(),
            snippet.line_number,
            snippet.suspected_cause_location.dimmed()
        );
        for line in &snippet.content {
            println!("  {}", line);
        }
    }

    if !report.metric_issues.is_empty() {
        println!();
        println!("{}", "Metric issues".bold());
        for issue in &report.metric_issues {
            println!("  - {}", issue);
        }
    }

    if let Some(root_cause) = &report.root_cause {
        println!();
        println!("{}", "Root cause".bold());
        match (&root_cause.summary, &root_cause.error) {
            (Some(summary), _) => {
                println!("Summary:  {}", summary);
                if let Some(cause) = &root_cause.suspected_cause {
                    println!("Cause:    {}", cause);
                }
                if let Some(fix) = &root_cause.recommended_fix {
                    println!("Fix:      {}", fix.green());
                }
            }
            (None, Some(error)) => print_warning(error),
            (None, None) => {}
        }
    }
}

fn print_alert(report: &AlertReport) {
    print_heading("Alert");
    match (&report.analysis, &report.error) {
        (Some(analysis), _) => {
            println!("Issue:      {}", analysis.issue.bold());
            println!("Why:        {}", analysis.why);
            println!("Suggestion: {}", analysis.suggestion.green());
        }
        (None, Some(error)) => print_warning(error),
        (None, None) => print_info("No alert generated"),
    }
}

fn print_supervision(report: &SupervisorReport) {
    print_heading("Supervisor");

    let rows: Vec<AgentRow> = report
        .agent_results
        .iter()
        .map(|(agent, result)| AgentRow {
            agent: agent.clone(),
            status: color_status(result.status_label()),
        })
        .collect();
    print_rows(&rows, "No agents were run");

    for (agent, result) in &report.agent_results {
        if let AgentReport::Failed(failure) = result {
            print_error(&format!("{}: {}", agent, failure.error));
        }
    }

    let analysis = &report.supervisor_analysis;
    println!();
    println!("{}", "Overview".bold());
    println!("{}", analysis.overview_report);
    for suggestion in &analysis.general_suggestions {
        println!("  - {}", suggestion);
    }

    if let Some(warning) = &analysis.warning {
        print_warning(warning);
    } else if let Some(error) = &analysis.error {
        print_error(error);
    } else {
        print_success("Synthesis complete");
    }
}
