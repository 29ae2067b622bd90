//! Telemetry inspection commands

use anyhow::Result;
use colored::Colorize;
use serde::Serialize;
use tabled::Tabled;

use super::Session;
use crate::output::{color_status, format_value, label, print_heading, print_info, print_rows};

/// List output, keeping the parse statistics alongside the items
#[derive(Serialize)]
struct Listing<T: Serialize> {
    count: usize,
    data: Vec<T>,
    skipped_lines: usize,
}

impl<T: Serialize> Listing<T> {
    fn new(data: Vec<T>, skipped_lines: usize) -> Self {
        Self {
            count: data.len(),
            data,
            skipped_lines,
        }
    }
}

#[derive(Tabled)]
struct SampleRow {
    #[tabled(rename = "Name")]
    name: String,
    #[tabled(rename = "Labels")]
    labels: String,
    #[tabled(rename = "Value")]
    value: String,
    #[tabled(rename = "Type")]
    metric_type: String,
}

#[derive(Tabled)]
struct SignalRow {
    #[tabled(rename = "Metric")]
    metric: String,
    #[tabled(rename = "Category")]
    category: String,
    #[tabled(rename = "Value")]
    value: String,
}

#[derive(Tabled)]
struct TrendRow {
    #[tabled(rename = "Signal")]
    name: String,
    #[tabled(rename = "Value")]
    value: String,
    #[tabled(rename = "Trend")]
    trend: String,
}

/// Show every parsed sample
pub async fn parse(session: &Session) -> Result<()> {
    let collected = session.collect().await?;
    let listing = Listing::new(collected.samples.clone(), collected.skipped_lines);

    session.emit(listing, &collected, |listing| {
        print_heading("Parsed Samples");
        let rows: Vec<SampleRow> = listing
            .data
            .iter()
            .map(|s| SampleRow {
                name: s.name.clone(),
                labels: s
                    .labels
                    .iter()
                    .map(|(k, v)| format!("{}={}", k, v))
                    .collect::<Vec<_>>()
                    .join(","),
                value: format_value(s.value),
                metric_type: s.metric_type.to_string(),
            })
            .collect();
        print_rows(&rows, "No samples found");

        println!();
        print_info(&format!(
            "{} samples, {} lines skipped",
            listing.count, listing.skipped_lines
        ));
    })
}

/// Show the derived health signals
pub async fn normalize(session: &Session) -> Result<()> {
    let collected = session.collect().await?;
    let listing = Listing::new(collected.normalized.clone(), collected.skipped_lines);

    session.emit(listing, &collected, |listing| {
        print_heading("Normalized Signals");
        let rows: Vec<SignalRow> = listing
            .data
            .iter()
            .map(|s| SignalRow {
                metric: s.metric.to_string().cyan().to_string(),
                category: label(&s.category),
                value: format!("{:.4}", s.value),
            })
            .collect();
        print_rows(&rows, "No signals could be derived from these metrics");
    })
}

/// Show trend-annotated agent input
pub async fn signals(session: &Session) -> Result<()> {
    let collected = session.collect().await?;
    let input = session.pipeline.to_agent_input(collected.clone());

    session.emit(input.signals, &collected, |signals| {
        print_heading("Agent Signals");
        println!("Source: {}   Window: {}", signals.source, signals.window);
        println!();

        let rows: Vec<TrendRow> = signals
            .signals
            .iter()
            .map(|s| TrendRow {
                name: s.name.to_string(),
                value: format!("{:.4}", s.value),
                trend: color_status(&label(&s.trend)),
            })
            .collect();
        print_rows(&rows, "No signals could be derived from these metrics");
    })
}
