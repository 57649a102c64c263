//! Human and machine readable discovery reports.

use std::collections::BTreeMap;
use std::fmt::Write as _;

use clap::ValueEnum;
use serde::Serialize;
use volgrid_discovery::{DiscoveryOutcome, StatusPayload, StatusRecord};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
pub enum ReportFormat {
    #[default]
    Text,
    Json,
}

/// Extra material shown next to the discovery outcome.
#[derive(Debug, Clone, Default)]
pub struct ReportContext {
    /// Print the "Found modules" section in text reports.
    pub show_found: bool,
    /// Library slot per missing serial, when slot lookup ran.
    pub missing_slots: BTreeMap<String, String>,
}

#[derive(Serialize)]
struct JsonReport<'a> {
    #[serde(flatten)]
    outcome: &'a DiscoveryOutcome,
    #[serde(skip_serializing_if = "Option::is_none")]
    missing_slots: Option<&'a BTreeMap<String, String>>,
}

pub fn render(
    outcome: &DiscoveryOutcome,
    format: ReportFormat,
    context: &ReportContext,
) -> anyhow::Result<String> {
    match format {
        ReportFormat::Json => {
            let report = JsonReport {
                outcome,
                missing_slots: (!context.missing_slots.is_empty()).then_some(&context.missing_slots),
            };
            Ok(serde_json::to_string_pretty(&report)? + "\n")
        }
        ReportFormat::Text => Ok(format_text(outcome, context)),
    }
}

/// Only non-empty sections are printed. Found modules only on request.
pub fn format_text(outcome: &DiscoveryOutcome, context: &ReportContext) -> String {
    let mut out = String::new();

    if context.show_found && !outcome.resolved.is_empty() {
        out.push_str("Found modules:\n");
        for record in &outcome.resolved {
            let _ = writeln!(out, "  {}", found_line(record));
        }
    }
    if !outcome.conflicts.is_empty() {
        out.push_str("Module conflicts:\n");
        for c in &outcome.conflicts {
            let _ = writeln!(out, "  {:<10} : {:>10} {:>10}", c.host, c.bank_a, c.bank_b);
        }
    }
    if !outcome.missing.is_empty() {
        out.push_str("Missing modules:\n");
        for serial in &outcome.missing {
            match context.missing_slots.get(serial) {
                Some(slot) => {
                    let _ = writeln!(out, "  {serial} (slot = {slot})");
                }
                None => {
                    let _ = writeln!(out, "  {serial}");
                }
            }
        }
    }
    section(&mut out, "Modules not ready", &outcome.not_ready);
    section(&mut out, "Incomplete modules", &outcome.incomplete);
    out
}

fn found_line(record: &StatusRecord) -> String {
    match &record.payload {
        StatusPayload::Module { bank_a, bank_b } => format!(
            "{:<10} : {:>10} {:>10}   {}",
            record.origin_host, bank_a, bank_b, record.state
        ),
        StatusPayload::DiskArray { .. } => {
            let slots: Vec<String> = record
                .slots()
                .into_iter()
                .map(|(slot, serial)| format!("{slot}:{serial}"))
                .collect();
            format!("{:<10} : {}   {}", record.origin_host, slots.join(" "), record.state)
        }
        StatusPayload::Unknown => format!("{:<10} : ?", record.origin_host),
    }
}

fn section(out: &mut String, title: &str, items: &[String]) {
    if items.is_empty() {
        return;
    }
    let _ = writeln!(out, "{title}:");
    for item in items {
        let _ = writeln!(out, "  {item}");
    }
}
