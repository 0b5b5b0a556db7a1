use crate::company::{CandidateCompany, CandidateId};
use crate::inn::InnKind;
use crate::session::SessionStats;
use anyhow::Result;
use chrono::Utc;
use csv::Writer;
use indexmap::IndexMap;
use serde::Serialize;
use std::fs::File;
use std::io::Write;
use tracing::{debug, info};

pub type Companies = IndexMap<CandidateId, CandidateCompany>;

#[derive(Serialize)]
struct JsonExport<'a> {
    summary: ExportSummary,
    companies: &'a Companies,
}

#[derive(Debug, Serialize)]
pub struct ExportSummary {
    pub query: String,
    pub total_companies: usize,
    pub organizations: usize,
    pub individuals: usize,
    pub with_email: usize,
    pub with_phone: usize,
    pub generated_at: String,
}

impl ExportSummary {
    pub fn new(query: &str, companies: &Companies) -> Self {
        let count_kind = |kind: InnKind| {
            companies
                .values()
                .filter(|c| c.inn_kind() == Some(kind))
                .count()
        };

        ExportSummary {
            query: query.to_string(),
            total_companies: companies.len(),
            organizations: count_kind(InnKind::Organization),
            individuals: count_kind(InnKind::Individual),
            with_email: companies.values().filter(|c| c.email.is_some()).count(),
            with_phone: companies.values().filter(|c| c.phone.is_some()).count(),
            generated_at: Utc::now().format("%Y-%m-%d %H:%M:%S UTC").to_string(),
        }
    }
}

pub fn write_csv<W: Write>(companies: &Companies, writer: W) -> Result<()> {
    let mut wtr = Writer::from_writer(writer);

    wtr.write_record(["ID", "Legal Name", "INN", "Website", "Email", "Phone"])?;

    for company in companies.values() {
        wtr.write_record([
            company.id.to_string().as_str(),
            company.legal_name.as_str(),
            company.inn.as_str(),
            company.website.as_str(),
            company.email.as_deref().unwrap_or(""),
            company.phone.as_deref().unwrap_or(""),
        ])?;
    }

    wtr.flush()?;
    Ok(())
}

pub fn export_csv(companies: &Companies, output_path: &str) -> Result<()> {
    debug!("Exporting {} companies to CSV: {}", companies.len(), output_path);

    let file = File::create(output_path)?;
    write_csv(companies, file)?;

    info!("Successfully exported {} companies to CSV: {}", companies.len(), output_path);
    Ok(())
}

/// Pretty JSON `{summary, companies}` with companies keyed by id
pub fn write_json<W: Write>(companies: &Companies, query: &str, mut writer: W) -> Result<()> {
    let json_output = JsonExport {
        summary: ExportSummary::new(query, companies),
        companies,
    };

    let json_string = serde_json::to_string_pretty(&json_output)?;
    writer.write_all(json_string.as_bytes())?;
    writer.write_all(b"\n")?;
    Ok(())
}

pub fn export_json(companies: &Companies, query: &str, output_path: &str) -> Result<()> {
    debug!("Exporting {} companies to JSON: {}", companies.len(), output_path);

    let file = File::create(output_path)?;
    write_json(companies, query, file)?;

    info!("Successfully exported {} companies to JSON: {}", companies.len(), output_path);
    Ok(())
}

/// Fixed-width table for the terminal
pub fn render_table(companies: &Companies) -> String {
    if companies.is_empty() {
        return "No companies found.\n".to_string();
    }

    let headers = ["ID", "Legal Name", "INN", "Website", "Email", "Phone"];
    let rows: Vec<[String; 6]> = companies
        .values()
        .map(|c| {
            [
                c.id.to_string(),
                c.legal_name.clone(),
                c.inn.clone(),
                c.website.clone(),
                c.email.clone().unwrap_or_else(|| "-".to_string()),
                c.phone.clone().unwrap_or_else(|| "-".to_string()),
            ]
        })
        .collect();

    let mut widths = headers.map(|h| h.chars().count());
    for row in &rows {
        for (width, cell) in widths.iter_mut().zip(row.iter()) {
            *width = (*width).max(cell.chars().count());
        }
    }

    let format_row = |cells: &[&str]| -> String {
        let line = cells
            .iter()
            .zip(widths.iter())
            .map(|(cell, width)| format!("{:<width$}", cell, width = *width))
            .collect::<Vec<_>>()
            .join("  ");
        format!("{}\n", line.trim_end())
    };

    let mut out = format_row(&headers[..]);
    let separator: Vec<String> = widths.iter().map(|w| "-".repeat(*w)).collect();
    out.push_str(&format_row(&separator.iter().map(String::as_str).collect::<Vec<_>>()));
    for row in &rows {
        out.push_str(&format_row(&row.iter().map(String::as_str).collect::<Vec<_>>()));
    }
    out
}

pub fn print_search_summary(query: &str, companies: &Companies, stats: &SessionStats) {
    let summary = ExportSummary::new(query, companies);

    eprintln!("\n=== Search Summary ===");
    eprintln!("Query: {}", summary.query);
    eprintln!("Companies found: {}", summary.total_companies);
    if summary.total_companies > 0 {
        eprintln!("  Organizations: {}", summary.organizations);
        eprintln!("  Individual entrepreneurs: {}", summary.individuals);
        eprintln!("  With email: {}", summary.with_email);
        eprintln!("  With phone: {}", summary.with_phone);
    }
    eprintln!("Result pages fetched: {}", stats.pages_fetched);
    eprintln!("URLs visited: {} ({} without data)", stats.urls_visited, stats.pages_without_data);
    eprintln!("Duplicates suppressed: {}", stats.duplicates_suppressed);
    eprintln!("======================\n");
}
