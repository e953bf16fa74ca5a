//! Terminal rendering for jobs and leveling reports.
//!
//! Jobs print as a vertical card; reports print as a scope matrix with one
//! column per contractor, followed by totals, qualifications and unmapped scope.

use bidlevel_core::{MatrixCell, ProcessingJob, Qualifications, ScopeStatus};
use bidlevel_store::StoredReport;
use chrono::{DateTime, Utc};

const ITEM_WIDTH: usize = 40;
const CELL_WIDTH: usize = 16;
const MAX_LIST_ITEMS: usize = 10;

// ── Jobs ──

pub fn print_job_card(job: &ProcessingJob) {
    println!("=== job {} ===", job.job_id);
    println!("  {:<16} {}", "division", job.division);
    println!("  {:<16} {}", "status", job.status);
    println!("  {:<16} {}%", "progress", job.progress);
    println!("  {:<16} {}/{}", "batches", job.batches_done, job.batches_total);
    println!("  {:<16} {}", "created", fmt_time(&job.created_at));
    if let Some(started) = &job.started_at {
        println!("  {:<16} {}", "started", fmt_time(started));
    }
    if let Some(finished) = &job.finished_at {
        println!("  {:<16} {}", "finished", fmt_time(finished));
    }
    if let Some(error) = &job.error {
        println!("  {:<16} {}", "error", error);
    }
}

pub fn print_job_table(jobs: &[ProcessingJob]) {
    if jobs.is_empty() {
        println!("no jobs");
        return;
    }
    println!(
        "{:<36}  {:<10}  {:<9}  {:>4}  {:<20}",
        "job_id", "division", "status", "pct", "created"
    );
    for job in jobs {
        println!(
            "{:<36}  {:<10}  {:<9}  {:>3}%  {:<20}",
            job.job_id,
            truncate(&job.division, 10),
            job.status.as_str(),
            job.progress,
            fmt_time(&job.created_at)
        );
    }
}

// ── Reports ──

pub fn print_report(stored: &StoredReport) {
    let report = &stored.report;
    println!(
        "=== Division {}: report {} ({}) ===",
        stored.division,
        stored.report_id,
        fmt_time(&stored.created_at)
    );
    println!();

    print!("{:<ITEM_WIDTH$}", "Scope item");
    for contractor in &report.contractors {
        print!(" {:>CELL_WIDTH$}", truncate(&contractor.name, CELL_WIDTH));
    }
    println!();

    for item in &report.scope_items {
        print!("{:<ITEM_WIDTH$}", truncate(item, ITEM_WIDTH));
        for contractor in &report.contractors {
            let cell = report
                .cell(item, &contractor.contractor_id)
                .copied()
                .unwrap_or_default();
            print!(" {:>CELL_WIDTH$}", fmt_cell(&cell));
        }
        println!();
    }

    print!("{:<ITEM_WIDTH$}", "Total");
    for contractor in &report.contractors {
        let total = contractor.total.map(fmt_money).unwrap_or_else(|| "-".to_string());
        print!(" {:>CELL_WIDTH$}", total);
    }
    println!();

    for contractor in &report.contractors {
        let quals = report.qualifications.get(&contractor.contractor_id);
        let unmapped = report.unmapped.get(&contractor.contractor_id);
        let has_quals = quals.is_some_and(|q| !q.is_empty());
        let has_unmapped = unmapped.is_some_and(|u| !u.is_empty());
        if !has_quals && !has_unmapped {
            continue;
        }
        println!();
        println!("{} ({})", contractor.name, contractor.contractor_id);
        if let Some(q) = quals {
            print_qualifications(q);
        }
        if let Some(items) = unmapped.filter(|u| !u.is_empty()) {
            println!("  Unmapped");
            for item in items.iter().take(MAX_LIST_ITEMS) {
                println!("    - {}: {}", item.name, truncate(&item.evidence, 80));
            }
            if items.len() > MAX_LIST_ITEMS {
                println!("    ... and {} more", items.len() - MAX_LIST_ITEMS);
            }
        }
    }
}

fn print_qualifications(q: &Qualifications) {
    let sections: [(&str, &[String]); 6] = [
        ("Includes", &q.includes),
        ("Excludes", &q.excludes),
        ("Allowances", &q.allowances),
        ("Alternates", &q.alternates),
        ("Payment terms", &q.payment_terms),
        ("Fine print", &q.fine_print),
    ];
    for (header, lines) in sections {
        if lines.is_empty() {
            continue;
        }
        println!("  {header}");
        for line in lines.iter().take(MAX_LIST_ITEMS) {
            println!("    - {line}");
        }
        if lines.len() > MAX_LIST_ITEMS {
            println!("    ... and {} more", lines.len() - MAX_LIST_ITEMS);
        }
    }
}

// ── Formatting helpers ──

fn fmt_cell(cell: &MatrixCell) -> String {
    let mark = match cell.status {
        ScopeStatus::Included => "incl",
        ScopeStatus::Excluded => "excl",
        ScopeStatus::NotSpecified => "-",
    };
    match cell.price {
        Some(price) => format!("{mark} {}", fmt_money(price)),
        None => mark.to_string(),
    }
}

fn fmt_money(amount: f64) -> String {
    let sign = if amount < 0.0 { "-" } else { "" };
    let whole = amount.abs().round() as u64;
    let digits = whole.to_string();
    let mut grouped = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(ch);
    }
    format!("{sign}${grouped}")
}

fn fmt_time(t: &DateTime<Utc>) -> String {
    t.format("%Y-%m-%d %H:%M:%S").to_string()
}

fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        return s.to_string();
    }
    let kept: String = s.chars().take(max.saturating_sub(1)).collect();
    format!("{kept}…")
}
