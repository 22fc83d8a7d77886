//! Printable HTML statement generation.
//!
//! Statements are standalone HTML documents that open the print dialog as
//! soon as they load.

use super::statement::{AgentStatement, CollectionBreakdown};
use crate::analysis::BalanceState;
use crate::config::ReportConfig;
use crate::format;
use crate::models::{CashAdvance, Expense};
use anyhow::{Context, Result};
use std::io::Write;
use std::path::{Path, PathBuf};

const STYLE: &str = "\
body{font-family:Arial,Helvetica,sans-serif;color:#222;margin:24px;}\
h1{margin:0;font-size:20px;}h2{font-size:15px;margin:22px 0 6px;border-bottom:1px solid #999;}\
table{border-collapse:collapse;width:100%;font-size:12px;}\
th,td{border:1px solid #bbb;padding:4px 6px;text-align:left;}\
td.num,th.num{text-align:right;}\
.meta{font-size:12px;color:#555;}\
.balance{margin-top:18px;padding:10px;font-size:15px;font-weight:bold;}\
.surplus{border:2px solid #2e7d32;color:#2e7d32;}\
.deficit{border:2px solid #c62828;color:#c62828;}\
.breakdown{font-size:11px;color:#555;}\
@media print{body{margin:0;}}";

/// Render a complete statement document.
pub fn generate_statement_html(statement: &AgentStatement, config: &ReportConfig) -> String {
    let mut output = String::new();

    output.push_str("<!DOCTYPE html>\n<html lang=\"en\">\n<head>\n<meta charset=\"utf-8\">\n");
    output.push_str(&format!(
        "<title>Statement - {}</title>\n",
        escape_html(&statement.agent.name)
    ));
    output.push_str(&format!("<style>{}</style>\n", STYLE));
    output.push_str("</head>\n<body onload=\"window.print()\">\n");

    output.push_str(&generate_header_section(statement, config));
    output.push_str(&generate_advances_section(&statement.advances, config));
    output.push_str(&generate_collections_section(&statement.collections, config));
    output.push_str(&generate_expenses_section(&statement.expenses, config));
    output.push_str(&generate_balance_section(statement, config));

    output.push_str("</body>\n</html>\n");
    output
}

/// Business name, agent identity, range and generation date.
fn generate_header_section(statement: &AgentStatement, config: &ReportConfig) -> String {
    let mut section = String::new();

    section.push_str("<header>\n");
    section.push_str(&format!("<h1>{}</h1>\n", escape_html(&config.business_name)));
    section.push_str("<p class=\"meta\">Agent Statement</p>\n");
    section.push_str(&format!(
        "<p><strong>Agent:</strong> {} (ID {})",
        escape_html(&statement.agent.name),
        escape_html(&statement.agent.id)
    ));
    if let Some(ref phone) = statement.agent.phone {
        section.push_str(&format!(" &middot; {}", escape_html(phone)));
    }
    section.push_str("</p>\n");
    section.push_str(&format!(
        "<p class=\"meta\">Period: {} &middot; Generated: {}</p>\n",
        escape_html(&statement.range.to_string()),
        format::date(statement.generated_on)
    ));
    section.push_str("</header>\n");

    section
}

fn generate_advances_section(advances: &[CashAdvance], config: &ReportConfig) -> String {
    let mut section = String::new();
    let symbol = &config.currency_symbol;

    section.push_str("<h2>Cash Advances</h2>\n");
    if advances.is_empty() {
        section.push_str("<p class=\"meta\">No advances in this period.</p>\n");
        return section;
    }

    section.push_str("<table>\n<tr><th>Date</th><th>Method</th><th>Signed by</th><th class=\"num\">Amount</th></tr>\n");
    for advance in advances {
        section.push_str(&format!(
            "<tr><td>{}</td><td>{}</td><td>{}</td><td class=\"num\">{}</td></tr>\n",
            format::date(advance.date),
            escape_html(advance.payment_method.as_deref().unwrap_or("-")),
            escape_html(advance.signer.as_deref().unwrap_or("-")),
            escape_html(&format::money(advance.amount, symbol)),
        ));
    }
    section.push_str("</table>\n");

    section
}

fn generate_collections_section(collections: &[CollectionBreakdown], config: &ReportConfig) -> String {
    let mut section = String::new();

    section.push_str("<h2>Fruit Collections</h2>\n");
    if collections.is_empty() {
        section.push_str("<p class=\"meta\">No collections in this period.</p>\n");
        return section;
    }

    section.push_str("<table>\n<tr><th>Date</th><th>Driver</th><th>Breakdown</th><th class=\"num\">Weight</th><th class=\"num\">Spend</th></tr>\n");
    for collection in collections {
        section.push_str(&generate_collection_row(collection, config));
    }
    section.push_str("</table>\n");

    section
}

/// One collection row with its `weight @ price` lines.
fn generate_collection_row(collection: &CollectionBreakdown, config: &ReportConfig) -> String {
    let symbol = &config.currency_symbol;

    let mut breakdown: Vec<String> = collection
        .lines
        .iter()
        .map(|line| {
            format!(
                "{} @ {} = {}",
                format::weight(line.weight_kg),
                format::money(line.price_per_kg, symbol),
                format::money(line.line_total, symbol)
            )
        })
        .collect();
    if let Some(stored) = collection.stored_total {
        breakdown.push(format!("recorded total {}", format::money(stored, symbol)));
    }
    let breakdown = if breakdown.is_empty() {
        "-".to_string()
    } else {
        breakdown
            .iter()
            .map(|line| escape_html(line))
            .collect::<Vec<_>>()
            .join("<br>")
    };

    format!(
        "<tr><td>{}</td><td>{}</td><td class=\"breakdown\">{}</td><td class=\"num\">{}</td><td class=\"num\">{}</td></tr>\n",
        format::date(collection.date),
        escape_html(collection.driver.as_deref().unwrap_or("-")),
        breakdown,
        escape_html(&format::weight(collection.total_weight)),
        escape_html(&format::money(collection.effective_spend, symbol)),
    )
}

fn generate_expenses_section(expenses: &[Expense], config: &ReportConfig) -> String {
    let mut section = String::new();
    let symbol = &config.currency_symbol;

    section.push_str("<h2>Expenses</h2>\n");
    if expenses.is_empty() {
        section.push_str("<p class=\"meta\">No expenses in this period.</p>\n");
        return section;
    }

    section.push_str("<table>\n<tr><th>Date</th><th>Type</th><th>Note</th><th class=\"num\">Amount</th></tr>\n");
    for expense in expenses {
        section.push_str(&format!(
            "<tr><td>{}</td><td>{}</td><td>{}</td><td class=\"num\">{}</td></tr>\n",
            format::date(expense.date),
            escape_html(&expense.expense_type),
            escape_html(expense.note.as_deref().unwrap_or("")),
            escape_html(&format::money(expense.amount, symbol)),
        ));
    }
    section.push_str("</table>\n");

    section
}

/// Totals table and the surplus/deficit line.
fn generate_balance_section(statement: &AgentStatement, config: &ReportConfig) -> String {
    let mut section = String::new();
    let symbol = &config.currency_symbol;
    let totals = &statement.totals;

    section.push_str("<h2>Balance</h2>\n<table>\n");
    for (label, value) in [
        ("Total advances", format::money(totals.total_advances, symbol)),
        ("Total fruit spend", format::money(totals.total_fruit_spend, symbol)),
        ("Total expenses", format::money(totals.total_expenses, symbol)),
        ("Total weight", format::weight(totals.total_weight)),
    ] {
        section.push_str(&format!(
            "<tr><td>{}</td><td class=\"num\">{}</td></tr>\n",
            label,
            escape_html(&value)
        ));
    }
    section.push_str("</table>\n");

    let class = match statement.balance_state {
        BalanceState::Surplus => "surplus",
        BalanceState::Deficit => "deficit",
    };
    section.push_str(&format!(
        "<div class=\"balance {}\">{}: {}</div>\n",
        class,
        statement.balance_state.label(),
        escape_html(&format::money(totals.cash_balance.abs(), symbol))
    ));

    section
}

/// Escape text for HTML element content and attribute values.
pub fn escape_html(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&#39;")
}

/// `statement-ama-owusu-2026-10-18.html`
pub fn statement_file_name(statement: &AgentStatement) -> String {
    let mut slug = String::new();
    for ch in statement.agent.name.chars() {
        if ch.is_ascii_alphanumeric() {
            slug.push(ch.to_ascii_lowercase());
        } else if !slug.ends_with('-') && !slug.is_empty() {
            slug.push('-');
        }
    }
    let slug = slug.trim_end_matches('-');
    let slug = if slug.is_empty() {
        statement.agent.id.as_str()
    } else {
        slug
    };

    format!("statement-{}-{}.html", slug, statement.generated_on)
}

/// Write the statement and return where it went.
///
/// `output` wins when given; otherwise the file lands in the configured
/// output directory under [`statement_file_name`].
pub fn write_statement(
    statement: &AgentStatement,
    config: &ReportConfig,
    output: Option<&Path>,
) -> Result<PathBuf> {
    let path = match output {
        Some(path) => path.to_path_buf(),
        None => {
            let dir = Path::new(&config.output_dir);
            std::fs::create_dir_all(dir)
                .with_context(|| format!("Failed to create {}", dir.display()))?;
            dir.join(statement_file_name(statement))
        }
    };

    let content = generate_statement_html(statement, config);
    let mut file = std::fs::File::create(&path)
        .with_context(|| format!("Failed to create {}", path.display()))?;
    file.write_all(content.as_bytes())
        .with_context(|| format!("Failed to write statement to {}", path.display()))?;

    Ok(path)
}
