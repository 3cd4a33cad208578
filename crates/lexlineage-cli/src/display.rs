//! Card display for statute groups and amendment chains.
//!
//! A group card is rendered from the group's flattened member rows (one row
//! per version, see `lexlineage_core::tabular`): group fields come from the
//! first row, then one line per version.

use arrow::array::*;
use arrow::datatypes::DataType;
use arrow::record_batch::RecordBatch;
use lexlineage_core::AmendmentChain;

const MAX_MEMBERS: usize = 25;

const GROUP: &[&str] = &[
    "jurisdiction",
    "method",
    "group_confidence",
    "member_count",
    "amendment_count",
    "original_id",
    "group_id",
    "run_id",
];

const TIMESTAMPS: &[&str] = &["created_at", "updated_at"];

// ── Public API ──

/// Print one group's member rows as a card.
pub fn print_group_card(batch: &RecordBatch) -> anyhow::Result<()> {
    if batch.num_rows() == 0 {
        return Ok(());
    }
    let base_name = get_utf8(batch, "base_name", 0).unwrap_or_default();
    println!(
        "=== {} ===",
        if base_name.is_empty() {
            "(untitled)"
        } else {
            base_name.as_str()
        }
    );
    println!();

    print_section(batch, "Group", GROUP);

    println!("Versions");
    let show = batch.num_rows().min(MAX_MEMBERS);
    for row in 0..show {
        println!("  {}", member_line(batch, row));
    }
    if batch.num_rows() > MAX_MEMBERS {
        println!("  ... and {} more", batch.num_rows() - MAX_MEMBERS);
    }
    println!();

    print_section(batch, "Timestamps", TIMESTAMPS);
    Ok(())
}

/// Print an amendment chain, base first.
pub fn print_chain(chain: &AmendmentChain) {
    for line in chain_lines(chain) {
        println!("{line}");
    }
    println!();
}

// ── Rendering ──

fn print_section(batch: &RecordBatch, header: &str, cols: &[&str]) {
    println!("{header}");
    for &col_name in cols {
        if let Some(value) = format_cell(batch, col_name, 0) {
            println!("  {:<18} {}", col_name, value);
        }
    }
    println!();
}

/// `v2   amendment   2017-06-15  Companies (Amendment) Act 2017  [c2]`
fn member_line(batch: &RecordBatch, row: usize) -> String {
    let version = format_cell(batch, "version", row).unwrap_or_else(|| "?".into());
    let relation = get_utf8(batch, "relation", row).unwrap_or_default();
    let date = format_cell(batch, "resolved_date", row).unwrap_or_else(|| "undated".into());
    let title = get_utf8(batch, "title", row).unwrap_or_else(|| "(untitled)".into());
    let id = get_utf8(batch, "statute_id", row).unwrap_or_default();
    format!("v{version:<3} {relation:<11} {date:<11} {title}  [{id}]")
}

fn chain_lines(chain: &AmendmentChain) -> Vec<String> {
    let mut lines = vec![format!(
        "=== {} ({}): {} amendments ===",
        chain.base_name,
        chain.jurisdiction.display_name(),
        chain.amendment_count
    )];
    for member in &chain.members {
        let date = member
            .date
            .map(|d| d.to_string())
            .unwrap_or_else(|| "undated".into());
        lines.push(format!(
            "  {}. {:<11} {:<11} {}  [{}]",
            member.position,
            member.amendment_type.as_str(),
            date,
            member.title.as_deref().unwrap_or("(untitled)"),
            member.statute_id
        ));
    }
    lines
}

/// Type-aware formatting of one cell. `None` for nulls and missing columns.
fn format_cell(batch: &RecordBatch, col_name: &str, row: usize) -> Option<String> {
    let idx = batch.schema().index_of(col_name).ok()?;
    let col = batch.column(idx);
    if col.is_null(row) {
        return None;
    }
    match col.data_type() {
        DataType::Utf8 => col
            .as_any()
            .downcast_ref::<StringArray>()
            .map(|a| a.value(row).to_string()),
        DataType::UInt32 => col
            .as_any()
            .downcast_ref::<UInt32Array>()
            .map(|a| a.value(row).to_string()),
        DataType::Float32 => col
            .as_any()
            .downcast_ref::<Float32Array>()
            .map(|a| format!("{:.2}", a.value(row))),
        DataType::Boolean => col
            .as_any()
            .downcast_ref::<BooleanArray>()
            .map(|a| if a.value(row) { "yes" } else { "no" }.to_string()),
        _ => {
            // Dates and timestamps use Arrow's display formatting.
            let fmt =
                arrow::util::display::ArrayFormatter::try_new(col.as_ref(), &Default::default())
                    .ok()?;
            Some(fmt.value(row).to_string())
        }
    }
}

fn get_utf8(batch: &RecordBatch, col_name: &str, row: usize) -> Option<String> {
    let idx = batch.schema().index_of(col_name).ok()?;
    let col = batch.column(idx);
    if col.is_null(row) {
        return None;
    }
    col.as_any()
        .downcast_ref::<StringArray>()
        .map(|a| a.value(row).to_string())
}
