//! Table and JSON output for CLI commands.

use serde::Serialize;
use tabled::settings::Style;
use tabled::{Table, Tabled};

/// Output format selection
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, clap::ValueEnum)]
pub enum OutputFormat {
    /// Human-readable table
    #[default]
    Table,
    /// JSON, for scripts
    Json,
}

/// Print rows as a table or a JSON array.
pub fn print_list<T: Serialize + Tabled>(rows: &[T], format: OutputFormat) {
    match format {
        OutputFormat::Table if rows.is_empty() => println!("Nothing to show."),
        OutputFormat::Table => {
            let mut table = Table::new(rows);
            table.with(Style::rounded());
            println!("{table}");
        }
        OutputFormat::Json => {
            let json = serde_json::to_string_pretty(rows).unwrap_or_else(|_| "[]".to_string());
            println!("{json}");
        }
    }
}

pub fn print_success(msg: &str) {
    println!("✓ {msg}");
}

pub fn print_warning(msg: &str) {
    println!("⚠ {msg}");
}

pub fn print_error(msg: &str) {
    eprintln!("✗ {msg}");
}

/// Print an aligned `key: value` line.
pub fn print_kv(key: &str, value: &str) {
    println!("  {:<12} {}", format!("{key}:"), value);
}
