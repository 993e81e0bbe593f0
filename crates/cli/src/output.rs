//! Output formatting utilities

use clap::ValueEnum;
use colored::Colorize;
use serde::Serialize;
use std::time::Duration;
use tabled::{settings::Style, Table, Tabled};

/// Output format for CLI commands
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// Table format (default)
    #[default]
    Table,
    /// JSON format
    Json,
}

pub fn print_table<T: Tabled + Serialize>(items: &[T], format: OutputFormat) {
    match format {
        OutputFormat::Table => {
            if items.is_empty() {
                print_warning("No items found");
                return;
            }
            println!("{}", Table::new(items).with(Style::rounded()));
        }
        OutputFormat::Json => print_json(&items),
    }
}

pub fn print_json<T: Serialize + ?Sized>(value: &T) {
    match serde_json::to_string_pretty(value) {
        Ok(json) => println!("{}", json),
        Err(e) => print_error(&format!("Cannot serialize output: {}", e)),
    }
}

pub fn print_success(message: &str) {
    println!("{} {}", "✓".green().bold(), message);
}

pub fn print_error(message: &str) {
    eprintln!("{} {}", "✗".red().bold(), message);
}

pub fn print_warning(message: &str) {
    println!("{} {}", "⚠".yellow().bold(), message);
}

pub fn print_info(message: &str) {
    println!("{} {}", "ℹ".blue().bold(), message);
}

/// Megabytes as a binary-prefixed size
pub fn format_megabytes(mb: i64) -> String {
    const GB: i64 = 1024;
    const TB: i64 = GB * 1024;

    if mb.abs() >= TB {
        format!("{:.2}Ti", mb as f64 / TB as f64)
    } else if mb.abs() >= GB {
        format!("{:.2}Gi", mb as f64 / GB as f64)
    } else {
        format!("{}Mi", mb)
    }
}

/// Coarse age like `3d`, `5h`, `12m` or `40s`
pub fn format_age(age: Duration) -> String {
    let secs = age.as_secs();
    match secs {
        s if s >= 86_400 => format!("{}d", s / 86_400),
        s if s >= 3_600 => format!("{}h", s / 3_600),
        s if s >= 60 => format!("{}m", s / 60),
        s => format!("{}s", s),
    }
}

pub fn color_flag(value: bool, when_true: &str, when_false: &str) -> String {
    if value {
        when_true.green().to_string()
    } else {
        when_false.red().to_string()
    }
}

/// Color a pod or node state name
pub fn color_state(state: &str) -> String {
    match state {
        "running" | "up" => state.green().to_string(),
        "notScheduled" | "bootstrapping" => state.yellow().to_string(),
        "finished" => state.dimmed().to_string(),
        "onWayOut" => state.red().to_string(),
        _ => state.to_string(),
    }
}
