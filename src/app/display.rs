//! Terminal rendering for the REPL: tables and status lines.

use colored::*;
use comfy_table::{Attribute, Cell, CellAlignment, ContentArrangement, Table};

use crate::engine::EngineConfig;
use crate::flavor::FlavorCatalog;
use crate::provider::ModelInfo;

/// Prints the flavor catalog as a table, marking the current selection.
pub fn print_flavors(catalog: &FlavorCatalog, selected: &str) {
    let mut table = Table::new();
    table
        .set_header(vec![
            Cell::new("").fg(comfy_table::Color::Cyan),
            Cell::new("Flavor")
                .fg(comfy_table::Color::Cyan)
                .add_attribute(Attribute::Bold),
            Cell::new("Description")
                .fg(comfy_table::Color::Cyan)
                .add_attribute(Attribute::Bold),
        ])
        .load_preset(comfy_table::presets::UTF8_FULL)
        .set_content_arrangement(ContentArrangement::Dynamic);

    for flavor in catalog.flavors() {
        let marker = if flavor.name.eq_ignore_ascii_case(selected) {
            "*"
        } else {
            ""
        };
        table.add_row(vec![
            Cell::new(marker)
                .fg(comfy_table::Color::Green)
                .set_alignment(CellAlignment::Center),
            Cell::new(&flavor.name).fg(comfy_table::Color::Yellow),
            Cell::new(&flavor.description).fg(comfy_table::Color::White),
        ]);
    }

    println!("\n{table}");
    println!(
        "{}",
        "Select with: flavor <name>".bright_black()
    );
}

/// Prints the configured target languages, marking the current selection.
pub fn print_languages(languages: &[String], selected: &str) {
    println!();
    for language in languages {
        if language.eq_ignore_ascii_case(selected) {
            println!("  {} {}", "*".green(), language.yellow());
        } else {
            println!("    {}", language);
        }
    }
    println!("{}", "Select with: lang <language>".bright_black());
}

/// Prints what the engine is currently working with.
pub fn print_status(
    model: Option<&ModelInfo>,
    flavor: &str,
    language: &str,
    config: &EngineConfig,
) {
    println!();
    match model {
        Some(info) => {
            println!(
                "  Model:    {} ({})",
                info.name.bright_green(),
                info.architecture.as_deref().unwrap_or("unknown")
            );
            println!("            {}", info.path.display().to_string().bright_black());
            println!(
                "            context {} | loaded {}",
                info.context_size,
                info.loaded_at.format("%Y-%m-%d %H:%M:%S")
            );
        }
        None => println!("  Model:    {}", "none loaded".yellow()),
    }
    println!("  Flavor:   {}", flavor.yellow());
    println!("  Language: {}", language.yellow());
    println!(
        "  Sampling: temperature {} | top_p {} | max {} tokens",
        config.temperature, config.top_p, config.max_tokens
    );
    println!();
}

/// Prints a finished translation.
pub fn print_translation(text: &str) {
    println!("\n{}\n", text.bright_green());
}
