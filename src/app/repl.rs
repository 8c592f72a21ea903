//! Interactive translation loop.
//!
//! Reads lines from the terminal, treats a handful of keywords as
//! commands, and translates everything else with the currently
//! selected flavor and target language. A translation in progress can
//! be cancelled with Ctrl-C without tearing the session down.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use colored::*;
use indicatif::{ProgressBar, ProgressStyle};
use rustyline::error::ReadlineError;
use rustyline::DefaultEditor;
use tracing::warn;

use crate::config::Settings;
use crate::engine::{CancellationToken, Translator};
use crate::flavor::FlavorCatalog;

use super::display;

const GREEN: &str = "\x1b[32m";
const CYAN: &str = "\x1b[36m";
const BRIGHT_CYAN: &str = "\x1b[96m";
const RESET: &str = "\x1b[0m";

/// Selections the user can change from the prompt.
struct UiState {
    flavor_name: String,
    target_language: String,
}

impl UiState {
    fn new(settings: &Settings, catalog: &FlavorCatalog) -> Self {
        let flavor_name = catalog
            .get_by_name(&settings.translation.default_flavor)
            .or_else(|| catalog.flavors().first())
            .map(|flavor| flavor.name.clone())
            .unwrap_or_else(|| "Casual".to_string());
        UiState {
            flavor_name,
            target_language: settings.translation.default_target_language.clone(),
        }
    }
}

/// Runs the REPL until the user exits.
pub async fn run(
    translator: Arc<Translator>,
    catalog: FlavorCatalog,
    mut settings: Settings,
    config_dir: PathBuf,
    model_override: Option<PathBuf>,
) -> Result<()> {
    let mut state = UiState::new(&settings, &catalog);

    println!("\n{BRIGHT_CYAN}Welcome to tolk!{RESET}");
    println!("Type text to translate it, or {CYAN}help{RESET} for commands.");

    startup_load(&translator, &settings, model_override).await;

    let mut rl = DefaultEditor::new()?;
    loop {
        let prompt = format!("[{} \u{2192} {}] > ", state.flavor_name, state.target_language);
        match rl.readline(&prompt) {
            Ok(input) => {
                let line = input.trim();
                if line.is_empty() {
                    continue;
                }
                let _ = rl.add_history_entry(line);
                let command = line.to_lowercase();

                match command.as_str() {
                    "exit" | "quit" | "bye" => {
                        println!("{}", "Goodbye!".cyan());
                        break;
                    }
                    "help" => print_help(),
                    "clear" => {
                        print!("\x1B[2J\x1B[1;1H");
                        let _ = std::io::Write::flush(&mut std::io::stdout());
                    }
                    "status" => display::print_status(
                        translator.model_info().as_ref(),
                        &state.flavor_name,
                        &state.target_language,
                        translator.config(),
                    ),
                    "flavors" => display::print_flavors(&catalog, &state.flavor_name),
                    "languages" => display::print_languages(
                        &settings.translation.languages,
                        &state.target_language,
                    ),
                    "unload" => {
                        translator.unload().await;
                        println!("{}", "Model unloaded.".yellow());
                    }
                    "load" => println!("Usage: load <path-to-gguf>"),
                    "flavor" => println!("Usage: flavor <name> (see: flavors)"),
                    "lang" => println!("Usage: lang <language> (see: languages)"),
                    command if command.starts_with("load ") => {
                        let path = PathBuf::from(line[5..].trim());
                        if load_model(&translator, &path).await {
                            settings.model.path = path;
                            if let Err(e) = settings.save(&config_dir) {
                                warn!(error = %e, "failed to persist model path");
                                println!(
                                    "{} could not save settings: {}",
                                    "Warning:".yellow(),
                                    e
                                );
                            }
                        }
                    }
                    command if command.starts_with("flavor ") => {
                        select_flavor(&catalog, &mut state, line[7..].trim());
                    }
                    command if command.starts_with("lang ") => {
                        select_language(&settings, &mut state, line[5..].trim());
                    }
                    _ => translate(&translator, &catalog, &state, line).await,
                }
            }
            Err(ReadlineError::Interrupted) => {
                println!("{}", "(Ctrl-C at the prompt does nothing; use exit to quit)".bright_black());
            }
            Err(ReadlineError::Eof) => {
                println!("{}", "Goodbye!".cyan());
                break;
            }
            Err(e) => return Err(e.into()),
        }
    }

    translator.unload().await;
    Ok(())
}

/// Loads the model named on the command line or remembered in the
/// settings, if any. A missing configured file is reported rather than
/// treated as an error so the REPL still comes up.
async fn startup_load(translator: &Translator, settings: &Settings, model_override: Option<PathBuf>) {
    let path = match model_override {
        Some(path) => path,
        None => {
            let configured = &settings.model.path;
            if configured.as_os_str().is_empty() {
                return;
            }
            if !configured.is_file() {
                println!(
                    "{} configured model not found: {}",
                    "Warning:".yellow(),
                    configured.display()
                );
                return;
            }
            configured.clone()
        }
    };
    load_model(translator, &path).await;
}

/// Loads `path`, reporting progress on a spinner. Ctrl-C while the
/// load is running cancels it. Returns true on success.
async fn load_model(translator: &Translator, path: &Path) -> bool {
    let spinner = spinner("load");
    let sink = {
        let spinner = spinner.clone();
        move |message: &str| spinner.set_message(message.to_string())
    };
    let (token, handle) = CancellationToken::new();

    let load = translator.load_model(path, Some(&sink), &token);
    tokio::pin!(load);
    let result = tokio::select! {
        result = &mut load => result,
        _ = tokio::signal::ctrl_c() => {
            handle.cancel();
            spinner.set_message("Cancelling...".to_string());
            load.await
        }
    };
    spinner.finish_and_clear();

    match result {
        Ok(info) => {
            println!(
                "{} {} ({}) with context size {}",
                "Loaded".green().bold(),
                info.name,
                info.architecture.as_deref().unwrap_or("unknown"),
                info.context_size
            );
            true
        }
        Err(e) if e.is_cancelled() => {
            println!("{}", "Load cancelled.".yellow());
            false
        }
        Err(e) => {
            println!("{} {}", "Error:".red().bold(), e);
            false
        }
    }
}

fn select_flavor(catalog: &FlavorCatalog, state: &mut UiState, name: &str) {
    match catalog.get_by_name(name) {
        Some(flavor) => {
            state.flavor_name = flavor.name.clone();
            println!(
                "Flavor set to {}: {}",
                flavor.name.yellow(),
                flavor.description
            );
        }
        None => println!(
            "{} unknown flavor {:?} (see: flavors)",
            "Error:".red().bold(),
            name
        ),
    }
}

fn select_language(settings: &Settings, state: &mut UiState, language: &str) {
    if language.is_empty() {
        println!("Usage: lang <language> (see: languages)");
        return;
    }
    // Free-form on purpose: the configured list is a convenience, not
    // a whitelist.
    let known = settings
        .translation
        .languages
        .iter()
        .find(|known| known.eq_ignore_ascii_case(language));
    state.target_language = known.cloned().unwrap_or_else(|| language.to_string());
    if known.is_none() {
        println!(
            "{}",
            format!("{} is not in the configured language list; using it anyway.", language)
                .bright_black()
        );
    }
    println!("Target language set to {}", state.target_language.yellow());
}

/// Translates one line as a spawned pass, watching for Ctrl-C.
async fn translate(translator: &Arc<Translator>, catalog: &FlavorCatalog, state: &UiState, line: &str) {
    let Some(flavor) = catalog.get_by_name(&state.flavor_name).cloned() else {
        println!(
            "{} flavor {:?} disappeared from the catalog",
            "Error:".red().bold(),
            state.flavor_name
        );
        return;
    };

    let spinner = spinner("tolk");
    spinner.set_message(format!("Translating to {}...", state.target_language));

    let (token, handle) = CancellationToken::new();
    let task_translator = Arc::clone(translator);
    let input = line.to_string();
    let target = state.target_language.clone();
    let mut join = tokio::spawn(async move {
        task_translator.translate(&input, &target, &flavor, &token).await
    });

    let result = tokio::select! {
        result = &mut join => result,
        _ = tokio::signal::ctrl_c() => {
            handle.cancel();
            spinner.set_message("Cancelling...".to_string());
            join.await
        }
    };
    spinner.finish_and_clear();

    match result {
        Ok(Ok(text)) if text.is_empty() => {
            println!("{}", "(the model produced no translation)".bright_black());
        }
        Ok(Ok(text)) => display::print_translation(&text),
        Ok(Err(e)) if e.is_cancelled() => println!("{}", "Cancelled".yellow()),
        Ok(Err(e)) => println!("{} {}", "Error:".red().bold(), e),
        Err(e) => println!("{} translation task failed: {}", "Error:".red().bold(), e),
    }
}

fn spinner(prefix: &str) -> ProgressBar {
    let spinner = ProgressBar::new_spinner();
    spinner.set_style(
        ProgressStyle::default_spinner()
            .template("{prefix:.bold.dim} {spinner} {wide_msg}")
            .unwrap(),
    );
    spinner.set_prefix(prefix.to_string());
    spinner.enable_steady_tick(Duration::from_millis(120));
    spinner
}

fn print_help() {
    println!("\n{CYAN}tolk commands{RESET}");
    println!("{BRIGHT_CYAN}{}{RESET}", "=".repeat(60));
    println!("{GREEN}help{RESET}              - Show this help message");
    println!("{GREEN}status{RESET}            - Show the loaded model and current selections");
    println!("{GREEN}flavors{RESET}           - List the available translation flavors");
    println!("{GREEN}languages{RESET}         - List the configured target languages");
    println!("{GREEN}flavor <name>{RESET}     - Switch translation flavor");
    println!("{GREEN}lang <language>{RESET}   - Switch target language");
    println!("{GREEN}load <path>{RESET}       - Load a GGUF model file");
    println!("{GREEN}unload{RESET}            - Release the loaded model");
    println!("{GREEN}clear{RESET}             - Clear the screen");
    println!("{GREEN}exit, quit, bye{RESET}   - Leave tolk");
    println!("{BRIGHT_CYAN}{}{RESET}", "=".repeat(60));
    println!("Anything else is translated. {GREEN}Ctrl-C{RESET} cancels a running translation.\n");
}
