//! # Keyweave - Keymap Replay Tool
//!
//! Loads a keymap, feeds a script of keystrokes through the dispatch
//! engine and prints what every key did.
//!
//! ## Quick Start
//!
//! ```bash
//! # Replay a script against the default keymap
//! cargo run -- --script keys.txt
//!
//! # Use a specific keymap and show the resolved bindings
//! cargo run -- demos/keymap.toml --dump-bindings
//! ```
//!
//! Script lines are either a stroke (`Ctrl-x`) aimed at the default
//! surface, or `surface: stroke` (`tree: e`). Blank lines and lines
//! starting with `#` are skipped.

use clap::Parser;
use keyweave_core::event::EventHandler;
use keyweave_core::{
    CommandContext, CommandHandler, CommandOutcome, CommandResult, Config, Engine, Host, KeyEvent,
    Scope, Stroke, Surface, SurfaceKind, UnboundAction,
};
use serde::Serialize;
use std::collections::HashMap;
use std::io::{self, BufRead, Write};
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Keyweave - replay keystrokes through a keymap
#[derive(Parser, Debug)]
#[command(name = "keyweave")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Keymap to load (defaults to the user keymap)
    #[arg(value_name = "KEYMAP")]
    keymap: Option<PathBuf>,

    /// Keystroke script to replay (defaults to stdin)
    #[arg(short, long, value_name = "FILE")]
    script: Option<PathBuf>,

    /// Surface that receives keys without a surface prefix
    #[arg(long, default_value = "body")]
    surface: String,

    /// Print the resolved binding table as JSON and exit
    #[arg(long)]
    dump_bindings: bool,

    /// Verbose logging
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

/// Prints everything the engine asks the editor to do.
struct ConsoleHost<W: Write> {
    out: W,
}

impl<W: Write> Host for ConsoleHost<W> {
    fn show_prompt(&mut self, text: &str) {
        let _ = writeln!(self.out, "  prompt: {text}");
    }

    fn self_insert(&mut self, event: &KeyEvent, action: UnboundAction) {
        if let Some(ch) = event.character {
            let _ = writeln!(self.out, "  {action}: {ch:?}");
        }
    }

    fn show_list(&mut self, title: &str, items: &[String]) {
        let _ = writeln!(self.out, "  {title}:");
        for item in items {
            let _ = writeln!(self.out, "    {item}");
        }
    }

    fn beep(&mut self) {
        let _ = writeln!(self.out, "  beep");
    }
}

/// Stands in for editor commands the keymap mentions.
struct EchoCommand;

impl CommandHandler for EchoCommand {
    fn execute(&self, ctx: &mut CommandContext<'_>) -> CommandResult {
        match ctx.tail {
            Some(tail) => println!("  run: {} {}", ctx.command, tail),
            None => println!("  run: {}", ctx.command),
        }
        Ok(CommandOutcome::Handled)
    }

    fn description(&self) -> &str {
        "prints its name"
    }
}

/// One row of `--dump-bindings`.
#[derive(Debug, Serialize)]
struct BindingRow {
    scope: Scope,
    stroke: Stroke,
    command: String,
    tag: String,
}

/// Every command name a keymap refers to.
fn referenced_commands(config: &Config) -> Vec<String> {
    let mut names: Vec<String> = config.shortcuts.keys().cloned().collect();
    for mode in config.modes.values() {
        names.extend(mode.entry_commands.iter().cloned());
        names.extend(mode.bindings.iter().map(|b| b.command.clone()));
    }
    names.sort();
    names.dedup();
    names
}

/// Builds an engine whose unknown commands echo their names.
fn build_engine<W: Write + 'static>(config: Config, out: W) -> Engine {
    let names = referenced_commands(&config);
    let mut engine = Engine::new(config, Box::new(ConsoleHost { out }));
    for name in names {
        if !engine.registry().contains(&name) && !name.starts_with("enter-") {
            engine.register_command(&name, Arc::new(EchoCommand), None);
        }
    }
    engine.rebuild_all();
    engine
}

fn binding_rows(engine: &Engine) -> Vec<BindingRow> {
    let mut rows: Vec<BindingRow> = engine
        .bindings()
        .records()
        .map(|r| BindingRow {
            scope: r.scope,
            stroke: r.stroke.clone(),
            command: r.command.clone(),
            tag: r.tag.clone(),
        })
        .collect();
    rows.sort_by(|a, b| (a.scope, &a.stroke).cmp(&(b.scope, &b.stroke)));
    rows
}

/// Splits a script line into an optional surface name and a stroke.
fn parse_script_line(line: &str) -> Option<(Option<&str>, &str)> {
    let line = line.trim();
    if line.is_empty() || line.starts_with('#') {
        return None;
    }
    match line.split_once(": ") {
        Some((surface, key)) if !key.trim().is_empty() => Some((Some(surface.trim()), key.trim())),
        _ => Some((None, line)),
    }
}

fn replay(engine: &mut Engine, script: impl BufRead, default_surface: &str) -> anyhow::Result<()> {
    let mut surfaces: HashMap<SurfaceKind, Surface> = HashMap::new();
    let mut events = EventHandler::new(engine.subscribe());

    for line in script.lines() {
        let line = line?;
        let Some((surface_name, key)) = parse_script_line(&line) else {
            continue;
        };
        let kind = SurfaceKind::from_widget_name(surface_name.unwrap_or(default_surface));
        let surface = *surfaces.entry(kind).or_insert_with(|| Surface::new(kind));

        println!("{key}");
        match KeyEvent::parse(key, surface) {
            Ok(event) => {
                let outcome = engine.handle_keystroke(&event);
                println!("  => {outcome:?}");
            }
            Err(err) => println!("  error: {err}"),
        }
        while let Some(event) = events.try_next() {
            tracing::debug!(?event, "engine event");
        }
    }
    Ok(())
}

fn main() -> anyhow::Result<()> {
    // Parse command line arguments
    let args = Args::parse();

    // Initialize logging
    let log_level = match args.verbose {
        0 => tracing::Level::WARN,
        1 => tracing::Level::INFO,
        2 => tracing::Level::DEBUG,
        _ => tracing::Level::TRACE,
    };

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(false)
                .with_level(true)
                .with_writer(io::stderr),
        )
        .with(tracing_subscriber::filter::LevelFilter::from_level(
            log_level,
        ))
        .init();

    tracing::info!("Starting keyweave v{}", env!("CARGO_PKG_VERSION"));

    let config = match &args.keymap {
        Some(path) => Config::load_from(path)?,
        None => Config::load(),
    };
    let mut engine = build_engine(config, io::stdout());
    for diagnostic in engine.diagnostics() {
        eprintln!("warning: {diagnostic}");
    }

    if args.dump_bindings {
        println!("{}", serde_json::to_string_pretty(&binding_rows(&engine))?);
        return Ok(());
    }

    match &args.script {
        Some(path) => {
            let file = std::fs::File::open(path)
                .map_err(|e| anyhow::anyhow!("cannot open {}: {}", path.display(), e))?;
            replay(&mut engine, io::BufReader::new(file), &args.surface)?;
        }
        None => replay(&mut engine, io::stdin().lock(), &args.surface)?,
    }

    Ok(())
}
