use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use rpy_rs::{
    parse_tree_json, parse_with_options, record, Command, EngineOptions, Input, ParseOptions, Play,
    Runtime, Step, Store,
};
use std::fs;
use std::io::{self, BufRead, Write};
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "rpy")]
#[command(about = "Parse and play branching-narrative scripts", version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the command tree of a script as JSON
    Parse {
        /// Script file
        input: PathBuf,

        /// Columns a tab counts for
        #[arg(long, default_value_t = 4)]
        tab_width: usize,
    },

    /// Play a script in the terminal
    Run {
        /// Script file, or a command tree written by `parse`
        input: PathBuf,

        /// Menu choices to take in order, 0-based (e.g. 1,0)
        #[arg(long, value_delimiter = ',')]
        choices: Vec<usize>,

        /// Print the recorded events as JSON instead of rendering them
        #[arg(long)]
        transcript: bool,

        /// Columns a tab counts for
        #[arg(long, default_value_t = 4)]
        tab_width: usize,

        /// Steps allowed before giving up on a script that never waits
        #[arg(long, default_value_t = 10_000)]
        step_limit: usize,
    },
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Parse { input, tab_width } => {
            let commands = load(&input, tab_width)?;
            println!("{}", serde_json::to_string_pretty(&commands)?);
        }
        Commands::Run {
            input,
            choices,
            transcript,
            tab_width,
            step_limit,
        } => {
            let commands = load(&input, tab_width)?;
            let options = EngineOptions { step_limit };

            if transcript {
                let events = record(&commands, &choices, options);
                println!("{}", serde_json::to_string_pretty(&events)?);
            } else {
                play_in_console(&commands, choices, options)?;
            }
        }
    }

    Ok(())
}

fn load(path: &Path, tab_width: usize) -> Result<Vec<Command>> {
    let text =
        fs::read_to_string(path).with_context(|| format!("failed to read {}", path.display()))?;

    let commands = if path.extension().is_some_and(|ext| ext == "json") {
        parse_tree_json(&text)
    } else {
        parse_with_options(&text, &ParseOptions { tab_width })
    };
    commands.with_context(|| format!("failed to parse {}", path.display()))
}

/// Scripted choices are used first; after that the reader picks. With
/// scripted choices dialogue is not paused on.
fn play_in_console(commands: &[Command], choices: Vec<usize>, options: EngineOptions) -> Result<()> {
    let unattended = !choices.is_empty();
    let step_limit = options.step_limit;
    let mut scripted = choices.into_iter();
    let mut play = Play::with_options(commands, ConsoleRuntime::default(), options);
    let mut lines = io::stdin().lock().lines();
    let mut input = None;

    while play.advance(input.take()) != Step::Done {
        if play.is_waiting_for_choice() {
            let index = match scripted.next() {
                Some(index) => index,
                None => match read_choice(&mut lines)? {
                    Some(index) => index,
                    None => break,
                },
            };
            input = Some(Input::Choice(index));
        } else if play.is_waiting_for_input() {
            if !unattended && lines.next().transpose()?.is_none() {
                break;
            }
            input = Some(Input::Continue);
        } else {
            bail!("no input requested after {} steps", step_limit);
        }
    }

    Ok(())
}

/// 1-based number from the reader, returned 0-based. `None` on end of input.
fn read_choice(lines: &mut impl Iterator<Item = io::Result<String>>) -> Result<Option<usize>> {
    loop {
        print!("> ");
        io::stdout().flush()?;

        let Some(line) = lines.next().transpose()? else {
            return Ok(None);
        };
        match line.trim().parse::<usize>() {
            Ok(n) if n >= 1 => return Ok(Some(n - 1)),
            _ => eprintln!("Enter the number of a choice."),
        }
    }
}

#[derive(Default)]
struct ConsoleRuntime {
    store: Store,
}

fn clause(keyword: &str, value: Option<&str>) -> String {
    value.map(|v| format!(" {} {}", keyword, v)).unwrap_or_default()
}

fn seconds(keyword: &str, value: Option<f64>) -> String {
    value.map(|v| format!(" {} {}s", keyword, v)).unwrap_or_default()
}

impl Runtime for ConsoleRuntime {
    fn store(&self) -> &Store {
        &self.store
    }

    fn store_mut(&mut self) -> &mut Store {
        &mut self.store
    }

    fn show_dialogue(&mut self, speaker: &str, text: &str) {
        println!("{}: {}", self.store.display_name(speaker), text);
    }

    fn show_narration(&mut self, text: &str) {
        println!("{}", text);
    }

    fn show_scene(&mut self, image: &str, transition: Option<&str>) {
        println!("[scene {}{}]", image, clause("with", transition));
    }

    fn show_image(&mut self, image: &str, position: Option<&str>, transition: Option<&str>) {
        println!(
            "[show {}{}{}]",
            image,
            clause("at", position),
            clause("with", transition)
        );
    }

    fn hide_image(&mut self, image: &str, transition: Option<&str>) {
        println!("[hide {}{}]", image, clause("with", transition));
    }

    fn play_music(&mut self, file: &str, fade_in: Option<f64>) {
        println!("[music {}{}]", file, seconds("fade in", fade_in));
    }

    fn stop_music(&mut self, fade_out: Option<f64>) {
        println!("[music stops{}]", seconds("fade out", fade_out));
    }

    fn pause(&mut self, duration: Option<f64>) {
        match duration {
            Some(s) => println!("[pause {}s]", s),
            None => println!("[pause]"),
        }
    }

    fn show_choices(&mut self, prompts: &[&str]) {
        for (i, prompt) in prompts.iter().enumerate() {
            println!("  {}. {}", i + 1, prompt);
        }
    }
}
