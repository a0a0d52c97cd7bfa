extern crate clap;
extern crate rustyline;
use clap::{App, Arg};
use common::config::MedConfig;
use common::MedError;
use env_logger::Env;
use log::{error, info};
use queryexe::MedSession;

use rustyline::error::ReadlineError;
use rustyline::Editor;
use std::fs;
use std::process;

/// How a query is answered.
#[derive(Debug, Clone, Copy, PartialEq)]
enum Mode {
    Execute,
    Json,
    Explain,
    PlanJson,
}

fn answer(session: &MedSession, mode: Mode, sql: &str) -> Result<String, MedError> {
    match mode {
        Mode::Execute => Ok(session.run(sql)?.result().to_string()),
        Mode::Json => Ok(serde_json::to_string_pretty(&session.run_json(sql)?)?),
        Mode::Explain => session.explain(sql),
        Mode::PlanJson => Ok(serde_json::to_string_pretty(&session.plan(sql)?.to_json())?),
    }
}

/// Handles one line of input. Returns false when the session should end.
///
/// # Arguments
///
/// * `session` - Session the queries run against.
/// * `default_mode` - Mode used for lines without a command prefix.
/// * `line` - Input line.
fn process_input(session: &MedSession, default_mode: Mode, line: &str) -> bool {
    let line = line.trim().trim_end_matches(';');
    let (mode, sql) = if line.starts_with('\\') {
        let mut parts = line.splitn(2, char::is_whitespace);
        let command = parts.next().unwrap_or("");
        let rest = parts.next().unwrap_or("").trim();
        match command {
            "\\quit" | "\\q" => {
                info!("Received Quit Command");
                return false;
            }
            "\\explain" => (Mode::Explain, rest),
            "\\json" => (Mode::Json, rest),
            "\\plan" => (Mode::PlanJson, rest),
            "\\help" => {
                println!("\\explain <sql>  show the planned tree");
                println!("\\json <sql>     run and print rows as json");
                println!("\\plan <sql>     print the planned tree as json");
                println!("\\quit           exit");
                return true;
            }
            _ => {
                error!("Unknown command {}", command);
                return true;
            }
        }
    } else {
        (default_mode, line)
    };
    if sql.is_empty() {
        return true;
    }
    match answer(session, mode, sql) {
        Ok(out) => println!("{}", out),
        Err(e) => error!("{}", e),
    }
    true
}

fn process_cli_input(session: &MedSession, mode: Mode) {
    let mut rl = Editor::<()>::new();
    if rl.load_history("history.txt").is_err() {
        info!("No previous history.");
    }
    let prompt: &str = "[medsql]>>";
    let mut cont = true;
    while cont {
        let readline = rl.readline(prompt);
        match readline {
            Ok(line) => {
                if line.trim().is_empty() {
                    continue;
                }
                rl.add_history_entry(line.as_str());
                cont = process_input(session, mode, line.as_str());
            }
            Err(ReadlineError::Interrupted) => {
                info!("CTRL-C");
                break;
            }
            Err(ReadlineError::Eof) => {
                info!("CTRL-D");
                break;
            }
            Err(err) => {
                error!("Error: {:?}", err);
                break;
            }
        }
    }
    if let Err(e) = rl.save_history("history.txt") {
        error!("Could not save history: {}", e);
    }
}

fn process_script_input(session: &MedSession, mode: Mode, script: &str) {
    for line in script.split(';') {
        let command = line.trim();
        if command.is_empty() {
            continue;
        }
        let clean_command = &command.replace("\n", " ");
        info!("Script clean command: {}", clean_command);
        if !process_input(session, mode, clean_command) {
            break;
        }
    }
}

fn main() {
    // Configure log environment
    env_logger::from_env(Env::default().default_filter_or("info")).init();

    let matches = App::new(env!("CARGO_PKG_NAME"))
        .version(env!("CARGO_PKG_VERSION"))
        .author(env!("CARGO_PKG_AUTHORS"))
        .about(env!("CARGO_PKG_DESCRIPTION"))
        .arg(
            Arg::with_name("config")
                .short("c")
                .long("config")
                .value_name("FILE")
                .help("Data server config file")
                .default_value("demo/config.json")
                .takes_value(true),
        )
        .arg(
            Arg::with_name("query")
                .short("q")
                .long("query")
                .value_name("SQL")
                .help("Runs one query and exits")
                .takes_value(true)
                .required(false),
        )
        .arg(
            Arg::with_name("script")
                .short("s")
                .long("script")
                .value_name("MEDSQL_SCRIPT")
                .help("Takes in a semicolon delimited file of queries and commands.")
                .takes_value(true)
                .required(false),
        )
        .arg(
            Arg::with_name("explain")
                .short("e")
                .long("explain")
                .help("Prints the planned tree instead of running the query")
                .conflicts_with_all(&["execute", "json"]),
        )
        .arg(
            Arg::with_name("execute")
                .short("x")
                .long("execute")
                .help("Runs the query and prints a table (default)"),
        )
        .arg(
            Arg::with_name("json")
                .short("j")
                .long("json")
                .help("Runs the query and prints rows as json")
                .conflicts_with("execute"),
        )
        .arg(
            Arg::with_name("no-pushdown")
                .long("no-pushdown")
                .help("Plans every query without delegating work to the remote system"),
        )
        .arg(
            Arg::with_name("partial")
                .long("partial")
                .help("Pushes the printable conjuncts of filters that cannot be pushed whole"),
        )
        .get_matches();

    let config_path = matches.value_of("config").unwrap_or("demo/config.json");
    let mut config = match MedConfig::from_file(config_path) {
        Ok(config) => config,
        Err(e) => {
            error!("Failed to read config {}: {}", config_path, e);
            process::exit(1);
        }
    };
    if matches.is_present("no-pushdown") {
        config.pushdown.enabled = false;
    }
    if matches.is_present("partial") {
        config.pushdown.partial_filter_pushdown = true;
    }
    info!(
        "Starting with config {} ({} objects, pushdown {:?})",
        config_path,
        config.objects.len(),
        config.pushdown
    );

    let session = match MedSession::from_config(&config) {
        Ok(session) => session,
        Err(e) => {
            error!("Failed to start session: {}", e);
            process::exit(1);
        }
    };

    let mode = if matches.is_present("explain") {
        Mode::Explain
    } else if matches.is_present("json") {
        Mode::Json
    } else {
        Mode::Execute
    };

    if let Some(sql) = matches.value_of("query") {
        match answer(&session, mode, sql) {
            Ok(out) => println!("{}", out),
            Err(e) => {
                error!("{}", e);
                process::exit(1);
            }
        }
    } else if let Some(script_path) = matches.value_of("script") {
        match fs::read_to_string(script_path) {
            Ok(script) => process_script_input(&session, mode, &script),
            Err(e) => {
                error!("Failed to read script {}: {}", script_path, e);
                process::exit(1);
            }
        }
    } else {
        process_cli_input(&session, mode);
    }
    info!("Terminated.");
}
