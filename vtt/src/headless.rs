//! Stdin loop for the headless table.
//!
//! Protocol:
//! - Lines starting with `#` are commands (see `#help`)
//! - Anything else is chat input from the local player
//! - Output lines are tagged: `[OUT]`, `[all]`, `[gm]`, `[to NAME]`, `[ERROR]`

use std::io::{self, BufRead, Write};
use vtt_core::headless::{ChatReply, HeadlessError, HeadlessSession};
use vtt_core::link::LinkRunReport;
use vtt_core::world::ChatMessage;
use vtt_core::HeadlessConfig;

const HELP: &[(&str, &str)] = &[
    ("#quit", "Exit"),
    ("#save <path>", "Save the campaign"),
    ("#load <path>", "Load a campaign and rerun its load hooks"),
    ("#link <url>", "Run a macro:// link"),
    ("#as <token>", "Impersonate a token"),
    ("#select <a,b>", "Select tokens"),
    ("#functions", "List user-defined functions"),
    ("#help", "Show this help"),
];

pub async fn run_headless(config: HeadlessConfig) -> Result<(), HeadlessError> {
    let table = HeadlessSession::new(config).await?;

    println!("=== Headless Table ===");
    println!("Campaign: {}", table.session().with_campaign(|c| c.name.clone()));
    println!("Player: {}", table.player_name());
    print_help();
    println!();

    let stdin = io::stdin();
    let mut stdout = io::stdout();

    for line in stdin.lock().lines() {
        let line = match line {
            Ok(l) => l,
            Err(e) => {
                eprintln!("Error reading input: {e}");
                break;
            }
        };

        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        if let Some(command) = line.strip_prefix('#') {
            let (name, rest) = command
                .split_once(char::is_whitespace)
                .map(|(name, rest)| (name, rest.trim()))
                .unwrap_or((command, ""));
            match name {
                "quit" | "exit" => break,
                "help" => print_help(),
                "save" if !rest.is_empty() => match table.save(rest).await {
                    Ok(()) => println!("[SAVED] {rest}"),
                    Err(e) => println!("[ERROR] Save failed: {e}"),
                },
                "load" if !rest.is_empty() => match table.load(rest).await {
                    Ok(failures) => {
                        println!("[LOADED] {rest}");
                        for (token, err) in failures {
                            println!("[ERROR] Load hook on {token}: {err}");
                        }
                    }
                    Err(e) => println!("[ERROR] Load failed: {e}"),
                },
                "link" if !rest.is_empty() => match table.run_link(rest) {
                    Ok((report, messages)) => {
                        print_report(&report);
                        print_messages(&messages);
                    }
                    Err(e) => println!("[ERROR] {e}"),
                },
                "as" if !rest.is_empty() => match table.impersonate(rest) {
                    Ok(id) => println!("[AS] {rest} ({id})"),
                    Err(e) => println!("[ERROR] {e}"),
                },
                "select" => {
                    let tokens: Vec<&str> = rest
                        .split(',')
                        .map(str::trim)
                        .filter(|t| !t.is_empty())
                        .collect();
                    match table.select(&tokens) {
                        Ok(ids) => println!("[SELECTED] {}", ids.len()),
                        Err(e) => println!("[ERROR] {e}"),
                    }
                }
                "functions" => {
                    for name in table.function_names() {
                        println!("  {name}");
                    }
                }
                "save" | "load" | "link" | "as" => {
                    println!("[ERROR] Usage: #{name} <argument>");
                }
                _ => println!("[ERROR] Unknown command. Type #help for help."),
            }
            stdout.flush().ok();
            continue;
        }

        match table.send(line) {
            Ok(reply) => print_reply(&reply),
            Err(e) => println!("[ERROR] {e}"),
        }
        stdout.flush().ok();
    }

    Ok(())
}

fn print_help() {
    println!("Commands:");
    for (command, description) in HELP {
        println!("  {command:<16} {description}");
    }
    println!("  (anything else is sent as chat)");
}

fn print_reply(reply: &ChatReply) {
    if reply.output.aborted {
        println!("[ABORTED]");
    } else if !reply.output.text.trim().is_empty() {
        println!("[OUT] {}", reply.output.text);
    }
    for report in &reply.links {
        print_report(report);
    }
    print_messages(&reply.messages);
}

fn print_report(report: &LinkRunReport) {
    for failure in &report.failures {
        println!("[ERROR] {}: {}", failure.recipient, failure.error);
    }
}

fn print_messages(messages: &[ChatMessage]) {
    for message in messages {
        println!("{}", format_message(message));
    }
}

fn format_message(message: &ChatMessage) -> String {
    format!("[{}] {}: {}", message.channel, message.sender, message.text)
}
