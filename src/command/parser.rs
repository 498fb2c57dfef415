//! Parsing of console input lines into commands.

use std::collections::VecDeque;

use super::CommandCode;
use super::CuiCommand;

pub enum ParsedLine {
    Command(CuiCommand),
    Help,
    Empty,
    Unknown(String),
    Error(String),
}

pub const HELP: &str = "\
loadMesh -p <file>\n\
loadShutter -p <file>\n\
particleGen\n\
moveShutter -t <frame>\n\
addSource <x> <y> <z>\n\
addSink <height>\n\
simulate\n\
render\n\
help\n\
exit";

fn tokenize(line: &str) -> VecDeque<String> {
    line.split_whitespace().map(str::to_string).collect()
}

/// Reads the next token, joining quoted tokens ("a file name") into one.
fn next_combined_token(tokens: &mut VecDeque<String>) -> Option<String> {
    let first = tokens.pop_front()?;
    if !first.starts_with('"') {
        return Some(first);
    }
    if first.len() >= 2 && first.ends_with('"') {
        return Some(first[1..first.len() - 1].to_string());
    }
    let mut combined = first[1..].to_string();
    while let Some(token) = tokens.pop_front() {
        combined.push(' ');
        if token.ends_with('"') {
            combined.push_str(&token[..token.len() - 1]);
            return Some(combined);
        }
        combined.push_str(&token);
    }
    Some(combined)
}

fn path_command(
    code: CommandCode,
    name: &str,
    line: &str,
    tokens: &mut VecDeque<String>,
) -> ParsedLine {
    match tokens.pop_front().as_deref() {
        Some("-p") => match next_combined_token(tokens) {
            Some(path) => {
                ParsedLine::Command(CuiCommand::new(code, name, line).with_parameter("-p", &path))
            }
            None => ParsedLine::Error(format!("{name}: missing file after '-p'")),
        },
        _ => ParsedLine::Error(format!("{name}: missing path parameter '-p'")),
    }
}

pub fn parse_line(line: &str) -> ParsedLine {
    let line = line.trim();
    let mut tokens = tokenize(line);
    let command = match tokens.pop_front() {
        Some(command) => command,
        None => return ParsedLine::Empty,
    };
    match command.as_str() {
        "help" => ParsedLine::Help,
        "exit" => ParsedLine::Command(CuiCommand::exit()),
        "loadMesh" => path_command(CommandCode::LoadMesh, "loadMesh", line, &mut tokens),
        "loadShutter" => path_command(CommandCode::LoadShutter, "loadShutter", line, &mut tokens),
        "particleGen" => {
            ParsedLine::Command(CuiCommand::new(CommandCode::GenerateParticles, "particleGen", line))
        }
        "moveShutter" => match (tokens.pop_front().as_deref(), tokens.pop_front()) {
            (Some("-t"), Some(frame)) if frame.parse::<i32>().is_ok() => ParsedLine::Command(
                CuiCommand::new(CommandCode::MoveShutter, "moveShutter", line)
                    .with_parameter("-t", &frame),
            ),
            _ => ParsedLine::Error("moveShutter: expected '-t <frame>'".to_string()),
        },
        "simulate" => ParsedLine::Command(CuiCommand::new(CommandCode::Simulate, "simulate", line)),
        "render" => ParsedLine::Command(CuiCommand::new(CommandCode::Render, "render", line)),
        "addSource" => {
            let values: Vec<String> = tokens.drain(..).collect();
            if values.len() == 3 && values.iter().all(|v| v.parse::<f64>().is_ok()) {
                ParsedLine::Command(
                    CuiCommand::new(CommandCode::AddSource, "addSource", line)
                        .with_parameter("position", &values.join(" ")),
                )
            } else {
                ParsedLine::Error("addSource: expected three coordinates".to_string())
            }
        }
        "addSink" => match tokens.pop_front() {
            Some(height) if height.parse::<f64>().is_ok() => ParsedLine::Command(
                CuiCommand::new(CommandCode::AddSink, "addSink", line)
                    .with_parameter("height", &height),
            ),
            _ => ParsedLine::Error("addSink: expected a height".to_string()),
        },
        unknown => ParsedLine::Unknown(unknown.to_string()),
    }
}
