//! Console commands and their broadcast between coordinator and simulators.

pub mod parser;

#[cfg(not(feature = "local"))]
pub mod codec;
#[cfg(not(feature = "local"))]
pub mod handler;

use std::fmt;

/// Wire codes of the console commands.
#[repr(i32)]
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CommandCode {
    None = -1,
    Exit = 0,
    LoadMesh = 1,
    LoadShutter = 2,
    GenerateParticles = 3,
    MoveShutter = 4,
    Simulate = 5,
    Render = 6,
    AddSource = 7,
    AddSink = 8,
}

impl CommandCode {
    pub fn code(self) -> i32 {
        self as i32
    }

    pub fn from_code(code: i32) -> Option<CommandCode> {
        use CommandCode::*;
        match code {
            -1 => Some(None),
            0 => Some(Exit),
            1 => Some(LoadMesh),
            2 => Some(LoadShutter),
            3 => Some(GenerateParticles),
            4 => Some(MoveShutter),
            5 => Some(Simulate),
            6 => Some(Render),
            7 => Some(AddSource),
            8 => Some(AddSink),
            _ => Option::None,
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct CommandParameter {
    pub name: String,
    pub value: String,
}

/// A parsed console command: code, the raw input line, the command name and
/// the named parameters, exactly what crosses the command channel.
#[derive(Clone, Debug, PartialEq)]
pub struct CuiCommand {
    pub code: CommandCode,
    pub input_line: String,
    pub name: String,
    pub parameters: Vec<CommandParameter>,
}

impl CuiCommand {
    pub fn new(code: CommandCode, name: &str, input_line: &str) -> Self {
        Self {
            code,
            input_line: input_line.to_string(),
            name: name.to_string(),
            parameters: Vec::new(),
        }
    }

    pub fn with_parameter(mut self, name: &str, value: &str) -> Self {
        self.parameters.push(CommandParameter {
            name: name.to_string(),
            value: value.to_string(),
        });
        self
    }

    pub fn parameter(&self, index: usize) -> Option<&str> {
        self.parameters.get(index).map(|p| p.value.as_str())
    }

    pub fn exit() -> Self {
        Self::new(CommandCode::Exit, "exit", "exit")
    }
}

impl fmt::Display for CuiCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name)?;
        for parameter in &self.parameters {
            write!(f, " {}={}", parameter.name, parameter.value)?;
        }
        Ok(())
    }
}
