use serde::{Deserialize, Serialize};

/// Worker route that loads a saved game.
pub const LOAD_PATH: &str = "/load";

/// Worker route that runs an analysis over the loaded game.
pub const ANALYZE_PATH: &str = "/analyze";

/// Body of a load command. Sent raw, never JSON-encoded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadRequest {
    pub file_name: String,
}

impl LoadRequest {
    pub fn new(file_name: impl Into<String>) -> Self {
        Self {
            file_name: file_name.into(),
        }
    }

    pub fn into_body(self) -> String {
        self.file_name
    }
}

/// Body of an analyze command
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct AnalyzeRequest {
    pub file_name: String,
    pub iteration: u32,
    pub simulation_turn: u32,
}

impl AnalyzeRequest {
    pub fn new(file_name: impl Into<String>, iteration: u32, simulation_turn: u32) -> Self {
        Self {
            file_name: file_name.into(),
            iteration,
            simulation_turn,
        }
    }
}

/// A command the proxy can relay to the worker
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProxyCommand {
    Load(LoadRequest),
    Analyze(AnalyzeRequest),
}
