//! Configuration types for Threadline.
//!
//! `ChatConfig` represents the top-level `config.toml` that controls input
//! validation, command handling, bus sizing, and the generation endpoint.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// What to do with a marker-prefixed input whose verb is not registered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UnknownCommandPolicy {
    /// Answer with a bot message saying the command is unknown.
    #[default]
    Reply,
    /// Treat the input as ordinary text and send it to generation.
    PassThrough,
}

/// Per-model input policy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelPolicy {
    /// Maximum accepted input length, in characters.
    pub max_input_chars: usize,
}

/// Generation backend endpoint settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerationConfig {
    /// URL the chat request is POSTed to.
    #[serde(default = "default_endpoint")]
    pub endpoint: String,

    /// Whole-request timeout, covering the full streamed response.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_endpoint() -> String {
    "http://localhost:3000/api/chatAPI".to_string()
}

fn default_timeout_secs() -> u64 {
    300
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            endpoint: default_endpoint(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

/// Top-level configuration for Threadline.
///
/// Loaded from `~/.threadline/config.toml`. All fields have sensible defaults.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatConfig {
    /// Model used when the caller does not pick one.
    #[serde(default = "default_model")]
    pub default_model: String,

    /// Leading character that turns an input into a local command.
    #[serde(default = "default_command_marker")]
    pub command_marker: char,

    /// Prefix every accepted credential must carry.
    #[serde(default = "default_credential_prefix")]
    pub credential_prefix: String,

    /// Input ceiling for models without their own entry in `models`.
    #[serde(default = "default_max_input_chars")]
    pub default_max_input_chars: usize,

    /// Per-model overrides keyed by model id.
    #[serde(default)]
    pub models: BTreeMap<String, ModelPolicy>,

    /// Capacity of each broadcast topic channel.
    #[serde(default = "default_bus_capacity")]
    pub bus_capacity: usize,

    /// Whether a bulk truncate is announced to other sessions.
    #[serde(default = "default_broadcast_truncate")]
    pub broadcast_truncate: bool,

    #[serde(default)]
    pub unknown_command: UnknownCommandPolicy,

    #[serde(default)]
    pub generation: GenerationConfig,
}

fn default_model() -> String {
    "gpt-3.5-turbo".to_string()
}

fn default_command_marker() -> char {
    '/'
}

fn default_credential_prefix() -> String {
    "sk-".to_string()
}

fn default_max_input_chars() -> usize {
    60_000
}

fn default_bus_capacity() -> usize {
    1024
}

fn default_broadcast_truncate() -> bool {
    true
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self {
            default_model: default_model(),
            command_marker: default_command_marker(),
            credential_prefix: default_credential_prefix(),
            default_max_input_chars: default_max_input_chars(),
            models: BTreeMap::new(),
            bus_capacity: default_bus_capacity(),
            broadcast_truncate: default_broadcast_truncate(),
            unknown_command: UnknownCommandPolicy::default(),
            generation: GenerationConfig::default(),
        }
    }
}

impl ChatConfig {
    /// Input ceiling for `model_id`, falling back to the shared default.
    pub fn max_input_chars(&self, model_id: &str) -> usize {
        self.models
            .get(model_id)
            .map(|policy| policy.max_input_chars)
            .unwrap_or(self.default_max_input_chars)
    }
}
