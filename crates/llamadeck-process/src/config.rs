//! Process configuration

use std::collections::HashMap;
use std::time::Duration;

/// Configuration for spawning a process
#[derive(Debug, Clone)]
pub struct ProcessConfig {
    /// Executable command
    pub command: String,
    /// Command arguments
    pub args: Vec<String>,
    /// Environment variables (added to parent env)
    pub env: HashMap<String, String>,
    /// Timeout for `wait` (None = no timeout)
    pub timeout: Option<Duration>,
}

impl ProcessConfig {
    /// Create new process configuration
    pub fn new(command: impl Into<String>) -> Self {
        Self {
            command: command.into(),
            args: vec![],
            env: HashMap::new(),
            timeout: None,
        }
    }

    /// Set command arguments
    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args = args.into_iter().map(Into::into).collect();
        self
    }

    /// Append a single argument
    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    /// Add environment variable
    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.insert(key.into(), value.into());
        self
    }

    /// Set timeout duration
    pub fn timeout(mut self, duration: Duration) -> Self {
        self.timeout = Some(duration);
        self
    }

    /// Human-readable command line, used in logs
    pub fn display(&self) -> String {
        if self.args.is_empty() {
            self.command.clone()
        } else {
            format!("{} {}", self.command, self.args.join(" "))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder() {
        let config = ProcessConfig::new("ollama")
            .args(["pull"])
            .arg("llama3")
            .env("OLLAMA_HOST", "127.0.0.1:11434")
            .timeout(Duration::from_secs(5));

        assert_eq!(config.args, vec!["pull", "llama3"]);
        assert_eq!(config.env.get("OLLAMA_HOST").map(String::as_str), Some("127.0.0.1:11434"));
        assert_eq!(config.timeout, Some(Duration::from_secs(5)));
        assert_eq!(config.display(), "ollama pull llama3");
    }
}
