use std::time::Duration;

/// A program and its argument template.
///
/// Arguments may contain placeholders that are substituted per job:
/// `{workspace}`, `{input}`, `{output}`, `{video}`, `{audio}`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandSpec {
    pub program: String,
    pub args: Vec<String>,
}

impl CommandSpec {
    /// Parse a whitespace-separated command line. Returns `None` if blank.
    pub fn parse(line: &str) -> Option<Self> {
        let mut parts = line.split_whitespace().map(str::to_string);
        let program = parts.next()?;
        Some(Self {
            program,
            args: parts.collect(),
        })
    }

    /// Arguments with every `{name}` placeholder replaced.
    pub fn render_args(&self, vars: &[(&str, &str)]) -> Vec<String> {
        self.args
            .iter()
            .map(|arg| {
                vars.iter().fold(arg.clone(), |acc, (name, value)| {
                    acc.replace(&format!("{{{name}}}"), value)
                })
            })
            .collect()
    }
}

/// Which external command serves each job kind.
#[derive(Debug, Clone)]
pub struct RunnerConfig {
    /// Run once at startup; the service opens when it exits successfully.
    pub init: Option<CommandSpec>,
    pub completion: Option<CommandSpec>,
    pub media_sync: Option<CommandSpec>,
    pub speech: Option<CommandSpec>,
    /// Hard kill for a single backend process.
    pub command_timeout: Duration,
}

impl RunnerConfig {
    /// Load configuration from environment variables.
    ///
    /// | Env Var                | Default |
    /// |------------------------|---------|
    /// | `INIT_COMMAND`         | unset   |
    /// | `COMPLETION_COMMAND`   | unset   |
    /// | `SYNC_COMMAND`         | unset   |
    /// | `TTS_COMMAND`          | unset   |
    /// | `COMMAND_TIMEOUT_SECS` | `1800`  |
    pub fn from_env() -> Self {
        let command = |key: &str| {
            std::env::var(key)
                .ok()
                .and_then(|line| CommandSpec::parse(&line))
        };

        let command_timeout_secs: u64 = std::env::var("COMMAND_TIMEOUT_SECS")
            .unwrap_or_else(|_| "1800".into())
            .parse()
            .expect("COMMAND_TIMEOUT_SECS must be a valid u64");

        Self {
            init: command("INIT_COMMAND"),
            completion: command("COMPLETION_COMMAND"),
            media_sync: command("SYNC_COMMAND"),
            speech: command("TTS_COMMAND"),
            command_timeout: Duration::from_secs(command_timeout_secs),
        }
    }
}
