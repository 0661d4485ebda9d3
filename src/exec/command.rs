// src/exec/command.rs

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::process::Stdio;

use tokio::process::Command;

/// How the program is named: a string for the platform shell, or an
/// argument vector executed directly.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommandLine {
    Shell(String),
    Argv(Vec<String>),
}

/// A command plus its working directory and extra environment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandSpec {
    pub line: CommandLine,
    pub cwd: Option<PathBuf>,
    pub env: BTreeMap<String, String>,
}

impl CommandSpec {
    pub fn shell(cmd: impl Into<String>) -> Self {
        Self::from_line(CommandLine::Shell(cmd.into()))
    }

    pub fn argv<I, S>(args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::from_line(CommandLine::Argv(args.into_iter().map(Into::into).collect()))
    }

    fn from_line(line: CommandLine) -> Self {
        Self {
            line,
            cwd: None,
            env: BTreeMap::new(),
        }
    }

    pub fn cwd(mut self, dir: impl Into<PathBuf>) -> Self {
        self.cwd = Some(dir.into());
        self
    }

    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.insert(key.into(), value.into());
        self
    }

    /// Program name as the user would recognise it (first word / argv[0]).
    pub fn program(&self) -> Option<&str> {
        match &self.line {
            CommandLine::Shell(cmd) => cmd.split_whitespace().next(),
            CommandLine::Argv(args) => args.first().map(String::as_str),
        }
    }

    /// Printable form: the shell string as-is, argv with quoting.
    pub fn display(&self) -> String {
        match &self.line {
            CommandLine::Shell(cmd) => cmd.clone(),
            CommandLine::Argv(args) => args
                .iter()
                .map(|a| quote_arg(a))
                .collect::<Vec<_>>()
                .join(" "),
        }
    }

    /// Build the `tokio` command with piped output.
    ///
    /// `shell` overrides the platform default (`sh -c` / `cmd /C`) for
    /// [`CommandLine::Shell`].
    pub(crate) fn to_command(&self, shell: Option<&str>) -> Command {
        let mut cmd = match &self.line {
            CommandLine::Shell(line) => {
                let (program, flag) = match shell {
                    Some(program) => (program, shell_flag(program)),
                    None if cfg!(windows) => ("cmd", "/C"),
                    None => ("sh", "-c"),
                };
                let mut c = Command::new(program);
                c.arg(flag).arg(line);
                c
            }
            CommandLine::Argv(args) => {
                let (program, rest) = match args.split_first() {
                    Some((program, rest)) => (program.as_str(), rest),
                    None => ("", &[][..]),
                };
                let mut c = Command::new(program);
                c.args(rest);
                c
            }
        };

        if let Some(dir) = &self.cwd {
            cmd.current_dir(dir);
        }

        // Child interpreters should not hold output back in their own buffers.
        cmd.env("PYTHONUNBUFFERED", "1");
        cmd.envs(&self.env);

        cmd.stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        // Own process group, so termination reaches grandchildren too.
        #[cfg(unix)]
        cmd.process_group(0);

        cmd
    }
}

impl From<&str> for CommandSpec {
    fn from(cmd: &str) -> Self {
        CommandSpec::shell(cmd)
    }
}

impl From<String> for CommandSpec {
    fn from(cmd: String) -> Self {
        CommandSpec::shell(cmd)
    }
}

impl From<Vec<String>> for CommandSpec {
    fn from(args: Vec<String>) -> Self {
        CommandSpec::argv(args)
    }
}

fn shell_flag(program: &str) -> &'static str {
    let name = program.rsplit(['/', '\\']).next().unwrap_or(program);
    match name.to_lowercase().as_str() {
        "cmd" | "cmd.exe" => "/C",
        "powershell" | "powershell.exe" | "pwsh" | "pwsh.exe" => "-Command",
        _ => "-c",
    }
}

fn quote_arg(arg: &str) -> String {
    let plain = !arg.is_empty()
        && arg
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || "-_./=:,+@%".contains(c));
    if plain {
        arg.to_string()
    } else {
        format!("'{}'", arg.replace('\'', r"'\''"))
    }
}
