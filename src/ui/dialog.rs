//! Interactive prompt capability with a graphical (yad) and a plain-text backend.
//!
//! The backend is chosen once at startup by `select_dialog` and injected into
//! the menu and the watch loop.

#![allow(missing_docs)]

use std::env;
use std::ffi::OsString;
use std::io::{self, BufRead, BufReader, Write};
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::str::FromStr;
use std::time::Duration;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use crate::core::errors::{OsgError, Result};

/// `[ui] dialog` setting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DialogPreference {
    /// yad when it is installed and a display is available, text otherwise.
    #[default]
    Auto,
    Graphical,
    Text,
}

impl FromStr for DialogPreference {
    type Err = String;

    fn from_str(raw: &str) -> std::result::Result<Self, Self::Err> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "auto" => Ok(Self::Auto),
            "graphical" | "yad" => Ok(Self::Graphical),
            "text" => Ok(Self::Text),
            other => Err(format!(
                "unknown dialog {other:?} (expected auto, graphical or text)"
            )),
        }
    }
}

/// How the user answered a timed alert.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AlertResponse {
    OpenManager,
    Dismissed,
    TimedOut,
}

/// Prompt capability used by the menu and the watch loop.
pub trait Dialog {
    /// Backend name for logs.
    fn kind(&self) -> &'static str;
    /// Blocking message.
    fn show_text(&self, title: &str, text: &str) -> Result<()>;
    fn confirm(&self, title: &str, question: &str) -> Result<bool>;
    /// `None` when the user cancels.
    fn pick_directory(&self, title: &str, initial: &Path) -> Result<Option<PathBuf>>;
    /// Index into `options`, or `None` when the user cancels.
    fn choose(&self, title: &str, prompt: &str, options: &[&str]) -> Result<Option<usize>>;
    /// Timed notification offering an "Open manager" action.
    fn alert(&self, title: &str, text: &str, timeout: Duration) -> Result<AlertResponse>;
}

// ──────────────────── yad ────────────────────

/// yad exit status when `--timeout` expires.
const YAD_TIMEOUT_EXIT: i32 = 70;
const YAD_OPEN_MANAGER_EXIT: i32 = 2;

/// Graphical dialogs through the `yad` binary.
#[derive(Debug, Clone)]
pub struct YadDialog {
    program: PathBuf,
}

impl Default for YadDialog {
    fn default() -> Self {
        Self {
            program: PathBuf::from("yad"),
        }
    }
}

impl YadDialog {
    #[must_use]
    pub fn with_program(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
        }
    }

    fn run(&self, args: &[String], stdin_text: Option<&str>) -> Result<(i32, String)> {
        let mut cmd = Command::new(&self.program);
        cmd.args(args)
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .stdin(if stdin_text.is_some() {
                Stdio::piped()
            } else {
                Stdio::null()
            });
        let mut child = cmd.spawn().map_err(|e| OsgError::Runtime {
            details: format!("cannot launch {}: {e}", self.program.display()),
        })?;
        if let (Some(text), Some(mut stdin)) = (stdin_text, child.stdin.take()) {
            let _ = stdin.write_all(text.as_bytes());
        }
        let output = child.wait_with_output().map_err(|e| OsgError::Runtime {
            details: format!("{} failed: {e}", self.program.display()),
        })?;
        let code = output.status.code().ok_or_else(|| OsgError::Runtime {
            details: format!("{} was killed by a signal", self.program.display()),
        })?;
        Ok((code, String::from_utf8_lossy(&output.stdout).trim().to_string()))
    }
}

fn title_arg(title: &str) -> String {
    format!("--title={title}")
}

impl Dialog for YadDialog {
    fn kind(&self) -> &'static str {
        "yad"
    }

    fn show_text(&self, title: &str, text: &str) -> Result<()> {
        self.run(
            &[
                title_arg(title),
                "--text-info".to_string(),
                "--fontname=monospace".to_string(),
                "--width=720".to_string(),
                "--height=360".to_string(),
                "--button=OK:0".to_string(),
            ],
            Some(text),
        )?;
        Ok(())
    }

    fn confirm(&self, title: &str, question: &str) -> Result<bool> {
        let (code, _) = self.run(
            &[
                title_arg(title),
                format!("--text={question}"),
                "--button=No:1".to_string(),
                "--button=Yes:0".to_string(),
            ],
            None,
        )?;
        Ok(code == 0)
    }

    fn pick_directory(&self, title: &str, initial: &Path) -> Result<Option<PathBuf>> {
        let mut start = initial.as_os_str().to_os_string();
        start.push("/");
        let (code, out) = self.run(
            &[
                title_arg(title),
                "--file".to_string(),
                "--directory".to_string(),
                format!("--filename={}", start.to_string_lossy()),
            ],
            None,
        )?;
        Ok((code == 0 && !out.is_empty()).then(|| PathBuf::from(out)))
    }

    fn choose(&self, title: &str, prompt: &str, options: &[&str]) -> Result<Option<usize>> {
        let mut args = vec![
            title_arg(title),
            format!("--text={prompt}"),
            "--list".to_string(),
            "--no-headers".to_string(),
            "--column=Action".to_string(),
            "--print-column=1".to_string(),
            "--separator=".to_string(),
            "--width=420".to_string(),
            "--height=300".to_string(),
        ];
        args.extend(options.iter().map(|o| (*o).to_string()));
        let (code, out) = self.run(&args, None)?;
        if code != 0 {
            return Ok(None);
        }
        Ok(options.iter().position(|o| *o == out))
    }

    fn alert(&self, title: &str, text: &str, timeout: Duration) -> Result<AlertResponse> {
        let (code, _) = self.run(
            &[
                title_arg(title),
                format!("--text={text}"),
                format!("--timeout={}", timeout.as_secs().max(1)),
                "--timeout-indicator=bottom".to_string(),
                format!("--button=Open manager:{YAD_OPEN_MANAGER_EXIT}"),
                "--button=Dismiss:1".to_string(),
            ],
            None,
        )?;
        Ok(match code {
            YAD_OPEN_MANAGER_EXIT => AlertResponse::OpenManager,
            YAD_TIMEOUT_EXIT => AlertResponse::TimedOut,
            _ => AlertResponse::Dismissed,
        })
    }
}

// ──────────────────── plain text ────────────────────

/// Line-oriented dialogs on a reader/writer pair (stdin/stdout by default).
pub struct TextDialog<R, W> {
    io: Mutex<(R, W)>,
}

impl TextDialog<BufReader<io::Stdin>, io::Stdout> {
    #[must_use]
    pub fn stdio() -> Self {
        Self::new(BufReader::new(io::stdin()), io::stdout())
    }
}

impl<R: BufRead, W: Write> TextDialog<R, W> {
    pub fn new(input: R, output: W) -> Self {
        Self {
            io: Mutex::new((input, output)),
        }
    }

    /// Consume the dialog and hand back the writer.
    pub fn into_output(self) -> W {
        self.io.into_inner().1
    }

    fn ask(&self, prompt: &str) -> Result<Option<String>> {
        let mut guard = self.io.lock();
        let (input, output) = &mut *guard;
        write!(output, "{prompt}").map_err(stdio_error)?;
        output.flush().map_err(stdio_error)?;
        let mut line = String::new();
        let read = input.read_line(&mut line).map_err(stdio_error)?;
        Ok((read > 0).then(|| line.trim().to_string()))
    }

    fn say(&self, text: &str) -> Result<()> {
        let mut guard = self.io.lock();
        let output = &mut guard.1;
        writeln!(output, "{text}").map_err(stdio_error)?;
        output.flush().map_err(stdio_error)
    }
}

fn stdio_error(source: io::Error) -> OsgError {
    OsgError::io("<terminal>", source)
}

impl<R: BufRead, W: Write> Dialog for TextDialog<R, W> {
    fn kind(&self) -> &'static str {
        "text"
    }

    fn show_text(&self, title: &str, text: &str) -> Result<()> {
        self.say(&format!("== {title} ==\n{}", text.trim_end()))
    }

    fn confirm(&self, title: &str, question: &str) -> Result<bool> {
        let answer = self.ask(&format!("[{title}] {question} [y/N] "))?;
        Ok(matches!(
            answer.as_deref().map(str::to_ascii_lowercase).as_deref(),
            Some("y" | "yes")
        ))
    }

    fn pick_directory(&self, title: &str, initial: &Path) -> Result<Option<PathBuf>> {
        let answer = self.ask(&format!(
            "[{title}] Directory (empty for {}, '-' to cancel): ",
            initial.display()
        ))?;
        Ok(match answer.as_deref() {
            None | Some("-") => None,
            Some("") => Some(initial.to_path_buf()),
            Some(path) => Some(PathBuf::from(path)),
        })
    }

    fn choose(&self, title: &str, prompt: &str, options: &[&str]) -> Result<Option<usize>> {
        let mut menu = format!("== {title} ==\n{prompt}\n");
        for (idx, option) in options.iter().enumerate() {
            menu.push_str(&format!("  {}) {option}\n", idx + 1));
        }
        self.say(menu.trim_end())?;
        loop {
            let Some(answer) = self.ask("Choice: ")? else {
                return Ok(None);
            };
            match answer.parse::<usize>() {
                Ok(n) if (1..=options.len()).contains(&n) => return Ok(Some(n - 1)),
                _ if answer.is_empty() || answer == "q" => return Ok(None),
                _ => self.say(&format!("Enter a number between 1 and {}.", options.len()))?,
            }
        }
    }

    /// Prints the warning and returns at once; a text alert never blocks the poll.
    fn alert(&self, title: &str, text: &str, _timeout: Duration) -> Result<AlertResponse> {
        self.say(&format!("*** {title} ***\n{}", text.trim_end()))?;
        Ok(AlertResponse::Dismissed)
    }
}

// ──────────────────── selection ────────────────────

/// Pick the dialog backend for this session.
pub fn select_dialog(preference: DialogPreference) -> Box<dyn Dialog> {
    let graphical = match preference {
        DialogPreference::Graphical => true,
        DialogPreference::Text => false,
        DialogPreference::Auto => graphical_available_from(|name| env::var_os(name)),
    };
    if graphical {
        Box::new(YadDialog::default())
    } else {
        Box::new(TextDialog::stdio())
    }
}

/// yad on PATH and a display to draw on.
fn graphical_available_from<F>(mut lookup: F) -> bool
where
    F: FnMut(&str) -> Option<OsString>,
{
    let has_display = ["DISPLAY", "WAYLAND_DISPLAY"]
        .iter()
        .any(|name| lookup(name).is_some_and(|v| !v.is_empty()));
    has_display
        && lookup("PATH").is_some_and(|path| {
            env::split_paths(&path).any(|dir| dir.join("yad").is_file())
        })
}
