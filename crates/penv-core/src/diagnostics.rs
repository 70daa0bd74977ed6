//! Styled advisory output for the diagnostic stream.

use std::env;
use std::path::Path;

use atty::Stream;
use color_eyre::owo_colors::OwoColorize;

use crate::effects::DiagnosticSink;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Tone {
    Plain,
    Green,
    Yellow,
    Red,
    Cyan,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Segment {
    pub text: String,
    pub tone: Tone,
    pub bold: bool,
}

/// One line of diagnostic output made of independently styled segments.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct StyledLine {
    segments: Vec<Segment>,
}

impl StyledLine {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn plain(self, text: impl Into<String>) -> Self {
        self.push(text, Tone::Plain, false)
    }

    #[must_use]
    pub fn tone(self, text: impl Into<String>, tone: Tone) -> Self {
        self.push(text, tone, false)
    }

    #[must_use]
    pub fn bold(self, text: impl Into<String>, tone: Tone) -> Self {
        self.push(text, tone, true)
    }

    fn push(mut self, text: impl Into<String>, tone: Tone, bold: bool) -> Self {
        self.segments.push(Segment {
            text: text.into(),
            tone,
            bold,
        });
        self
    }

    #[must_use]
    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    /// The line with all styling stripped.
    #[must_use]
    pub fn plain_text(&self) -> String {
        self.segments.iter().map(|seg| seg.text.as_str()).collect()
    }
}

pub struct Style {
    enabled: bool,
}

impl Style {
    #[must_use]
    pub fn new(force_no_color: bool, is_tty: bool) -> Self {
        let env_no_color = env::var_os("NO_COLOR").is_some();
        Self {
            enabled: !(force_no_color || env_no_color) && is_tty,
        }
    }

    #[must_use]
    pub fn render(&self, line: &StyledLine) -> String {
        line.segments()
            .iter()
            .map(|seg| self.paint(&seg.text, seg.tone, seg.bold))
            .collect()
    }

    fn paint(&self, text: &str, tone: Tone, bold: bool) -> String {
        if !self.enabled {
            return text.to_string();
        }
        match (tone, bold) {
            (Tone::Plain, false) => text.to_string(),
            (Tone::Plain, true) => text.bold().to_string(),
            (Tone::Green, false) => text.green().to_string(),
            (Tone::Green, true) => text.green().bold().to_string(),
            (Tone::Yellow, false) => text.yellow().to_string(),
            (Tone::Yellow, true) => text.yellow().bold().to_string(),
            (Tone::Red, false) => text.red().to_string(),
            (Tone::Red, true) => text.red().bold().to_string(),
            (Tone::Cyan, false) => text.cyan().to_string(),
            (Tone::Cyan, true) => text.cyan().bold().to_string(),
        }
    }
}

/// Prints diagnostics on stderr, coloured only when stderr is a terminal.
pub struct StderrSink {
    style: Style,
}

impl StderrSink {
    #[must_use]
    pub fn detect() -> Self {
        Self {
            style: Style::new(false, atty::is(Stream::Stderr)),
        }
    }
}

impl DiagnosticSink for StderrSink {
    fn emit(&self, lines: &[StyledLine]) {
        for line in lines {
            eprintln!("{}", self.style.render(line));
        }
    }
}

/// Abbreviates paths under the home directory with `~`.
#[must_use]
pub fn shorten_path(path: &Path) -> String {
    if let Some(home) = dirs_next::home_dir() {
        if let Ok(rest) = path.strip_prefix(&home) {
            if rest.as_os_str().is_empty() {
                return "~".to_string();
            }
            return Path::new("~").join(rest).display().to_string();
        }
    }
    path.display().to_string()
}
