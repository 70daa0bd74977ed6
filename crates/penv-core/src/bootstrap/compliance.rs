use std::path::{Path, PathBuf};

use penv_domain::Project;

use crate::diagnostics::{shorten_path, StyledLine, Tone};
use crate::effects::{InterpreterLocator, VersionReader};

/// Outcome of comparing the environment's interpreter with the Pipfile pin.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum VersionCompliance {
    /// No environment was created this run, or warnings were disabled.
    NotChecked,
    /// The Pipfile does not pin a Python version.
    Unpinned,
    /// No interpreter could be located, so nothing was compared.
    Skipped,
    Satisfied,
    Mismatch {
        required: String,
        actual: Option<String>,
        python: PathBuf,
    },
}

/// Substring containment: a `3.11` pin accepts `3.11.4`.
pub(crate) fn check(
    project: &Project,
    locator: &dyn InterpreterLocator,
    versions: &dyn VersionReader,
) -> VersionCompliance {
    let Some(required) = project.required_python_version() else {
        return VersionCompliance::Unpinned;
    };
    let Some(python) = locator
        .which(project, "python")
        .or_else(|| locator.which(project, "py"))
    else {
        return VersionCompliance::Skipped;
    };
    let actual = versions.version_of(&python);
    if actual.as_deref().unwrap_or("").contains(required.as_str()) {
        VersionCompliance::Satisfied
    } else {
        VersionCompliance::Mismatch {
            required,
            actual,
            python,
        }
    }
}

pub(crate) fn mismatch_warning(
    required: &str,
    actual: Option<&str>,
    python: &Path,
    deploy: bool,
) -> Vec<StyledLine> {
    let mut lines = vec![
        StyledLine::new()
            .bold("Warning", Tone::Red)
            .plain(": Your Pipfile requires ")
            .bold("python_version", Tone::Plain)
            .plain(" ")
            .tone(required, Tone::Cyan)
            .plain(", but you are using ")
            .tone(actual.unwrap_or("unknown"), Tone::Cyan)
            .plain(" from ")
            .tone(shorten_path(python), Tone::Green)
            .plain("."),
        StyledLine::new()
            .tone("$ penv --rm", Tone::Green)
            .plain(" and rebuilding the virtual environment may resolve the issue."),
    ];
    if !deploy {
        lines.push(
            StyledLine::new()
                .tone("$ penv check", Tone::Yellow)
                .plain(" will surely fail."),
        );
    }
    lines
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn advisory_warning_mentions_both_versions() {
        let python = Path::new("/opt/py/bin/python");
        let lines = mismatch_warning("3.11", Some("3.10.4"), python, false);
        let text: Vec<String> = lines.iter().map(StyledLine::plain_text).collect();
        assert_eq!(text.len(), 3);
        assert_eq!(
            text[0],
            "Warning: Your Pipfile requires python_version 3.11, but you are using 3.10.4 from /opt/py/bin/python."
        );
        assert!(text[1].starts_with("$ penv --rm"));
        assert_eq!(text[2], "$ penv check will surely fail.");
    }

    #[test]
    fn deploy_warning_drops_check_hint() {
        let lines = mismatch_warning("3.11", None, Path::new("/opt/py/bin/python"), true);
        assert_eq!(lines.len(), 2);
        assert!(lines[0].plain_text().contains("you are using unknown from"));
    }
}
