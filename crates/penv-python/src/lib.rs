#![deny(clippy::all, warnings)]

use std::{
    env,
    ffi::OsString,
    path::{Path, PathBuf},
    process::Command,
};

use anyhow::{anyhow, bail, Context, Result};

/// Overrides interpreter discovery when set.
pub const PYTHON_OVERRIDE_ENV: &str = "PENV_PYTHON";

const VERSION_SCRIPT: &str = "import platform; print(platform.python_version())";

const DISTRIBUTION_SCRIPT: &str = r"import sys
from importlib import metadata
try:
    print(metadata.version(sys.argv[1]))
except metadata.PackageNotFoundError:
    sys.exit(3)
";

/// Detects the Python interpreter penv falls back to when nothing else was requested.
///
/// # Errors
///
/// Returns an error when neither the override nor `PATH` yields an interpreter.
pub fn detect_interpreter() -> Result<PathBuf> {
    if let Some(explicit) = env::var_os(PYTHON_OVERRIDE_ENV) {
        return Ok(PathBuf::from(explicit));
    }

    for candidate in ["python3", "python"] {
        if let Ok(path) = which::which(candidate) {
            return Ok(path);
        }
    }

    bail!("no python interpreter found; set {PYTHON_OVERRIDE_ENV}")
}

/// Resolves an interpreter request: an existing path, a `3.11`-style
/// version, or an executable name. `None` means the default interpreter.
///
/// # Errors
///
/// Returns an error when the request cannot be satisfied by anything on `PATH`.
pub fn find_python(request: Option<&str>) -> Result<PathBuf> {
    let Some(request) = request.map(str::trim).filter(|value| !value.is_empty()) else {
        return detect_interpreter();
    };

    let as_path = Path::new(request);
    if as_path.is_file() {
        return Ok(as_path.to_path_buf());
    }

    if is_version_request(request) {
        let channel = normalize_channel(request)?;
        if let Ok(path) = which::which(format!("python{channel}")) {
            return Ok(path);
        }
        // `python3` on PATH may already be the requested minor.
        if let Ok(fallback) = detect_interpreter() {
            let matches = python_version(&fallback)
                .and_then(|version| normalize_channel(&version).ok())
                .is_some_and(|found| found == channel);
            if matches {
                return Ok(fallback);
            }
        }
        bail!("python {request} was not found on PATH");
    }

    which::which(request).with_context(|| format!("python `{request}` was not found on PATH"))
}

/// Looks up `name` on the process `PATH`.
#[must_use]
pub fn which_on_path(name: &str) -> Option<PathBuf> {
    which::which(name).ok()
}

/// Looks up `name` only inside `dirs`, ignoring the process `PATH`.
#[must_use]
pub fn which_in(name: &str, dirs: &[PathBuf]) -> Option<PathBuf> {
    if dirs.is_empty() {
        return None;
    }
    let paths: OsString = env::join_paths(dirs).ok()?;
    let cwd = dirs.first()?;
    which::which_in(name, Some(paths), cwd).ok()
}

/// Reports the `X.Y.Z` version of the interpreter at `path`.
///
/// Any failure to run or parse the interpreter yields `None`.
#[must_use]
pub fn python_version(path: &Path) -> Option<String> {
    let output = Command::new(path).arg("-c").arg(VERSION_SCRIPT).output();
    match output {
        Ok(out) if out.status.success() => {
            let version = String::from_utf8_lossy(&out.stdout).trim().to_string();
            if version.is_empty() {
                None
            } else {
                Some(version)
            }
        }
        Ok(out) => {
            tracing::debug!(
                python = %path.display(),
                code = out.status.code().unwrap_or(-1),
                "python version probe exited unsuccessfully"
            );
            None
        }
        Err(err) => {
            tracing::debug!(
                %err,
                python = %path.display(),
                "python version probe failed to start"
            );
            None
        }
    }
}

/// Reads the installed version of distribution `dist` as seen by `python`.
#[must_use]
pub fn distribution_version(python: &Path, dist: &str) -> Option<String> {
    let output = Command::new(python)
        .arg("-c")
        .arg(DISTRIBUTION_SCRIPT)
        .arg(dist)
        .output()
        .ok()?;
    if !output.status.success() {
        return None;
    }
    let version = String::from_utf8_lossy(&output.stdout).trim().to_string();
    (!version.is_empty()).then_some(version)
}

fn parse_channel(input: &str) -> Result<(u64, u64)> {
    let mut parts = input.trim().split('.');
    let major = parts
        .next()
        .filter(|part| !part.is_empty())
        .ok_or_else(|| anyhow!("python version missing major"))?
        .parse::<u64>()
        .with_context(|| format!("invalid python version `{input}`"))?;
    let minor = parts
        .next()
        .ok_or_else(|| anyhow!("python version missing minor"))?
        .parse::<u64>()
        .with_context(|| format!("invalid python version `{input}`"))?;
    Ok((major, minor))
}

/// Reduces a full version to its `major.minor` channel.
///
/// # Errors
///
/// Returns an error when the input has no numeric major and minor component.
pub fn normalize_channel(version: &str) -> Result<String> {
    let (major, minor) = parse_channel(version)?;
    Ok(format!("{major}.{minor}"))
}

fn is_version_request(request: &str) -> bool {
    request.chars().next().is_some_and(|ch| ch.is_ascii_digit())
        && request.chars().all(|ch| ch.is_ascii_digit() || ch == '.')
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;
    use std::fs;
    use tempfile::TempDir;

    struct OverrideGuard;

    impl OverrideGuard {
        fn set(value: &Path) -> Self {
            env::set_var(PYTHON_OVERRIDE_ENV, value);
            Self
        }
    }

    impl Drop for OverrideGuard {
        fn drop(&mut self) {
            env::remove_var(PYTHON_OVERRIDE_ENV);
        }
    }

    #[test]
    fn normalize_channel_keeps_major_minor() {
        assert_eq!(normalize_channel("3.11.4").unwrap(), "3.11");
        assert_eq!(normalize_channel("3.9").unwrap(), "3.9");
        assert!(normalize_channel("3").is_err());
        assert!(normalize_channel("python").is_err());
    }

    #[test]
    fn version_requests_are_numeric() {
        assert!(is_version_request("3.12"));
        assert!(is_version_request("3"));
        assert!(!is_version_request("pypy3"));
        assert!(!is_version_request("/usr/bin/python3"));
    }

    #[test]
    fn python_version_is_none_for_missing_interpreter() {
        let temp = TempDir::new().unwrap();
        assert!(python_version(&temp.path().join("nope")).is_none());
    }

    #[test]
    fn find_python_accepts_existing_paths() {
        let temp = TempDir::new().unwrap();
        let fake = temp.path().join("python");
        fs::write(&fake, "").unwrap();
        let found = find_python(Some(fake.to_str().unwrap())).unwrap();
        assert_eq!(found, fake);
    }

    #[test]
    #[serial]
    fn detect_interpreter_honors_override() {
        let temp = TempDir::new().unwrap();
        let fake = temp.path().join("custom-python");
        let _guard = OverrideGuard::set(&fake);
        assert_eq!(detect_interpreter().unwrap(), fake);
        assert_eq!(find_python(None).unwrap(), fake);
    }

    #[test]
    fn which_in_ignores_empty_search_path() {
        assert!(which_in("python", &[]).is_none());
    }

    #[cfg(unix)]
    #[test]
    fn which_in_finds_executables_in_given_dirs() {
        use std::os::unix::fs::PermissionsExt;

        let temp = TempDir::new().unwrap();
        let bin = temp.path().join("bin");
        fs::create_dir_all(&bin).unwrap();
        let python = bin.join("python");
        fs::write(&python, "#!/bin/sh\n").unwrap();
        fs::set_permissions(&python, fs::Permissions::from_mode(0o755)).unwrap();

        assert_eq!(which_in("python", &[bin.clone()]), Some(python));
        assert!(which_in("py", &[bin]).is_none());
    }
}
