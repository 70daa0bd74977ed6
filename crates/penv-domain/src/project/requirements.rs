use std::{
    collections::HashSet,
    fs,
    path::{Path, PathBuf},
};

use anyhow::{Context, Result};

pub const REQUIREMENTS_NAME: &str = "requirements.txt";

/// Requirement lines and package indexes gathered from a requirements file.
#[derive(Debug, Default)]
pub struct RequirementFile {
    pub specs: Vec<String>,
    pub index_urls: Vec<String>,
}

/// Read every requirement entry from `path`, following `-r` includes.
///
/// # Errors
///
/// Returns an error when the file or one of its includes cannot be read.
pub fn read_requirements_file(path: &Path) -> Result<RequirementFile> {
    let mut visited = HashSet::new();
    let mut parsed = RequirementFile::default();
    read_requirements_file_inner(path, &mut visited, &mut parsed)?;
    Ok(parsed)
}

fn read_requirements_file_inner(
    path: &Path,
    visited: &mut HashSet<PathBuf>,
    parsed: &mut RequirementFile,
) -> Result<()> {
    let canonical = fs::canonicalize(path).unwrap_or_else(|_| path.to_path_buf());
    if !visited.insert(canonical.clone()) {
        return Ok(());
    }
    let contents = fs::read_to_string(&canonical)
        .with_context(|| format!("reading {}", canonical.display()))?;
    let base_dir = canonical.parent().unwrap_or_else(|| Path::new("."));
    for line in logical_lines(&contents) {
        let spec = strip_comment(line.trim());
        if spec.is_empty() {
            continue;
        }
        if let Some(target) = option_value(spec, &["-r", "--requirement"]) {
            let include = if Path::new(target).is_absolute() {
                PathBuf::from(target)
            } else {
                base_dir.join(target)
            };
            read_requirements_file_inner(&include, visited, parsed)?;
            continue;
        }
        if let Some(url) = option_value(spec, &["-i", "--index-url", "--extra-index-url"]) {
            if !parsed.index_urls.iter().any(|known| known == url) {
                parsed.index_urls.push(url.to_string());
            }
            continue;
        }
        let spec = spec
            .strip_prefix("-e ")
            .or_else(|| spec.strip_prefix("--editable "))
            .map_or(spec, str::trim);
        let spec = strip_requirement_options(spec);
        if let Some(converted) = vcs_requirement(spec) {
            parsed.specs.push(converted);
            continue;
        }
        if spec.starts_with('-') || spec == "." || spec.starts_with("./") {
            continue;
        }
        parsed.specs.push(spec.to_string());
    }
    Ok(())
}

/// Joins physical lines ending in `\` into one logical line.
fn logical_lines(contents: &str) -> Vec<String> {
    let mut lines = Vec::new();
    let mut pending = String::new();
    for raw in contents.lines() {
        let trimmed = raw.trim_end();
        if let Some(head) = trimmed.strip_suffix('\\') {
            pending.push_str(head);
            pending.push(' ');
            continue;
        }
        pending.push_str(trimmed);
        lines.push(std::mem::take(&mut pending));
    }
    if !pending.trim().is_empty() {
        lines.push(pending);
    }
    lines
}

fn strip_comment(line: &str) -> &str {
    if line.starts_with('#') {
        return "";
    }
    match line.find(" #").or_else(|| line.find("\t#")) {
        Some(idx) => line[..idx].trim(),
        None => line,
    }
}

/// Drops per-requirement options such as `--hash=sha256:...`; everything
/// after the first whitespace-separated `--` token belongs to pip.
fn strip_requirement_options(spec: &str) -> &str {
    spec.char_indices()
        .find(|&(idx, ch)| {
            ch.is_whitespace() && spec[idx + ch.len_utf8()..].trim_start().starts_with("--")
        })
        .map_or(spec, |(idx, _)| spec[..idx].trim_end())
}

fn option_value<'a>(spec: &'a str, flags: &[&str]) -> Option<&'a str> {
    for flag in flags {
        if let Some(rest) = spec.strip_prefix(flag) {
            if !(rest.is_empty() || rest.starts_with([' ', '='])) {
                continue;
            }
            let value = rest.trim_start_matches([' ', '=']).trim();
            if !value.is_empty() {
                return Some(value);
            }
        }
    }
    None
}

const VCS_SCHEMES: [&str; 4] = ["git+", "hg+", "svn+", "bzr+"];

/// Rewrites `<vcs url>#egg=<name>` as a PEP 508 direct reference, keeping any
/// other fragment keys (such as `subdirectory`) on the url.
fn vcs_requirement(spec: &str) -> Option<String> {
    if !VCS_SCHEMES.iter().any(|scheme| spec.starts_with(scheme)) {
        return None;
    }
    let (url, fragment) = spec.split_once('#')?;
    let mut egg = None;
    let mut kept = Vec::new();
    for pair in fragment.split('&') {
        match pair.strip_prefix("egg=").map(str::trim) {
            Some(name) if !name.is_empty() => egg = Some(name),
            _ => kept.push(pair),
        }
    }
    let egg = egg?;
    if kept.is_empty() {
        Some(format!("{egg} @ {url}"))
    } else {
        Some(format!("{egg} @ {url}#{}", kept.join("&")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn reads_specs_and_skips_noise() -> Result<()> {
        let dir = tempdir()?;
        let reqs = dir.path().join(REQUIREMENTS_NAME);
        fs::write(
            &reqs,
            "# pinned\nrequests==2.31.0  # http\n\n--no-binary :all:\n.\nflask>=3\n",
        )?;
        let parsed = read_requirements_file(&reqs)?;
        assert_eq!(parsed.specs, vec!["requests==2.31.0", "flask>=3"]);
        assert!(parsed.index_urls.is_empty());
        Ok(())
    }

    #[test]
    fn follows_includes_once() -> Result<()> {
        let dir = tempdir()?;
        let base = dir.path().join("base.txt");
        let reqs = dir.path().join(REQUIREMENTS_NAME);
        fs::write(&base, "attrs\n-r requirements.txt\n")?;
        fs::write(&reqs, "-r base.txt\nrich\n")?;
        let parsed = read_requirements_file(&reqs)?;
        assert_eq!(parsed.specs, vec!["attrs", "rich"]);
        Ok(())
    }

    #[test]
    fn collects_index_urls() -> Result<()> {
        let dir = tempdir()?;
        let reqs = dir.path().join(REQUIREMENTS_NAME);
        fs::write(
            &reqs,
            "-i https://mirror.example/simple\n--extra-index-url=https://extra.example/simple\nidna\n",
        )?;
        let parsed = read_requirements_file(&reqs)?;
        assert_eq!(
            parsed.index_urls,
            vec![
                "https://mirror.example/simple",
                "https://extra.example/simple"
            ]
        );
        assert_eq!(parsed.specs, vec!["idna"]);
        Ok(())
    }

    #[test]
    fn vcs_entries_become_direct_references() -> Result<()> {
        let dir = tempdir()?;
        let reqs = dir.path().join(REQUIREMENTS_NAME);
        fs::write(
            &reqs,
            "-e git+https://git.example/team/penv-plugins.git@v1.2#egg=penv_plugins&subdirectory=plugins\n\
             hg+https://hg.example/tools#egg=lintkit\n\
             git+https://git.example/team/no-egg.git#subdirectory=src\n",
        )?;
        let parsed = read_requirements_file(&reqs)?;
        assert_eq!(
            parsed.specs,
            vec![
                "penv_plugins @ git+https://git.example/team/penv-plugins.git@v1.2#subdirectory=plugins",
                "lintkit @ hg+https://hg.example/tools",
                "git+https://git.example/team/no-egg.git#subdirectory=src",
            ]
        );
        Ok(())
    }

    #[test]
    fn joins_continuations_and_drops_hashes() -> Result<()> {
        let dir = tempdir()?;
        let reqs = dir.path().join(REQUIREMENTS_NAME);
        fs::write(
            &reqs,
            "certifi==2024.2.2 \\\n    --hash=sha256:0569859f95fc761b \\\n    --hash=sha256:dc383c07b76109f3\n\
             urllib3==2.2.1 ; python_version >= \"3.8\" --hash=sha256:450b20ec296a4672\n\
             charset-normalizer==3.3.2\t--hash=sha256:06435b539f889b1f\n",
        )?;
        let parsed = read_requirements_file(&reqs)?;
        assert_eq!(
            parsed.specs,
            vec![
                "certifi==2024.2.2",
                "urllib3==2.2.1 ; python_version >= \"3.8\"",
                "charset-normalizer==3.3.2",
            ]
        );
        Ok(())
    }
}
