use std::{fs, path::Path};

use anyhow::{Context, Result};
use toml_edit::{Array, DocumentMut, Item, Table, Value as TomlValue};

const PYPROJECT_NAME: &str = "pyproject.toml";
const SETUP_PY_NAME: &str = "setup.py";

/// Give a `setup.py`-only project a `[build-system]` table so PEP 517
/// frontends can build it.
///
/// Returns whether `pyproject.toml` was written. Projects without `setup.py`
/// and projects that already declare a build system are left alone, and
/// `backend` is only consulted when a table is actually written.
pub fn ensure_build_system<S: AsRef<str>>(
    root: &Path,
    backend: impl FnOnce() -> S,
) -> Result<bool> {
    if !root.join(SETUP_PY_NAME).is_file() {
        return Ok(false);
    }
    let pyproject_path = root.join(PYPROJECT_NAME);
    let mut doc = if pyproject_path.exists() {
        let contents = fs::read_to_string(&pyproject_path)
            .with_context(|| format!("reading {}", pyproject_path.display()))?;
        contents
            .parse::<DocumentMut>()
            .with_context(|| format!("{} is not valid TOML", pyproject_path.display()))?
    } else {
        DocumentMut::new()
    };
    if doc.get("build-system").is_some_and(Item::is_table) {
        return Ok(false);
    }

    let mut requires = Array::new();
    requires.push("setuptools>=40.8.0");
    requires.push("wheel");
    let mut table = Table::new();
    table.insert("requires", Item::Value(TomlValue::Array(requires)));
    table.insert(
        "build-backend",
        Item::Value(TomlValue::from(backend().as_ref())),
    );
    doc.as_table_mut()
        .insert("build-system", Item::Table(table));

    fs::write(&pyproject_path, doc.to_string())
        .with_context(|| format!("writing {}", pyproject_path.display()))?;
    Ok(true)
}
