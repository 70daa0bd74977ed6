use std::{
    collections::BTreeSet,
    fs,
    path::{Path, PathBuf},
    str::FromStr,
};

use anyhow::{anyhow, bail, Context, Result};
use pep508_rs::Requirement as PepRequirement;
use toml_edit::{Array, ArrayOfTables, DocumentMut, InlineTable, Item, Table, Value as TomlValue};
use url::Url;

pub const PIPFILE_NAME: &str = "Pipfile";
pub const DEFAULT_SOURCE_URL: &str = "https://pypi.org/simple";
pub const DEFAULT_CATEGORIES: [&str; 2] = ["packages", "dev-packages"];

const DEFAULT_SOURCE_NAME: &str = "pypi";
const RESERVED_SECTIONS: [&str; 4] = ["source", "requires", "scripts", "pipenv"];

/// Map CLI-facing category aliases onto Pipfile section names.
#[must_use]
pub fn category_section(name: &str) -> &str {
    match name {
        "default" => "packages",
        "develop" => "dev-packages",
        other => other,
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PipfileSource {
    pub name: String,
    pub url: String,
    pub verify_ssl: bool,
}

impl PipfileSource {
    /// A source named after the index host, e.g. `mirror.example`.
    pub fn from_index_url(index_url: &str) -> Result<Self> {
        let parsed = Url::parse(index_url)
            .with_context(|| format!("invalid package index url `{index_url}`"))?;
        let name = parsed
            .host_str()
            .map_or_else(|| DEFAULT_SOURCE_NAME.to_string(), ToString::to_string);
        Ok(Self {
            name,
            url: index_url.to_string(),
            verify_ssl: parsed.scheme() == "https",
        })
    }
}

#[derive(Debug)]
pub struct Pipfile {
    path: PathBuf,
    doc: DocumentMut,
}

impl Pipfile {
    pub fn read(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let contents =
            fs::read_to_string(&path).with_context(|| format!("reading {}", path.display()))?;
        let doc: DocumentMut = contents
            .parse()
            .with_context(|| format!("{} is not valid TOML", path.display()))?;
        Ok(Self { path, doc })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// `python_full_version` wins over `python_version`; `*` pins nothing.
    pub fn required_python_version(&self) -> Option<String> {
        let requires = self.doc.get("requires").and_then(Item::as_table_like)?;
        ["python_full_version", "python_version"]
            .iter()
            .filter_map(|key| requires.get(key).and_then(Item::as_str))
            .map(str::trim)
            .find(|value| !value.is_empty())
            .filter(|value| *value != "*")
            .map(ToString::to_string)
    }

    pub fn sources(&self) -> Vec<PipfileSource> {
        let Some(sources) = self.doc.get("source").and_then(Item::as_array_of_tables) else {
            return Vec::new();
        };
        sources
            .iter()
            .filter_map(|table| {
                Some(PipfileSource {
                    name: table.get("name").and_then(Item::as_str)?.to_string(),
                    url: table.get("url").and_then(Item::as_str)?.to_string(),
                    verify_ssl: table
                        .get("verify_ssl")
                        .and_then(Item::as_bool)
                        .unwrap_or(true),
                })
            })
            .collect()
    }

    /// Every top-level section that holds packages.
    pub fn categories(&self) -> Vec<String> {
        self.doc
            .as_table()
            .iter()
            .filter(|(key, _)| !RESERVED_SECTIONS.contains(key))
            .map(|(key, _)| key.to_string())
            .collect()
    }

    pub fn package_names(&self, category: &str) -> Vec<String> {
        self.doc
            .get(category_section(category))
            .and_then(Item::as_table_like)
            .map(|table| table.iter().map(|(key, _)| key.to_string()).collect())
            .unwrap_or_default()
    }

    /// Structural checks: sources carry a name and url, and every validated
    /// category is a table. `None` validates all categories.
    pub fn validate(&self, categories: Option<&BTreeSet<String>>) -> Result<()> {
        if let Some(item) = self.doc.get("source") {
            let sources = item.as_array_of_tables().ok_or_else(|| {
                anyhow!(
                    "{}: `source` must be declared as [[source]] entries",
                    self.path.display()
                )
            })?;
            for (idx, table) in sources.iter().enumerate() {
                for key in ["name", "url"] {
                    if table.get(key).and_then(Item::as_str).is_none() {
                        bail!(
                            "{}: [[source]] entry {} is missing `{key}`",
                            self.path.display(),
                            idx + 1
                        );
                    }
                }
            }
        }
        if let Some(requires) = self.doc.get("requires") {
            if !requires.is_table_like() {
                bail!("{}: [requires] must be a table", self.path.display());
            }
        }

        let sections: Vec<String> = match categories {
            Some(selected) => selected
                .iter()
                .map(|name| category_section(name).to_string())
                .collect(),
            None => self.categories(),
        };
        for section in sections {
            if let Some(item) = self.doc.get(&section) {
                if !item.is_table_like() {
                    bail!("{}: [{section}] must be a table", self.path.display());
                }
            }
        }
        Ok(())
    }

    /// Add empty sections for requested categories that are missing.
    pub fn ensure_categories(&mut self, categories: &BTreeSet<String>) -> bool {
        let mut changed = false;
        for name in categories {
            let section = category_section(name);
            if self.doc.get(section).is_none() {
                self.doc
                    .as_table_mut()
                    .insert(section, Item::Table(Table::new()));
                changed = true;
            }
        }
        changed
    }

    /// Append a source unless one with the same url is already declared.
    pub fn add_source(&mut self, source: &PipfileSource) -> bool {
        if self.sources().iter().any(|known| known.url == source.url) {
            return false;
        }
        let entry = self
            .doc
            .as_table_mut()
            .entry("source")
            .or_insert(Item::ArrayOfTables(ArrayOfTables::new()));
        let Some(sources) = entry.as_array_of_tables_mut() else {
            return false;
        };
        sources.push(source_table(source));
        true
    }

    /// Record each requirement under `category`; returns how many were added.
    pub fn add_requirements(&mut self, category: &str, specs: &[String]) -> Result<usize> {
        let section = category_section(category).to_string();
        let entry = self
            .doc
            .as_table_mut()
            .entry(&section)
            .or_insert(Item::Table(Table::new()));
        let table = entry
            .as_table_mut()
            .ok_or_else(|| anyhow!("[{section}] must be a table"))?;
        let mut added = 0;
        for spec in specs {
            let (name, value) = pipfile_entry(spec)?;
            table.insert(&name, value);
            added += 1;
        }
        Ok(added)
    }

    pub fn save(&self) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("creating {}", parent.display()))?;
        }
        fs::write(&self.path, self.doc.to_string())
            .with_context(|| format!("writing {}", self.path.display()))
    }
}

pub struct PipfileInitializer;

impl PipfileInitializer {
    /// Write a fresh Pipfile at `path` unless one already exists.
    ///
    /// Returns whether a file was written.
    pub fn scaffold(path: &Path, python_version: Option<&str>) -> Result<bool> {
        if path.exists() {
            return Ok(false);
        }
        Self::build(path, python_version).save()?;
        Ok(true)
    }

    /// The default Pipfile for `path`, held in memory until [`Pipfile::save`].
    pub fn build(path: &Path, python_version: Option<&str>) -> Pipfile {
        let mut doc = DocumentMut::new();

        let mut sources = ArrayOfTables::new();
        sources.push(source_table(&PipfileSource {
            name: DEFAULT_SOURCE_NAME.to_string(),
            url: DEFAULT_SOURCE_URL.to_string(),
            verify_ssl: true,
        }));
        doc.as_table_mut()
            .insert("source", Item::ArrayOfTables(sources));
        for section in DEFAULT_CATEGORIES {
            doc.as_table_mut().insert(section, Item::Table(Table::new()));
        }
        if let Some(version) = python_version {
            let mut requires = Table::new();
            requires.insert("python_version", toml_edit::value(version));
            doc.as_table_mut()
                .insert("requires", Item::Table(requires));
        }
        Pipfile {
            path: path.to_path_buf(),
            doc,
        }
    }
}

fn source_table(source: &PipfileSource) -> Table {
    let mut table = Table::new();
    table.insert("name", toml_edit::value(source.name.as_str()));
    table.insert("url", toml_edit::value(source.url.as_str()));
    table.insert("verify_ssl", toml_edit::value(source.verify_ssl));
    table
}

fn pipfile_entry(spec: &str) -> Result<(String, Item)> {
    let trimmed = spec.trim();
    let requirement = PepRequirement::from_str(trimmed)
        .map_err(|err| anyhow!("invalid requirement `{trimmed}`: {err}"))?;
    let name = requirement.name.to_string();
    let extras = requirement
        .extras
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>();
    let marker = requirement.marker.map(|expr| expr.to_string());

    let body = trimmed.split(';').next().unwrap_or(trimmed).trim();
    let url = body
        .split_once('@')
        .map(|(_, url)| url.trim().to_string())
        .filter(|url| !url.is_empty());
    let version = body
        .find(['<', '>', '=', '!', '~'])
        .map(|idx| body[idx..].trim_end_matches(')').trim().to_string())
        .filter(|version| !version.is_empty())
        .unwrap_or_else(|| "*".to_string());

    if extras.is_empty() && marker.is_none() && url.is_none() {
        return Ok((name, toml_edit::value(version)));
    }

    let mut table = InlineTable::new();
    if let Some(url) = url {
        table.insert("file", TomlValue::from(url));
    } else {
        table.insert("version", TomlValue::from(version));
    }
    if !extras.is_empty() {
        let mut array = Array::new();
        for extra in &extras {
            array.push(extra.as_str());
        }
        table.insert("extras", TomlValue::Array(array));
    }
    if let Some(marker) = marker {
        table.insert("markers", TomlValue::from(marker));
    }
    Ok((name, Item::Value(TomlValue::InlineTable(table))))
}
