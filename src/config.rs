/// Run configuration loaded from the `.ini` parameter file
///
/// The file carries a `[params]` section with the data format, the input
/// file pattern and the output directory, plus one section named after the
/// format value holding the multi-line `col_params` extraction spec:
///
/// ```ini
/// [params]
/// FORMAT_DONNEES = SALLELES
/// FICHIERS_INPUT = exports/*.xlsx
/// RESULTATS = resultats
///
/// [SALLELES]
/// col_params =
///     Cesse : CESSE.COMPTEUR.DEBIT.Courant_100
///     Cesse : CESSE.COMPTEUR.NIVEAU.Cote
///     Moussoulens : MOUSSOULENS.COMPTEUR.DEBIT.courant
/// ```
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::debug;

use crate::reader::SourceFormat;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("missing section [{0}] in config file")]
    MissingSection(String),

    #[error("missing key '{key}' in section [{section}]")]
    MissingKey { section: String, key: String },

    #[error("malformed extraction line (expected 'Entity : Identifier'): {0}")]
    MalformedSpecLine(String),

    #[error("unknown FORMAT_DONNEES value: {0}")]
    UnknownFormat(String),
}

/// Immutable mapping from station name to its ordered source identifiers.
///
/// Built once from the `col_params` block; never mutated afterwards.
#[derive(Debug, Clone)]
pub struct ExtractionSpec {
    entities: BTreeMap<String, Vec<String>>,
}

impl ExtractionSpec {
    /// Parse the multi-line `Entity : Identifier` block. Lines sharing an
    /// entity accumulate an ordered identifier list; blank lines are skipped.
    pub fn parse(text: &str) -> Result<Self, ConfigError> {
        let mut entities: BTreeMap<String, Vec<String>> = BTreeMap::new();
        for line in text.lines() {
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            let (entity, column) = line
                .split_once(':')
                .ok_or_else(|| ConfigError::MalformedSpecLine(line.to_string()))?;
            entities
                .entry(entity.trim().to_string())
                .or_default()
                .push(column.trim().to_string());
        }
        Ok(Self { entities })
    }

    pub fn entities(&self) -> impl Iterator<Item = (&str, &[String])> {
        self.entities
            .iter()
            .map(|(name, cols)| (name.as_str(), cols.as_slice()))
    }

    pub fn columns_for(&self, entity: &str) -> Option<&[String]> {
        self.entities.get(entity).map(|cols| cols.as_slice())
    }

    pub fn len(&self) -> usize {
        self.entities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    pub format: SourceFormat,
    /// Glob pattern selecting the input files (FICHIERS_INPUT).
    pub input_pattern: String,
    /// Output directory for the reconciled series (RESULTATS).
    pub output_dir: PathBuf,
    pub extraction: ExtractionSpec,
}

impl Config {
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        let sections = parse_ini(&contents);
        debug!(
            "parsed {} config sections from {}",
            sections.len(),
            path.display()
        );

        let format_name = get_key(&sections, "params", "FORMAT_DONNEES")?;
        let format = match format_name.as_str() {
            "SALLELES" => SourceFormat::Tabbed,
            "POSTE_CENTRAL" => SourceFormat::Pivoted,
            other => return Err(ConfigError::UnknownFormat(other.to_string())),
        };

        let input_pattern = get_key(&sections, "params", "FICHIERS_INPUT")?;
        let output_dir = PathBuf::from(get_key(&sections, "params", "RESULTATS")?);

        // the extraction spec lives in a section named after the format value
        let col_params = get_key(&sections, &format_name, "col_params")?;
        let extraction = ExtractionSpec::parse(&col_params)?;

        Ok(Self {
            format,
            input_pattern,
            output_dir,
            extraction,
        })
    }
}

type Sections = BTreeMap<String, BTreeMap<String, String>>;

fn get_key(sections: &Sections, section: &str, key: &str) -> Result<String, ConfigError> {
    let entries = sections
        .get(section)
        .ok_or_else(|| ConfigError::MissingSection(section.to_string()))?;
    let value = entries.get(key).ok_or_else(|| ConfigError::MissingKey {
        section: section.to_string(),
        key: key.to_string(),
    })?;
    Ok(value.trim().to_string())
}

/// Minimal `.ini` reader: `[section]` headers, `key = value` / `key : value`
/// pairs, `#` and `;` comment lines. Indented lines continue the previous
/// key's value, which is how the multi-line `col_params` block arrives.
fn parse_ini(contents: &str) -> Sections {
    let mut sections: Sections = BTreeMap::new();
    let mut current_section = String::new();
    let mut current_key: Option<String> = None;

    for raw_line in contents.lines() {
        let trimmed = raw_line.trim();
        if trimmed.is_empty() || trimmed.starts_with('#') || trimmed.starts_with(';') {
            continue;
        }

        if trimmed.starts_with('[') && trimmed.ends_with(']') {
            current_section = trimmed[1..trimmed.len() - 1].trim().to_string();
            sections.entry(current_section.clone()).or_default();
            current_key = None;
            continue;
        }

        // continuation line: indented content belonging to the previous key
        if raw_line.starts_with([' ', '\t']) {
            if let Some(key) = &current_key {
                if let Some(entries) = sections.get_mut(&current_section) {
                    if let Some(value) = entries.get_mut(key) {
                        value.push('\n');
                        value.push_str(trimmed);
                    }
                }
            }
            continue;
        }

        let split = raw_line
            .find('=')
            .into_iter()
            .chain(raw_line.find(':'))
            .min();
        if let Some(pos) = split {
            let key = raw_line[..pos].trim().to_string();
            let value = raw_line[pos + 1..].trim().to_string();
            sections
                .entry(current_section.clone())
                .or_default()
                .insert(key.clone(), value);
            current_key = Some(key);
        }
    }

    sections
}
