//! Topic taxonomy: category names, their aliases and keyword triggers.
//!
//! The table is data supplied from outside (a JSON document); this module only
//! compiles it into an immutable, shareable structure:
//!
//! - names, aliases and literal keywords are folded with
//!   [`normalize_text`](crate::util::normalize_text) once, at load time
//! - every keyword is compiled to a [`Regex`] once, so classification never
//!   compiles patterns per item
//!
//! A [`Taxonomy`] exposes no mutating API. Share it as `Arc<Taxonomy>`.
//!
//! # Table format
//!
//! ```json
//! {
//!   "fallbackLabel": "Uncategorized",
//!   "categories": [
//!     { "name": "Sports", "aliases": ["deportes"], "keywords": ["football", "/\\bgol\\w*/"] }
//!   ]
//! }
//! ```
//!
//! Keywords wrapped in slashes are regular expressions matched against the
//! folded text; everything else is a literal matched as a whole word.

mod classify;

pub use classify::MAX_LABELS;

use once_cell::sync::Lazy;
use regex::Regex;
use serde::Deserialize;
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;
use thiserror::Error;

use crate::util::normalize_text;

/// Label used when a table omits `fallbackLabel`.
pub const DEFAULT_FALLBACK_LABEL: &str = "Uncategorized";

/// SEC-014: Maximum taxonomy file size (1 MB).
const MAX_FILE_SIZE: u64 = 1_048_576;

const BUILTIN_TAXONOMY: &str = include_str!("../../assets/taxonomy.json");

static BUILTIN: Lazy<Arc<Taxonomy>> = Lazy::new(|| {
    Arc::new(Taxonomy::from_json(BUILTIN_TAXONOMY).expect("embedded taxonomy is valid"))
});

#[derive(Debug, Error)]
pub enum TaxonomyError {
    #[error("Failed to read taxonomy file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid taxonomy JSON: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("Invalid keyword pattern {pattern:?} in category {category:?}: {source}")]
    Pattern {
        category: String,
        pattern: String,
        #[source]
        source: regex::Error,
    },

    #[error("Duplicate category name: {0}")]
    DuplicateName(String),

    #[error("Taxonomy file too large: {0} bytes")]
    TooLarge(u64),
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TaxonomyFile {
    #[serde(default)]
    fallback_label: Option<String>,
    #[serde(default)]
    categories: Vec<TaxonFile>,
}

#[derive(Debug, Deserialize)]
struct TaxonFile {
    name: String,
    #[serde(default)]
    aliases: Vec<String>,
    #[serde(default)]
    keywords: Vec<String>,
}

/// A single keyword trigger.
#[derive(Debug, Clone)]
pub enum Keyword {
    /// Folded literal, matched on word boundaries.
    Literal(Regex),
    /// User-supplied pattern, matched as written.
    Pattern(Regex),
}

impl Keyword {
    fn literal(raw: &str) -> Option<Self> {
        let text = normalize_text(raw.trim());
        if text.is_empty() {
            return None;
        }
        Regex::new(&format!(r"\b{}\b", regex::escape(&text)))
            .ok()
            .map(Keyword::Literal)
    }

    /// Counts the non-overlapping matches in already folded text.
    pub fn count_in(&self, folded: &str) -> usize {
        let re = match self {
            Keyword::Literal(re) => re,
            Keyword::Pattern(re) => re,
        };
        re.find_iter(folded).count()
    }
}

/// A named category with alternate names and keyword triggers.
#[derive(Debug, Clone)]
pub struct Taxon {
    pub name: String,
    pub aliases: Vec<String>,
    pub keywords: Vec<Keyword>,
}

/// The compiled, read-only taxonomy table.
#[derive(Debug)]
pub struct Taxonomy {
    fallback_label: String,
    taxa: Vec<Taxon>,
    /// Folded name or alias -> canonical name.
    names: HashMap<String, String>,
}

impl Taxonomy {
    /// Returns the table embedded in the binary, compiled on first use.
    pub fn builtin() -> Arc<Taxonomy> {
        Arc::clone(&BUILTIN)
    }

    /// Loads a taxonomy JSON file from disk.
    pub fn load(path: &Path) -> Result<Self, TaxonomyError> {
        let meta = std::fs::metadata(path)?;
        if meta.len() > MAX_FILE_SIZE {
            return Err(TaxonomyError::TooLarge(meta.len()));
        }
        let content = std::fs::read_to_string(path)?;
        let taxonomy = Self::from_json(&content)?;
        tracing::info!(
            path = %path.display(),
            categories = taxonomy.taxa.len(),
            "Loaded taxonomy"
        );
        Ok(taxonomy)
    }

    /// Compiles a taxonomy from its JSON representation.
    ///
    /// # Errors
    ///
    /// - [`TaxonomyError::Parse`] for malformed JSON
    /// - [`TaxonomyError::Pattern`] when a `/.../` keyword is not a valid regex
    /// - [`TaxonomyError::DuplicateName`] when two categories share a name
    pub fn from_json(json: &str) -> Result<Self, TaxonomyError> {
        let file: TaxonomyFile = serde_json::from_str(json)?;

        let fallback_label = file
            .fallback_label
            .map(|l| l.trim().to_string())
            .filter(|l| !l.is_empty())
            .unwrap_or_else(|| DEFAULT_FALLBACK_LABEL.to_string());

        let mut taxa = Vec::with_capacity(file.categories.len());
        let mut names: HashMap<String, String> = HashMap::new();

        for category in file.categories {
            let name = category.name.trim().to_string();
            if taxa.iter().any(|t: &Taxon| t.name == name) {
                return Err(TaxonomyError::DuplicateName(name));
            }

            let mut keywords = Vec::with_capacity(category.keywords.len());
            for raw in &category.keywords {
                let raw = raw.trim();
                match raw.strip_prefix('/').and_then(|r| r.strip_suffix('/')) {
                    Some(pattern) if !pattern.is_empty() => {
                        let re = Regex::new(pattern).map_err(|source| TaxonomyError::Pattern {
                            category: name.clone(),
                            pattern: pattern.to_string(),
                            source,
                        })?;
                        keywords.push(Keyword::Pattern(re));
                    }
                    _ => keywords.extend(Keyword::literal(raw)),
                }
            }

            for key in std::iter::once(&name).chain(category.aliases.iter()) {
                let folded = normalize_text(key.trim());
                if folded.is_empty() {
                    continue;
                }
                match names.get(&folded) {
                    Some(existing) if *existing != name => {
                        tracing::warn!(
                            alias = %key,
                            kept = %existing,
                            ignored = %name,
                            "Alias claimed by two categories"
                        );
                    }
                    Some(_) => {}
                    None => {
                        names.insert(folded, name.clone());
                    }
                }
            }

            taxa.push(Taxon {
                name,
                aliases: category.aliases,
                keywords,
            });
        }

        Ok(Self {
            fallback_label,
            taxa,
            names,
        })
    }

    /// Label assigned to items no category matches.
    pub fn fallback_label(&self) -> &str {
        &self.fallback_label
    }

    pub fn taxa(&self) -> &[Taxon] {
        &self.taxa
    }

    /// Maps a category name or alias, in any case or accenting, to its
    /// canonical category name.
    ///
    /// ```
    /// use feedmix::taxonomy::Taxonomy;
    ///
    /// let taxonomy = Taxonomy::builtin();
    /// assert_eq!(taxonomy.resolve_alias("DEPORTES"), Some("Sports"));
    /// assert_eq!(taxonomy.resolve_alias("knitting"), None);
    /// ```
    pub fn resolve_alias(&self, name: &str) -> Option<&str> {
        self.names
            .get(&normalize_text(name.trim()))
            .map(String::as_str)
    }
}
