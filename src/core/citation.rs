//! core::citation
//!
//! Bibliography entries declared by plugins and actions.
//!
//! Entries are rendered as BibTeX. A result carries the entries of the
//! plugin and action that produced it, so `tools citations` can rebuild
//! the bibliography for any saved result.

use std::collections::{BTreeMap, HashSet};
use std::fmt;

use serde::{Deserialize, Serialize};

/// One BibTeX entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Citation {
    pub key: String,
    /// BibTeX entry type, e.g. `article`.
    #[serde(rename = "type")]
    pub entry_type: String,
    #[serde(default)]
    pub fields: BTreeMap<String, String>,
}

impl Citation {
    pub fn new(key: impl Into<String>, entry_type: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            entry_type: entry_type.into(),
            fields: BTreeMap::new(),
        }
    }

    pub fn field(mut self, name: &str, value: impl Into<String>) -> Self {
        self.fields.insert(name.to_string(), value.into());
        self
    }

    /// One-line form for help text: `Author (Year). Title.`
    pub fn summary(&self) -> String {
        let author = self.fields.get("author").map(String::as_str).unwrap_or(&self.key);
        let mut text = author.to_string();
        if let Some(year) = self.fields.get("year") {
            text.push_str(&format!(" ({})", year));
        }
        if let Some(title) = self.fields.get("title") {
            text.push_str(&format!(". {}", title.trim_end_matches('.')));
        }
        text.push('.');
        text
    }
}

impl fmt::Display for Citation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "@{}{{{},", self.entry_type, self.key)?;
        for (name, value) in &self.fields {
            write!(f, "\n {} = {{{}}},", name, value)?;
        }
        write!(f, "\n}}")
    }
}

/// Concatenate entry lists, keeping the first entry for each key.
pub fn merge<'a>(lists: impl IntoIterator<Item = &'a [Citation]>) -> Vec<Citation> {
    let mut seen = HashSet::new();
    lists
        .into_iter()
        .flatten()
        .filter(|c| seen.insert(c.key.clone()))
        .cloned()
        .collect()
}

/// Entries as a `.bib` document, one blank line apart.
pub fn bibliography(citations: &[Citation]) -> String {
    let entries: Vec<String> = citations.iter().map(Citation::to_string).collect();
    let mut text = entries.join("\n\n");
    if !text.is_empty() {
        text.push('\n');
    }
    text
}

#[cfg(test)]
mod tests {
    use super::*;

    fn doe() -> Citation {
        Citation::new("doe2024", "article")
            .field("author", "Doe, Jane")
            .field("title", "Integer sequences.")
            .field("year", "2024")
    }

    #[test]
    fn renders_bibtex_with_sorted_fields() {
        assert_eq!(
            doe().to_string(),
            "@article{doe2024,\n author = {Doe, Jane},\n title = {Integer sequences.},\n year = {2024},\n}"
        );
    }

    #[test]
    fn summary_falls_back_to_key() {
        assert_eq!(doe().summary(), "Doe, Jane (2024). Integer sequences.");
        assert_eq!(Citation::new("bare", "misc").summary(), "bare.");
    }

    #[test]
    fn merge_drops_repeated_keys() {
        let other = Citation::new("roe2020", "book");
        let merged = merge([&[doe(), other.clone()][..], &[doe()][..]]);
        assert_eq!(merged, vec![doe(), other]);
    }

    #[test]
    fn empty_bibliography_is_empty() {
        assert_eq!(bibliography(&[]), "");
        assert!(bibliography(&[doe()]).ends_with("}\n"));
    }
}
