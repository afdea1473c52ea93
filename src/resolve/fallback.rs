//! resolve::fallback
//!
//! Sources consulted when an option is absent from the command line.
//!
//! Each source either yields the tokens for an option or [`NotFound`]. The
//! chain tries sources in priority order and stops at the first hit.

use std::path::PathBuf;

use crate::core::config::CommandSection;
use crate::core::types::Role;
use crate::translate::OptionGroup;

/// No value for this option in this source.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NotFound;

/// A source of option values.
pub trait Fallback {
    /// Tokens for `flag` (no leading dashes) of `group`.
    fn lookup(&self, group: &OptionGroup, flag: &str) -> Result<Vec<String>, NotFound>;
}

/// Values from a `--cmd-config` section.
#[derive(Debug, Clone, Default)]
pub struct ConfigFallback {
    section: CommandSection,
}

impl ConfigFallback {
    pub fn new(section: CommandSection) -> Self {
        Self { section }
    }
}

impl Fallback for ConfigFallback {
    fn lookup(&self, _group: &OptionGroup, flag: &str) -> Result<Vec<String>, NotFound> {
        self.section.get(flag).cloned().ok_or(NotFound)
    }
}

/// `<dir>/<output name>` for every output, from `--output-dir`.
#[derive(Debug, Clone)]
pub struct OutputDirFallback {
    dir: PathBuf,
}

impl OutputDirFallback {
    pub fn new(dir: PathBuf) -> Self {
        Self { dir }
    }
}

impl Fallback for OutputDirFallback {
    fn lookup(&self, group: &OptionGroup, _flag: &str) -> Result<Vec<String>, NotFound> {
        if group.role != Role::Output {
            return Err(NotFound);
        }
        Ok(vec![self.dir.join(&group.name).to_string_lossy().into_owned()])
    }
}

/// Ordered fallback sources.
#[derive(Default)]
pub struct FallbackChain {
    sources: Vec<Box<dyn Fallback>>,
}

impl FallbackChain {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, source: impl Fallback + 'static) {
        self.sources.push(Box::new(source));
    }

    pub fn with(mut self, source: impl Fallback + 'static) -> Self {
        self.push(source);
        self
    }

    pub fn lookup(&self, group: &OptionGroup, flag: &str) -> Result<Vec<String>, NotFound> {
        self.sources
            .iter()
            .find_map(|source| source.lookup(group, flag).ok())
            .ok_or(NotFound)
    }

    pub fn is_empty(&self) -> bool {
        self.sources.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::{SignatureEntry, TypeExpr};
    use crate::translate::describe;

    fn output_group() -> OptionGroup {
        describe(&SignatureEntry::new(
            "result",
            Role::Output,
            TypeExpr::semantic("IntSequence1"),
        ))
    }

    #[test]
    fn output_dir_only_applies_to_outputs() {
        let fallback = OutputDirFallback::new(PathBuf::from("out"));
        let tokens = fallback.lookup(&output_group(), "o-result").unwrap();
        assert_eq!(PathBuf::from(&tokens[0]), PathBuf::from("out").join("result"));

        let param = describe(&SignatureEntry::new("x", Role::Parameter, TypeExpr::int()));
        assert_eq!(fallback.lookup(&param, "p-x"), Err(NotFound));
    }

    #[test]
    fn chain_prefers_earlier_sources() {
        let mut section = CommandSection::new();
        section.insert("o-result".to_string(), vec!["from-config".to_string()]);

        let chain = FallbackChain::new()
            .with(ConfigFallback::new(section))
            .with(OutputDirFallback::new(PathBuf::from("out")));

        assert_eq!(
            chain.lookup(&output_group(), "o-result").unwrap(),
            vec!["from-config".to_string()]
        );
    }

    #[test]
    fn empty_chain_finds_nothing() {
        let chain = FallbackChain::new();
        assert!(chain.is_empty());
        assert_eq!(chain.lookup(&output_group(), "o-result"), Err(NotFound));
    }
}
