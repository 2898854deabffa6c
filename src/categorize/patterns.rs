use anyhow::{bail, Context, Result};
use regex::{Regex, RegexBuilder};
use serde::Deserialize;

pub const DEFAULT_ASSIGNMENT_PATTERNS: &[&str] = &[
    r"pset\s*(\d+)",          // pset1, Pset 1
    r"problem\s*set\s*(\d+)", // problem set 1
    r"hw\s*(\d+)",            // hw1, hw 1
    r"homework\s*(\d+)",
    r"assignment\s*(\d+)",
];

pub const DEFAULT_PROBLEM_PATTERNS: &[&str] = &[
    r"(?:problem|q|question|part)\s*(\d+(?:\.\d+)?(?:[a-z])?)", // q1, question 1.2, part 1a
    r"(?:prob|p)\.?\s*(\d+(?:\.\d+)?(?:[a-z])?)",                // prob 1, p.1
    r"\((\d+(?:\.\d+)?(?:[a-z])?)\)",                            // (1a)
];

/// Pattern lists as written in `patterns.toml`. A missing list keeps the defaults.
#[derive(Debug, Default, Deserialize)]
pub struct PatternConfig {
    pub assignment: Option<Vec<String>>,
    pub problem: Option<Vec<String>>,
}

/// Compiled, ordered pattern lists for both roles.
#[derive(Debug, Clone)]
pub struct PatternSet {
    pub assignment: Vec<Regex>,
    pub problem: Vec<Regex>,
}

impl PatternSet {
    pub fn from_config(cfg: &PatternConfig) -> Result<Self> {
        let defaults = Self::default();
        Ok(Self {
            assignment: match &cfg.assignment {
                Some(p) => compile_all(p).context("invalid assignment pattern")?,
                None => defaults.assignment,
            },
            problem: match &cfg.problem {
                Some(p) => compile_all(p).context("invalid problem pattern")?,
                None => defaults.problem,
            },
        })
    }

    /// Parse a `patterns.toml` document.
    pub fn from_toml(src: &str) -> Result<Self> {
        let cfg: PatternConfig = toml::from_str(src).context("failed to parse pattern file")?;
        Self::from_config(&cfg)
    }
}

impl Default for PatternSet {
    fn default() -> Self {
        Self {
            assignment: DEFAULT_ASSIGNMENT_PATTERNS.iter().map(|p| compile_known(p)).collect(),
            problem: DEFAULT_PROBLEM_PATTERNS.iter().map(|p| compile_known(p)).collect(),
        }
    }
}

fn compile_known(pattern: &str) -> Regex {
    RegexBuilder::new(pattern)
        .case_insensitive(true)
        .build()
        .unwrap()
}

fn compile_all<S: AsRef<str>>(patterns: &[S]) -> Result<Vec<Regex>> {
    patterns.iter().map(|p| compile(p.as_ref())).collect()
}

/// Compile one case-insensitive pattern; it must capture exactly one group.
pub fn compile(pattern: &str) -> Result<Regex> {
    let re = RegexBuilder::new(pattern)
        .case_insensitive(true)
        .build()
        .with_context(|| format!("`{}` is not a valid regex", pattern))?;
    // captures_len counts the implicit whole-match group
    if re.captures_len() != 2 {
        bail!(
            "`{}` must have exactly one capturing group (found {})",
            pattern,
            re.captures_len() - 1
        );
    }
    Ok(re)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_compile() {
        let set = PatternSet::default();
        assert_eq!(set.assignment.len(), 5);
        assert_eq!(set.problem.len(), 3);
    }

    #[test]
    fn rejects_wrong_group_count() {
        assert!(compile(r"pset\s*\d+").is_err());
        assert!(compile(r"(pset)\s*(\d+)").is_err());
        assert!(compile(r"(?:pset)\s*(\d+)").is_ok());
    }

    #[test]
    fn rejects_invalid_regex() {
        let err = PatternSet::from_toml(r"assignment = ['pset(\d+']").unwrap_err();
        assert!(format!("{:#}", err).contains("assignment"));
    }

    #[test]
    fn compiled_patterns_ignore_case() {
        let re = compile(r"lab\s*(\d+)").unwrap();
        assert!(re.is_match("LAB 4"));
    }

    #[test]
    fn toml_overrides_one_role() {
        let set = PatternSet::from_toml(r#"assignment = ['lab\s*(\d+)']"#).unwrap();
        assert_eq!(set.assignment.len(), 1);
        assert!(set.assignment[0].is_match("Lab 3"));
        assert_eq!(set.problem.len(), DEFAULT_PROBLEM_PATTERNS.len());
    }

    #[test]
    fn toml_empty_keeps_defaults() {
        let set = PatternSet::from_toml("").unwrap();
        assert_eq!(set.assignment.len(), DEFAULT_ASSIGNMENT_PATTERNS.len());
    }
}
