use crate::error::{DossierError, Result};
use regex::Regex;
use std::str::FromStr;

const REGEX_PREFIX: &str = "re:";

/// How a pattern string is interpreted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Dialect {
    /// `re:` prefix selects regex, glob metacharacters select wildcard,
    /// anything else is a literal substring.
    #[default]
    Auto,
    Literal,
    Wildcard,
    Regex,
}

impl FromStr for Dialect {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "auto" => Ok(Dialect::Auto),
            "literal" => Ok(Dialect::Literal),
            "wildcard" | "glob" => Ok(Dialect::Wildcard),
            "regex" => Ok(Dialect::Regex),
            other => Err(format!(
                "Unknown pattern dialect '{}'. Expected auto, literal, wildcard or regex",
                other
            )),
        }
    }
}

/// A compiled match pattern.
#[derive(Debug, Clone)]
pub enum Pattern {
    Literal(String),
    Wildcard(glob::Pattern),
    Regex(Regex),
}

impl Pattern {
    pub fn compile(source: &str, dialect: Dialect) -> Result<Self> {
        let dialect = match dialect {
            Dialect::Auto => detect_dialect(source),
            other => other,
        };

        match dialect {
            Dialect::Literal => Ok(Pattern::Literal(source.to_string())),
            Dialect::Wildcard => glob::Pattern::new(source)
                .map(Pattern::Wildcard)
                .map_err(|e| DossierError::TemplateValidation {
                    message: format!("invalid wildcard pattern '{}': {}", source, e),
                }),
            Dialect::Regex | Dialect::Auto => {
                let expression = source.strip_prefix(REGEX_PREFIX).unwrap_or(source);
                Regex::new(expression)
                    .map(Pattern::Regex)
                    .map_err(|e| DossierError::TemplateValidation {
                        message: format!("invalid regex pattern '{}': {}", source, e),
                    })
            }
        }
    }

    pub fn matches(&self, name: &str) -> bool {
        match self {
            Pattern::Literal(literal) => name.contains(literal.as_str()),
            Pattern::Wildcard(pattern) => pattern.matches(name),
            Pattern::Regex(regex) => regex.is_match(name),
        }
    }
}

fn detect_dialect(source: &str) -> Dialect {
    if source.starts_with(REGEX_PREFIX) {
        Dialect::Regex
    } else if source.contains(['*', '?', '[']) {
        Dialect::Wildcard
    } else {
        Dialect::Literal
    }
}

/// One-shot match of a pattern string against a name.
///
/// Patterns that fail to compile never match.
pub fn matches(pattern: &str, name: &str) -> bool {
    Pattern::compile(pattern, Dialect::Auto)
        .map(|p| p.matches(name))
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_literal_is_substring() {
        assert!(matches("报告", "检验报告.docx"));
        assert!(matches("report", "final-report-v2.pdf"));
        assert!(!matches("report", "summary.pdf"));
    }

    #[test]
    fn test_wildcard_dialect() {
        assert!(matches("*材料包", "注册申报材料包"));
        assert!(matches("*_*_*", "a_b_c"));
        assert!(!matches("*_*_*", "a_b"));
        assert!(matches("*0010600*", "X0010600Y"));
        assert!(matches("file?.txt", "file1.txt"));
    }

    #[test]
    fn test_regex_dialect() {
        assert!(matches(r"re:^CH\d+\.", "CH1.2 overview"));
        assert!(!matches(r"re:^CH\d+\.", "see CH1.2"));
    }

    #[test]
    fn test_forced_dialect() {
        let literal = Pattern::compile("a*b", Dialect::Literal).unwrap();
        assert!(literal.matches("xa*by"));
        assert!(!literal.matches("aXb"));

        let regex = Pattern::compile("^a.b$", Dialect::Regex).unwrap();
        assert!(regex.matches("axb"));
    }

    #[test]
    fn test_invalid_patterns() {
        assert!(Pattern::compile("re:(", Dialect::Auto).is_err());
        assert!(Pattern::compile("[", Dialect::Wildcard).is_err());
        assert!(!matches("re:(", "("));
    }

    #[test]
    fn test_dialect_parsing() {
        assert_eq!("glob".parse::<Dialect>().unwrap(), Dialect::Wildcard);
        assert_eq!("Regex".parse::<Dialect>().unwrap(), Dialect::Regex);
        assert!("fuzzy".parse::<Dialect>().is_err());
    }
}
