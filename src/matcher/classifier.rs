use crate::error::{DossierError, Result};
use crate::matcher::pattern::{Dialect, Pattern};
use crate::template::{RuleSet, Template};

struct CompiledCategory {
    label: String,
    patterns: Vec<Pattern>,
}

/// Assigns names to the first category, in declared order, that has a
/// matching pattern.
pub struct Classifier {
    categories: Vec<CompiledCategory>,
}

impl Classifier {
    pub fn new(rules: &RuleSet, dialect: Dialect) -> Result<Self> {
        let categories = rules
            .iter()
            .map(|category| {
                let patterns = category
                    .patterns
                    .iter()
                    .map(|source| Pattern::compile(source, dialect))
                    .collect::<Result<Vec<_>>>()?;
                Ok(CompiledCategory {
                    label: category.label.clone(),
                    patterns,
                })
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(Self { categories })
    }

    /// Builds a classifier from a template, honoring its `pattern_dialect` option.
    pub fn for_template(template: &Template) -> Result<Self> {
        let dialect = template
            .string_option("pattern_dialect", "auto")?
            .parse::<Dialect>()
            .map_err(|message| DossierError::TemplateValidation { message })?;
        Self::new(&template.rules, dialect)
    }

    pub fn classify(&self, name: &str) -> Option<&str> {
        self.categories
            .iter()
            .find(|category| category.patterns.iter().any(|p| p.matches(name)))
            .map(|category| category.label.as_str())
    }

    /// Like `classify`, restricted to a single category.
    pub fn matches_category(&self, label: &str, name: &str) -> bool {
        self.categories
            .iter()
            .find(|category| category.label == label)
            .is_some_and(|category| category.patterns.iter().any(|p| p.matches(name)))
    }

    pub fn position(&self, label: &str) -> Option<usize> {
        self.categories.iter().position(|c| c.label == label)
    }

    pub fn is_empty(&self) -> bool {
        self.categories.is_empty()
    }

    pub fn len(&self) -> usize {
        self.categories.len()
    }
}
