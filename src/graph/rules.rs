//! Named command templates and their registry.

use indexmap::{IndexMap, IndexSet};

use super::GraphError;
use super::template::Template;

/// A named command template shared by build nodes.
///
/// # Examples
///
/// ```
/// use inro::graph::Rule;
///
/// let rule = Rule::new("link", "ld -o $out $in", "LINK $out")
///     .expect("valid rule");
/// assert_eq!(rule.name(), "link");
/// assert!(rule.depfile().is_none());
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rule {
    name: String,
    command: Template,
    description: Template,
    depfile: Option<Template>,
}

fn parse_for(rule: &str, source: &str) -> Result<Template, GraphError> {
    Template::parse(source).map_err(|source_err| GraphError::MalformedTemplate {
        rule: rule.to_owned(),
        template: source.to_owned(),
        source: source_err,
    })
}

impl Rule {
    /// Create a rule, parsing its command and description templates.
    ///
    /// # Errors
    ///
    /// Returns [`GraphError::EmptyRuleName`] for a blank name and
    /// [`GraphError::MalformedTemplate`] when a template fails to parse.
    pub fn new(name: &str, command: &str, description: &str) -> Result<Self, GraphError> {
        if name.trim().is_empty() {
            return Err(GraphError::EmptyRuleName);
        }
        Ok(Self {
            name: name.to_owned(),
            command: parse_for(name, command)?,
            description: parse_for(name, description)?,
            depfile: None,
        })
    }

    /// Attach a per-edge dependency file template.
    ///
    /// # Errors
    ///
    /// Returns [`GraphError::MalformedTemplate`] when `depfile` fails to parse.
    pub fn with_depfile(mut self, depfile: &str) -> Result<Self, GraphError> {
        self.depfile = Some(parse_for(&self.name, depfile)?);
        Ok(self)
    }

    /// Unique rule name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Command template.
    #[must_use]
    pub const fn command(&self) -> &Template {
        &self.command
    }

    /// Human-readable description template.
    #[must_use]
    pub const fn description(&self) -> &Template {
        &self.description
    }

    /// Optional dependency file template.
    #[must_use]
    pub const fn depfile(&self) -> Option<&Template> {
        self.depfile.as_ref()
    }

    /// Every placeholder the rule's templates reference, in first-use order.
    #[must_use]
    pub fn placeholders(&self) -> IndexSet<&str> {
        let mut names: IndexSet<&str> = self.command.placeholders().collect();
        names.extend(self.description.placeholders());
        if let Some(depfile) = &self.depfile {
            names.extend(depfile.placeholders());
        }
        names
    }
}

/// Registered rules keyed by name, in registration order.
#[derive(Debug, Clone, Default)]
pub struct RuleRegistry {
    rules: IndexMap<String, Rule>,
}

impl RuleRegistry {
    /// Register `rule`.
    ///
    /// Re-registering an identical rule is a no-op and returns `false`.
    ///
    /// # Errors
    ///
    /// Returns [`GraphError::RuleConflict`] when a rule of the same name but
    /// different templates already exists.
    pub fn register(&mut self, rule: Rule) -> Result<bool, GraphError> {
        match self.rules.get(rule.name()) {
            Some(existing) if *existing == rule => Ok(false),
            Some(_) => Err(GraphError::RuleConflict {
                name: rule.name().to_owned(),
            }),
            None => {
                self.rules.insert(rule.name().to_owned(), rule);
                Ok(true)
            }
        }
    }

    /// Look up a rule by name.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&Rule> {
        self.rules.get(name)
    }

    /// Iterate over rules in registration order.
    pub fn iter(&self) -> impl Iterator<Item = &Rule> {
        self.rules.values()
    }

    /// Number of registered rules.
    #[must_use]
    pub fn len(&self) -> usize {
        self.rules.len()
    }

    /// Whether no rule has been registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn compile() -> Rule {
        Rule::new("cc", "cc -c $in -o $out", "CC $out")
            .and_then(|rule| rule.with_depfile("$out.d"))
            .expect("rule")
    }

    #[test]
    fn identical_registration_is_a_no_op() {
        let mut registry = RuleRegistry::default();
        assert!(registry.register(compile()).expect("first"));
        assert!(!registry.register(compile()).expect("second"));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn conflicting_registration_is_rejected() {
        let mut registry = RuleRegistry::default();
        registry.register(compile()).expect("first");
        let other = Rule::new("cc", "clang -c $in -o $out", "CC $out").expect("rule");
        let err = registry.register(other).expect_err("conflict");
        assert!(matches!(err, GraphError::RuleConflict { ref name } if name == "cc"));
    }

    #[test]
    fn depfile_changes_rule_identity() {
        let mut registry = RuleRegistry::default();
        registry.register(compile()).expect("first");
        let without_depfile = Rule::new("cc", "cc -c $in -o $out", "CC $out").expect("rule");
        assert!(registry.register(without_depfile).is_err());
    }

    #[test]
    fn placeholders_cover_every_template() {
        let rule = Rule::new("pp", "pp $flags $in", "PP $variant $out")
            .and_then(|rule| rule.with_depfile("${out}.d"))
            .expect("rule");
        let names: Vec<&str> = rule.placeholders().into_iter().collect();
        assert_eq!(names, ["flags", "in", "variant", "out"]);
    }

    #[test]
    fn blank_rule_name_is_rejected() {
        assert!(matches!(
            Rule::new(" ", "true", "true"),
            Err(GraphError::EmptyRuleName)
        ));
    }
}
