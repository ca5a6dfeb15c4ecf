//! Command blocklist evaluation.
//!
//! Decides whether a shell command reported by the backend may be surfaced
//! as an actionable tool invocation. Patterns come from user configuration
//! and are treated as regular expressions; a pattern that fails to compile
//! degrades to a literal substring test instead of being dropped.

use regex::Regex;

/// Outcome of evaluating one command against the blocklist.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PolicyDecision {
    pub blocked: bool,
    /// The pattern that matched, as written in the configuration.
    pub matched_pattern: Option<String>,
}

impl PolicyDecision {
    fn allow() -> Self {
        Self {
            blocked: false,
            matched_pattern: None,
        }
    }

    fn block(pattern: &str) -> Self {
        Self {
            blocked: true,
            matched_pattern: Some(pattern.to_string()),
        }
    }
}

/// A single compiled blocklist rule.
///
/// The two-stage construction is deliberate: `Regex::new` is attempted
/// exactly once per pattern, and a malformed pattern becomes a literal
/// rule rather than an error or a silently ignored entry.
#[derive(Debug, Clone)]
enum Rule {
    Regex { source: String, regex: Regex },
    Literal(String),
}

impl Rule {
    fn compile(pattern: &str) -> Self {
        match Regex::new(pattern) {
            Ok(regex) => Rule::Regex {
                source: pattern.to_string(),
                regex,
            },
            Err(_) => Rule::Literal(pattern.to_string()),
        }
    }

    fn matches(&self, command: &str) -> bool {
        match self {
            Rule::Regex { regex, .. } => regex.is_match(command),
            Rule::Literal(needle) => command.contains(needle.as_str()),
        }
    }

    fn source(&self) -> &str {
        match self {
            Rule::Regex { source, .. } => source,
            Rule::Literal(needle) => needle,
        }
    }
}

/// Ordered blocklist over shell commands.
///
/// Evaluation is a pure function of the command string and the configured
/// patterns; nothing here touches the shell or the filesystem, so it is
/// safe to run on attacker-controlled input.
#[derive(Debug, Clone, Default)]
pub struct CommandPolicy {
    rules: Vec<Rule>,
    enabled: bool,
}

impl CommandPolicy {
    /// Compiles a policy from configured patterns.
    ///
    /// Pattern order is preserved: when several patterns would match, the
    /// first one in the list is the one reported.
    pub fn new<I, S>(patterns: I, enabled: bool) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let rules = patterns
            .into_iter()
            .map(|p| Rule::compile(p.as_ref()))
            .collect();
        Self { rules, enabled }
    }

    /// Returns a policy that never blocks.
    pub fn disabled() -> Self {
        Self {
            rules: Vec::new(),
            enabled: false,
        }
    }

    /// Evaluates a command against the blocklist.
    ///
    /// A disabled policy always allows; otherwise the first matching rule
    /// blocks. Any match blocks, so the pattern order only determines
    /// which pattern is reported.
    pub fn evaluate(&self, command: &str) -> PolicyDecision {
        if !self.enabled {
            return PolicyDecision::allow();
        }

        for rule in &self.rules {
            if rule.matches(command) {
                return PolicyDecision::block(rule.source());
            }
        }

        PolicyDecision::allow()
    }
}
