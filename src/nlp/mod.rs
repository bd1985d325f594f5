//! Maps free-text phrases onto tool invocations.
//!
//! Rules are tried in registration order and the first match wins; a phrase
//! that matches nothing goes to the model as an ordinary message.

mod rules;

use regex::{Captures, Regex};

use crate::tools::{InvocationOrigin, ToolInvocation};

type Extractor = fn(&Captures<'_>) -> Vec<(&'static str, String)>;

pub struct Rule {
    pub name: &'static str,
    pub tool: &'static str,
    pattern: Regex,
    extract: Extractor,
}

impl Rule {
    fn apply(&self, phrase: &str) -> Option<ToolInvocation> {
        let captures = self.pattern.captures(phrase)?;
        let invocation = (self.extract)(&captures).into_iter().fold(
            ToolInvocation::new(self.tool, InvocationOrigin::NaturalLanguage),
            |invocation, (name, value)| invocation.with_arg(name, value),
        );
        Some(invocation)
    }
}

pub struct Interpreter {
    rules: Vec<Rule>,
}

impl Interpreter {
    /// The standard rule set.
    pub fn new() -> Self {
        Self {
            rules: rules::standard_rules(),
        }
    }

    /// First matching rule's invocation, or `None`. Pure: no state is read
    /// or written besides the compiled rules.
    pub fn interpret(&self, phrase: &str) -> Option<ToolInvocation> {
        let phrase = phrase.trim();
        if phrase.is_empty() {
            return None;
        }
        self.rules.iter().find_map(|rule| rule.apply(phrase))
    }

    /// Name of the rule that would fire, for `/interpret`.
    pub fn matching_rule(&self, phrase: &str) -> Option<&'static str> {
        let phrase = phrase.trim();
        self.rules
            .iter()
            .find(|rule| rule.pattern.is_match(phrase))
            .map(|rule| rule.name)
    }

    pub fn rules(&self) -> &[Rule] {
        &self.rules
    }
}

impl Default for Interpreter {
    fn default() -> Self {
        Self::new()
    }
}
