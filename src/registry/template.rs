//! URI templates for item registries
//!
//! Templates such as `users://{id}/profile` let an item registry answer for
//! every concrete URI that fits the pattern. The automaton itself only ever
//! sees concrete URIs; matching happens here.

use crate::{Error, Result};
use regex::Regex;
use std::collections::BTreeMap;

#[derive(Debug, Clone)]
pub struct UriTemplate {
    pattern: String,
    params: Vec<String>,
    regex: Regex,
}

impl UriTemplate {
    /// Compile a template; every `{name}` matches one non-empty path segment
    pub fn parse(pattern: &str) -> Result<Self> {
        let mut source = String::from("^");
        let mut params = Vec::new();
        let mut rest = pattern;

        while let Some(open) = rest.find('{') {
            let (literal, tail) = rest.split_at(open);
            if literal.contains('}') {
                return Err(invalid(pattern, "unbalanced '}'"));
            }
            source.push_str(&regex::escape(literal));

            let close = tail
                .find('}')
                .ok_or_else(|| invalid(pattern, "unclosed '{'"))?;
            let name = &tail[1..close];
            if !is_param_name(name) {
                return Err(invalid(pattern, &format!("bad parameter name '{name}'")));
            }
            if params.iter().any(|p| p == name) {
                return Err(invalid(pattern, &format!("duplicate parameter '{name}'")));
            }
            source.push_str(&format!("(?P<{name}>[^/]+)"));
            params.push(name.to_string());
            rest = &tail[close + 1..];
        }
        if rest.contains('}') {
            return Err(invalid(pattern, "unbalanced '}'"));
        }
        source.push_str(&regex::escape(rest));
        source.push('$');

        let regex = Regex::new(&source).map_err(|e| invalid(pattern, &e.to_string()))?;
        Ok(Self {
            pattern: pattern.to_string(),
            params,
            regex,
        })
    }

    pub fn pattern(&self) -> &str {
        &self.pattern
    }

    pub fn params(&self) -> &[String] {
        &self.params
    }

    /// Captured parameters when `uri` fits the template
    pub fn matches(&self, uri: &str) -> Option<BTreeMap<String, String>> {
        let caps = self.regex.captures(uri)?;
        Some(
            self.params
                .iter()
                .filter_map(|p| caps.name(p).map(|m| (p.clone(), m.as_str().to_string())))
                .collect(),
        )
    }
}

fn is_param_name(name: &str) -> bool {
    let mut chars = name.chars();
    matches!(chars.next(), Some(c) if c.is_ascii_alphabetic() || c == '_')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

fn invalid(pattern: &str, reason: &str) -> Error {
    Error::custom(format!("invalid URI template '{pattern}': {reason}"))
}
