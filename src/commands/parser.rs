//! Command-line grammar: `/<name> [arg ...] [--key=value ...]`.

use std::collections::BTreeMap;

use crate::core::error::AgentError;

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Token {
    pub text: String,
    /// Began with a quote, so it can never be read as an option.
    pub starts_quoted: bool,
    /// Byte offset just past the token in the source text.
    pub end: usize,
}

/// Split on whitespace, keeping single- or double-quoted segments together.
pub(crate) fn tokenize(input: &str) -> Result<Vec<Token>, String> {
    let mut tokens = Vec::new();
    let mut current = String::new();
    let mut in_token = false;
    let mut starts_quoted = false;
    let mut in_quote: Option<char> = None;

    for (offset, ch) in input.char_indices() {
        match ch {
            '"' | '\'' => {
                if let Some(q) = in_quote {
                    if q == ch {
                        in_quote = None;
                    } else {
                        current.push(ch);
                    }
                } else {
                    if !in_token {
                        starts_quoted = true;
                    }
                    in_quote = Some(ch);
                }
                in_token = true;
            }
            c if c.is_whitespace() && in_quote.is_none() => {
                if in_token {
                    tokens.push(Token {
                        text: std::mem::take(&mut current),
                        starts_quoted,
                        end: offset,
                    });
                    in_token = false;
                    starts_quoted = false;
                }
            }
            _ => {
                current.push(ch);
                in_token = true;
            }
        }
    }
    if let Some(q) = in_quote {
        return Err(format!("Unclosed quote ({q}) in command arguments."));
    }
    if in_token {
        tokens.push(Token {
            text: current,
            starts_quoted,
            end: input.len(),
        });
    }
    Ok(tokens)
}

/// Split `/name rest` into the name and the untouched remainder.
pub fn split_command(line: &str) -> Result<(&str, &str), AgentError> {
    let trimmed = line.trim();
    let Some(body) = trimmed.strip_prefix('/') else {
        return Err(AgentError::Unrecognized(trimmed.to_string()));
    };
    let (name, rest) = match body.find(char::is_whitespace) {
        Some(at) => (&body[..at], body[at..].trim()),
        None => (body, ""),
    };
    if name.is_empty() {
        return Err(AgentError::Unrecognized(trimmed.to_string()));
    }
    Ok((name, rest))
}

fn as_option(token: &Token) -> Option<(String, String)> {
    if token.starts_quoted {
        return None;
    }
    let body = token.text.strip_prefix("--")?;
    let (key, value) = body.split_once('=')?;
    if key.is_empty() {
        return None;
    }
    Some((key.to_string(), value.to_string()))
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParsedCommand {
    /// Lowercased command name without the slash.
    pub name: String,
    pub args: Vec<String>,
    pub options: BTreeMap<String, String>,
    /// Everything after the name, verbatim.
    pub raw_args: String,
    tokens: Vec<Token>,
}

impl ParsedCommand {
    /// Parse a full line. With `extract_options`, unquoted `--key=value`
    /// tokens go to `options`; otherwise they stay positional.
    pub fn parse(line: &str, extract_options: bool) -> Result<Self, AgentError> {
        let (name, rest) = split_command(line)?;
        let tokens = tokenize(rest).map_err(AgentError::Unrecognized)?;

        let mut args = Vec::new();
        let mut options = BTreeMap::new();
        for token in &tokens {
            match as_option(token).filter(|_| extract_options) {
                Some((key, value)) => {
                    options.insert(key, value);
                }
                None => args.push(token.text.clone()),
            }
        }

        Ok(Self {
            name: name.to_lowercase(),
            args,
            options,
            raw_args: rest.to_string(),
            tokens,
        })
    }

    pub fn arg(&self, index: usize) -> Option<&str> {
        self.args.get(index).map(String::as_str)
    }

    /// Raw text after the first `skip` tokens, untouched by unquoting.
    pub fn raw_after(&self, skip: usize) -> &str {
        match skip {
            0 => self.raw_args.as_str(),
            n => match self.tokens.get(n - 1) {
                Some(token) => self.raw_args[token.end..].trim(),
                None => "",
            },
        }
    }

    /// Rebuild a line that parses back to the same name, args and options.
    pub fn to_line(&self) -> String {
        let mut line = format!("/{}", self.name);
        for arg in &self.args {
            line.push(' ');
            line.push_str(&quote(arg, true));
        }
        for (key, value) in &self.options {
            line.push_str(&format!(" --{key}={}", quote(value, false)));
        }
        line
    }

    #[cfg(test)]
    pub(crate) fn from_parts(name: &str, args: &[&str], options: &[(&str, &str)]) -> Self {
        Self {
            name: name.to_string(),
            args: args.iter().map(|arg| arg.to_string()).collect(),
            options: options
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
            ..Self::default()
        }
    }
}

fn quote(value: &str, positional: bool) -> String {
    let looks_like_option = positional && value.starts_with("--") && value.contains('=');
    let needs_quotes = value.is_empty()
        || looks_like_option
        || value.chars().any(|c| c.is_whitespace() || c == '"' || c == '\'');
    if !needs_quotes {
        value.to_string()
    } else if !value.contains('"') {
        format!("\"{value}\"")
    } else if !value.contains('\'') {
        format!("'{value}'")
    } else {
        quote_segments(value)
    }
}

/// Quote a value holding both quote characters as adjacent segments, which
/// the tokenizer joins back into one token.
fn quote_segments(value: &str) -> String {
    let mut out = String::with_capacity(value.len() + 4);
    let mut open: Option<char> = None;
    for ch in value.chars() {
        let wanted = match ch {
            '"' => '\'',
            '\'' => '"',
            _ => open.unwrap_or('"'),
        };
        if open != Some(wanted) {
            if let Some(q) = open {
                out.push(q);
            }
            out.push(wanted);
            open = Some(wanted);
        }
        out.push(ch);
    }
    if let Some(q) = open {
        out.push(q);
    }
    out
}
