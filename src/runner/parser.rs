//! Command parsing
//!
//! A script line looks like a function call: `name(arg1,arg2)`. The name is
//! everything before the first `(`, the arguments everything up to the first
//! `)`, split on `,`. Commas and parentheses inside arguments cannot be
//! escaped.

use std::fmt;

use crate::common::{Error, Result};

/// A parsed script command
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Command {
    pub name: String,
    pub args: Vec<String>,
}

impl Command {
    pub fn new<I, S>(name: &str, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            name: name.to_string(),
            args: args.into_iter().map(Into::into).collect(),
        }
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}({})", self.name, self.args.join(","))
    }
}

/// Parse one script line into a command
pub fn parse(text: &str) -> Result<Command> {
    let (name, args) = match text.split_once('(') {
        Some((name, rest)) => {
            let inner = rest.split(')').next().unwrap_or_default();
            let args = if inner.trim().is_empty() {
                Vec::new()
            } else {
                inner.split(',').map(|a| a.trim().to_string()).collect()
            };
            (name, args)
        }
        None => (text, Vec::new()),
    };

    let name = name.trim();
    if name.is_empty() {
        return Err(Error::Parse(format!("missing command name in '{}'", text)));
    }

    Ok(Command {
        name: name.to_string(),
        args,
    })
}
