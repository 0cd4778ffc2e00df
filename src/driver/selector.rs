//! CSS selector subset understood by the in-memory document
//!
//! Supported: `*`, tag names, `#id`, `.class`, `[attr]`, `[attr=value]`,
//! compound selectors (`button.primary#go`) and the descendant (` `) and
//! child (`>`) combinators.

use std::iter::Peekable;
use std::str::Chars;

use crate::common::{Error, Result};

/// Read access to a tree, as needed for matching
pub trait SelectorTree {
    fn tag(&self, node: usize) -> &str;
    fn id(&self, node: usize) -> Option<&str>;
    fn has_class(&self, node: usize, class: &str) -> bool;
    fn attribute(&self, node: usize, name: &str) -> Option<&str>;
    fn parent(&self, node: usize) -> Option<usize>;
}

/// How a compound relates to the one before it
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Combinator {
    Descendant,
    Child,
}

/// One compound selector, e.g. `div.key[data-row=1]`
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Compound {
    pub tag: Option<String>,
    pub id: Option<String>,
    pub classes: Vec<String>,
    pub attributes: Vec<(String, Option<String>)>,
}

impl Compound {
    fn matches<T: SelectorTree>(&self, node: usize, tree: &T) -> bool {
        if let Some(tag) = &self.tag {
            if !tree.tag(node).eq_ignore_ascii_case(tag) {
                return false;
            }
        }
        if let Some(id) = &self.id {
            if tree.id(node) != Some(id.as_str()) {
                return false;
            }
        }
        if !self.classes.iter().all(|c| tree.has_class(node, c)) {
            return false;
        }
        self.attributes.iter().all(|(name, expected)| {
            match (tree.attribute(node, name), expected) {
                (Some(_), None) => true,
                (Some(actual), Some(expected)) => actual == expected,
                (None, _) => false,
            }
        })
    }
}

/// A parsed selector
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Selector {
    steps: Vec<(Combinator, Compound)>,
}

impl Selector {
    /// Parse a selector string
    pub fn parse(input: &str) -> Result<Self> {
        let mut chars = input.trim().chars().peekable();
        let mut steps = Vec::new();
        let mut combinator = Combinator::Descendant;

        loop {
            skip_whitespace(&mut chars);
            match chars.peek() {
                None => break,
                Some('>') => {
                    if steps.is_empty() || combinator == Combinator::Child {
                        return Err(Error::selector(input, "unexpected '>'"));
                    }
                    chars.next();
                    combinator = Combinator::Child;
                    continue;
                }
                Some(_) => {}
            }

            let compound = parse_compound(&mut chars, input)?;
            steps.push((combinator, compound));
            combinator = Combinator::Descendant;
        }

        if steps.is_empty() {
            return Err(Error::selector(input, "empty selector"));
        }
        if combinator == Combinator::Child {
            return Err(Error::selector(input, "dangling '>'"));
        }

        Ok(Self { steps })
    }

    /// Whether `node` matches this selector
    pub fn matches<T: SelectorTree>(&self, node: usize, tree: &T) -> bool {
        self.matches_step(self.steps.len() - 1, node, tree)
    }

    fn matches_step<T: SelectorTree>(&self, index: usize, node: usize, tree: &T) -> bool {
        let (combinator, compound) = &self.steps[index];
        if !compound.matches(node, tree) {
            return false;
        }
        if index == 0 {
            return true;
        }

        match combinator {
            Combinator::Child => tree
                .parent(node)
                .is_some_and(|p| self.matches_step(index - 1, p, tree)),
            Combinator::Descendant => {
                let mut ancestor = tree.parent(node);
                while let Some(p) = ancestor {
                    if self.matches_step(index - 1, p, tree) {
                        return true;
                    }
                    ancestor = tree.parent(p);
                }
                false
            }
        }
    }
}

fn skip_whitespace(chars: &mut Peekable<Chars<'_>>) {
    while chars.peek().is_some_and(|c| c.is_whitespace()) {
        chars.next();
    }
}

fn is_ident_char(c: char) -> bool {
    c.is_alphanumeric() || c == '-' || c == '_'
}

fn parse_ident(chars: &mut Peekable<Chars<'_>>, input: &str) -> Result<String> {
    let mut ident = String::new();
    while let Some(&c) = chars.peek() {
        if !is_ident_char(c) {
            break;
        }
        ident.push(c);
        chars.next();
    }
    if ident.is_empty() {
        return Err(Error::selector(input, "expected a name"));
    }
    Ok(ident)
}

fn parse_compound(chars: &mut Peekable<Chars<'_>>, input: &str) -> Result<Compound> {
    let mut compound = Compound::default();
    let mut seen = false;

    while let Some(&c) = chars.peek() {
        match c {
            '*' if !seen => {
                chars.next();
            }
            '#' => {
                chars.next();
                compound.id = Some(parse_ident(chars, input)?);
            }
            '.' => {
                chars.next();
                compound.classes.push(parse_ident(chars, input)?);
            }
            '[' => {
                chars.next();
                let mut body = String::new();
                loop {
                    match chars.next() {
                        Some(']') => break,
                        Some(c) => body.push(c),
                        None => return Err(Error::selector(input, "unterminated '['")),
                    }
                }
                compound.attributes.push(parse_attribute(&body, input)?);
            }
            c if is_ident_char(c) && !seen => {
                compound.tag = Some(parse_ident(chars, input)?.to_ascii_lowercase());
            }
            c if c.is_whitespace() || c == '>' => break,
            other => {
                return Err(Error::selector(
                    input,
                    &format!("unsupported character '{}'", other),
                ))
            }
        }
        seen = true;
    }

    if !seen {
        return Err(Error::selector(input, "expected a selector"));
    }
    Ok(compound)
}

fn parse_attribute(body: &str, input: &str) -> Result<(String, Option<String>)> {
    let (name, value) = match body.split_once('=') {
        Some((name, value)) => {
            let value = value.trim().trim_matches(|c| c == '"' || c == '\'');
            (name.trim(), Some(value.to_string()))
        }
        None => (body.trim(), None),
    };
    if name.is_empty() || !name.chars().all(is_ident_char) {
        return Err(Error::selector(input, "invalid attribute name"));
    }
    Ok((name.to_string(), value))
}
