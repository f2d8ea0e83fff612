//! Rendered page model for the fake ERP
//!
//! A page is a tree of [`Node`]s rebuilt from application state on every
//! query. Elements are addressed by their child-index path, which stays
//! stable as long as nothing before them is inserted or removed.
//!
//! Selector support covers what the engine's configuration uses: tag,
//! `.class`, `[attr]`, `[attr='value']`, `:scope`, and the descendant and
//! child (`>`) combinators.

use std::collections::BTreeMap;

use bomwalk_engine::{Error, Result};

use crate::fake::{Action, Field};

/// One rendered element
#[derive(Debug, Clone, Default)]
pub struct Node {
    pub tag: String,
    pub attrs: BTreeMap<String, String>,
    pub text: String,
    pub children: Vec<Node>,
    pub enabled: bool,
    pub on_click: Option<Action>,
    pub on_double_click: Option<Action>,
    /// Set for inputs accepting `set_value` and key presses
    pub field: Option<Field>,
}

impl Node {
    pub fn new(tag: &str) -> Self {
        Self {
            tag: tag.to_string(),
            enabled: true,
            ..Default::default()
        }
    }

    pub fn attr(mut self, name: &str, value: impl Into<String>) -> Self {
        self.attrs.insert(name.to_string(), value.into());
        self
    }

    pub fn class(self, class: &str) -> Self {
        self.attr("class", class)
    }

    pub fn text(mut self, text: impl Into<String>) -> Self {
        self.text = text.into();
        self
    }

    pub fn child(mut self, child: Node) -> Self {
        self.children.push(child);
        self
    }

    pub fn children(mut self, children: impl IntoIterator<Item = Node>) -> Self {
        self.children.extend(children);
        self
    }

    pub fn on_click(mut self, action: Action) -> Self {
        self.on_click = Some(action);
        self
    }

    pub fn on_double_click(mut self, action: Action) -> Self {
        self.on_double_click = Some(action);
        self
    }

    pub fn field(mut self, field: Field, value: &str) -> Self {
        self.field = Some(field);
        self.attr("value", value)
    }

    pub fn enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    fn has_class(&self, class: &str) -> bool {
        self.attrs
            .get("class")
            .is_some_and(|c| c.split_whitespace().any(|c| c == class))
    }

    /// Own text followed by the text of every descendant
    pub fn text_content(&self) -> String {
        let mut out = self.text.clone();
        for child in &self.children {
            out.push_str(&child.text_content());
        }
        out
    }
}

/// A node in document order with its parent and path
pub struct Flat<'a> {
    pub node: &'a Node,
    pub parent: Option<usize>,
    pub path: String,
}

/// Flatten a tree into document order; the root sits at index 0
pub fn flatten(root: &Node) -> Vec<Flat<'_>> {
    fn visit<'a>(node: &'a Node, parent: Option<usize>, path: String, out: &mut Vec<Flat<'a>>) {
        let index = out.len();
        out.push(Flat {
            node,
            parent,
            path: path.clone(),
        });
        for (i, child) in node.children.iter().enumerate() {
            visit(child, Some(index), format!("{}/{}", path, i), out);
        }
    }

    let mut out = Vec::new();
    visit(root, None, "0".to_string(), &mut out);
    out
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Combinator {
    Descendant,
    Child,
}

#[derive(Debug, Clone, Default)]
struct Compound {
    scope: bool,
    tag: Option<String>,
    classes: Vec<String>,
    attrs: Vec<(String, Option<String>)>,
}

impl Compound {
    fn is_empty(&self) -> bool {
        !self.scope && self.tag.is_none() && self.classes.is_empty() && self.attrs.is_empty()
    }
}

/// A parsed selector: compounds joined by combinators, left to right
#[derive(Debug, Clone)]
pub struct Selector {
    parts: Vec<(Combinator, Compound)>,
}

fn is_ident(c: char) -> bool {
    c.is_alphanumeric() || c == '-' || c == '_'
}

impl Selector {
    pub fn parse(selector: &str) -> Result<Self> {
        let unsupported = || Error::Dom(format!("unsupported selector '{}'", selector));
        let chars: Vec<char> = selector.chars().collect();
        let mut i = 0;
        let mut parts = Vec::new();
        let mut combinator = Combinator::Descendant;
        let mut current = Compound::default();

        let read_ident = |i: &mut usize| {
            let start = *i;
            while *i < chars.len() && is_ident(chars[*i]) {
                *i += 1;
            }
            chars[start..*i].iter().collect::<String>()
        };

        while i < chars.len() {
            let c = chars[i];
            match c {
                ' ' | '\t' | '\n' | '>' => {
                    if !current.is_empty() {
                        parts.push((combinator, std::mem::take(&mut current)));
                        combinator = Combinator::Descendant;
                    }
                    if c == '>' {
                        combinator = Combinator::Child;
                    }
                    i += 1;
                }
                '.' => {
                    i += 1;
                    let class = read_ident(&mut i);
                    if class.is_empty() {
                        return Err(unsupported());
                    }
                    current.classes.push(class);
                }
                ':' => {
                    i += 1;
                    if read_ident(&mut i) != "scope" {
                        return Err(unsupported());
                    }
                    current.scope = true;
                }
                '[' => {
                    i += 1;
                    let name = read_ident(&mut i);
                    let value = match chars.get(i).copied() {
                        Some(']') => None,
                        Some('=') => {
                            i += 1;
                            let value = match chars.get(i).copied() {
                                Some(q) if q == '\'' || q == '"' => {
                                    i += 1;
                                    let start = i;
                                    while i < chars.len() && chars[i] != q {
                                        i += 1;
                                    }
                                    let value: String = chars[start..i].iter().collect();
                                    i += 1;
                                    value
                                }
                                _ => {
                                    let start = i;
                                    while i < chars.len() && chars[i] != ']' {
                                        i += 1;
                                    }
                                    chars[start..i].iter().collect()
                                }
                            };
                            Some(value)
                        }
                        _ => return Err(unsupported()),
                    };
                    if name.is_empty() || chars.get(i) != Some(&']') {
                        return Err(unsupported());
                    }
                    i += 1;
                    current.attrs.push((name, value));
                }
                '*' => {
                    i += 1;
                    current.tag = Some("*".to_string());
                }
                c if is_ident(c) => {
                    current.tag = Some(read_ident(&mut i));
                }
                _ => return Err(unsupported()),
            }
        }

        if !current.is_empty() {
            parts.push((combinator, current));
        }
        if parts.is_empty() {
            return Err(unsupported());
        }
        Ok(Self { parts })
    }

    /// Indices of the descendants of `scope` matching this selector
    pub fn query(&self, flat: &[Flat<'_>], scope: usize) -> Vec<usize> {
        (scope + 1..flat.len())
            .filter(|&i| is_descendant(flat, i, scope))
            .filter(|&i| matches(flat, i, &self.parts, scope))
            .collect()
    }
}

fn is_descendant(flat: &[Flat<'_>], mut index: usize, ancestor: usize) -> bool {
    while let Some(parent) = flat[index].parent {
        if parent == ancestor {
            return true;
        }
        index = parent;
    }
    false
}

fn compound_matches(flat: &[Flat<'_>], index: usize, compound: &Compound, scope: usize) -> bool {
    let node = flat[index].node;

    if compound.scope && index != scope {
        return false;
    }
    if let Some(tag) = &compound.tag {
        if tag != "*" && !tag.eq_ignore_ascii_case(&node.tag) {
            return false;
        }
    }
    if !compound.classes.iter().all(|c| node.has_class(c)) {
        return false;
    }
    compound.attrs.iter().all(|(name, value)| match value {
        Some(value) => node.attrs.get(name) == Some(value),
        None => node.attrs.contains_key(name),
    })
}

fn matches(
    flat: &[Flat<'_>],
    index: usize,
    parts: &[(Combinator, Compound)],
    scope: usize,
) -> bool {
    let Some(((combinator, last), rest)) = parts.split_last() else {
        return true;
    };
    if !compound_matches(flat, index, last, scope) {
        return false;
    }
    if rest.is_empty() {
        return true;
    }

    match combinator {
        Combinator::Child => flat[index]
            .parent
            .is_some_and(|p| matches(flat, p, rest, scope)),
        Combinator::Descendant => {
            let mut current = flat[index].parent;
            while let Some(p) = current {
                if matches(flat, p, rest, scope) {
                    return true;
                }
                current = flat[p].parent;
            }
            false
        }
    }
}
