//! A small CSS selector subset used to locate sections and break-sensitive nodes.
//!
//! Supported grammar:
//! - compound selectors: `tag`, `.class`, `*`, `tag.class.other`
//! - combinators: descendant (whitespace) and child (`>`)
//! - selector lists separated by commas
//!
//! Anything else (attribute selectors, pseudo-classes, sibling combinators) is rejected
//! with a `SelectorError` rather than silently matching nothing.

use thiserror::Error;

use crate::render::tree::{NodeId, RenderTree};

#[derive(Debug, Error, PartialEq)]
pub enum SelectorError {
    #[error("empty selector")]
    Empty,

    #[error("unsupported token '{token}' in selector '{selector}'")]
    Unsupported { selector: String, token: String },

    #[error("dangling combinator in selector '{0}'")]
    DanglingCombinator(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Combinator {
    Descendant,
    Child,
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct Compound {
    /// `None` means any tag (`*` or class-only compound).
    tag: Option<String>,
    classes: Vec<String>,
}

impl Compound {
    fn matches(&self, tree: &RenderTree, id: NodeId) -> bool {
        let node = tree.node(id);
        if let Some(tag) = &self.tag {
            if !node.tag.eq_ignore_ascii_case(tag) {
                return false;
            }
        }
        self.classes.iter().all(|c| node.has_class(c))
    }
}

/// One complex selector: compounds joined by combinators, stored left to right.
#[derive(Debug, Clone, PartialEq, Eq)]
struct Complex {
    /// `parts[0]` has no leading combinator; each later part records how it relates
    /// to the part before it.
    parts: Vec<(Combinator, Compound)>,
}

impl Complex {
    fn matches(&self, tree: &RenderTree, id: NodeId) -> bool {
        match self.parts.len() {
            0 => false,
            n => self.matches_from(tree, id, n - 1),
        }
    }

    /// Right-to-left matching with backtracking over descendant combinators.
    fn matches_from(&self, tree: &RenderTree, id: NodeId, index: usize) -> bool {
        let (combinator, compound) = &self.parts[index];
        if !compound.matches(tree, id) {
            return false;
        }
        if index == 0 {
            return true;
        }
        match combinator {
            Combinator::Child => tree
                .parent(id)
                .is_some_and(|parent| self.matches_from(tree, parent, index - 1)),
            Combinator::Descendant => {
                let mut current = tree.parent(id);
                while let Some(ancestor) = current {
                    if self.matches_from(tree, ancestor, index - 1) {
                        return true;
                    }
                    current = tree.parent(ancestor);
                }
                false
            }
        }
    }
}

/// A parsed selector list (`a, b > c, .d`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Selector {
    alternatives: Vec<Complex>,
}

impl Selector {
    pub fn parse(source: &str) -> Result<Self, SelectorError> {
        let alternatives = source
            .split(',')
            .map(|part| parse_complex(part, source))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self { alternatives })
    }

    /// True if the node matches any alternative in the list.
    pub fn matches(&self, tree: &RenderTree, id: NodeId) -> bool {
        self.alternatives.iter().any(|c| c.matches(tree, id))
    }
}

fn parse_complex(part: &str, source: &str) -> Result<Complex, SelectorError> {
    let spaced = part.replace('>', " > ");
    let mut parts = Vec::new();
    let mut pending = Combinator::Descendant;
    let mut saw_child = false;

    for token in spaced.split_whitespace() {
        if token == ">" {
            if parts.is_empty() || saw_child {
                return Err(SelectorError::DanglingCombinator(source.to_string()));
            }
            pending = Combinator::Child;
            saw_child = true;
            continue;
        }
        parts.push((pending, parse_compound(token, source)?));
        pending = Combinator::Descendant;
        saw_child = false;
    }

    if saw_child {
        return Err(SelectorError::DanglingCombinator(source.to_string()));
    }
    if parts.is_empty() {
        return Err(SelectorError::Empty);
    }
    Ok(Complex { parts })
}

fn parse_compound(token: &str, source: &str) -> Result<Compound, SelectorError> {
    let unsupported = || SelectorError::Unsupported {
        selector: source.to_string(),
        token: token.to_string(),
    };

    let mut segments = token.split('.');
    let head = segments.next().unwrap_or_default();
    let tag = match head {
        "" | "*" => None,
        t if t.chars().all(|c| c.is_ascii_alphanumeric() || c == '-') => Some(t.to_string()),
        _ => return Err(unsupported()),
    };

    let mut classes = Vec::new();
    for class in segments {
        if class.is_empty()
            || !class
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
        {
            return Err(unsupported());
        }
        classes.push(class.to_string());
    }

    if head.is_empty() && classes.is_empty() {
        return Err(unsupported());
    }
    Ok(Compound { tag, classes })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render::tree::RenderNodeSpec;

    fn make_tree() -> RenderTree {
        RenderTree::from_spec(&RenderNodeSpec::element(
            "div",
            "resume space-y-8",
            vec![
                RenderNodeSpec::element(
                    "div",
                    "experience-item",
                    vec![RenderNodeSpec::text("h3", "job-title", "Staff Engineer")],
                ),
                RenderNodeSpec::element(
                    "section",
                    "skills",
                    vec![RenderNodeSpec::element(
                        "div",
                        "",
                        vec![RenderNodeSpec::text("span", "skill-name", "Rust")],
                    )],
                ),
            ],
        ))
    }

    fn select(tree: &RenderTree, selector: &str) -> Vec<String> {
        let selector = Selector::parse(selector).unwrap();
        tree.descendants(tree.root())
            .into_iter()
            .filter(|id| selector.matches(tree, *id))
            .map(|id| tree.node(id).tag.clone())
            .collect()
    }

    #[test]
    fn test_class_and_tag_selectors() {
        let tree = make_tree();
        assert_eq!(select(&tree, ".experience-item"), vec!["div"]);
        assert_eq!(select(&tree, "h3"), vec!["h3"]);
        assert_eq!(select(&tree, "span.skill-name"), vec!["span"]);
        assert!(select(&tree, "span.job-title").is_empty());
    }

    #[test]
    fn test_child_combinator_only_matches_direct_children() {
        let tree = make_tree();
        // Direct div children of .space-y-8: only the experience item.
        assert_eq!(select(&tree, ".space-y-8 > div").len(), 1);
        // Descendant divs include the nested one under the skills section.
        assert_eq!(select(&tree, ".space-y-8 div").len(), 2);
    }

    #[test]
    fn test_selector_list_and_universal() {
        let tree = make_tree();
        assert_eq!(select(&tree, "h3, span").len(), 2);
        assert_eq!(select(&tree, "*").len(), tree.len());
    }

    #[test]
    fn test_rejects_unsupported_syntax() {
        assert!(matches!(
            Selector::parse("div[data-x]"),
            Err(SelectorError::Unsupported { .. })
        ));
        assert!(matches!(
            Selector::parse(".a >"),
            Err(SelectorError::DanglingCombinator(_))
        ));
        assert_eq!(Selector::parse("  "), Err(SelectorError::Empty));
    }
}
