//! Declarative matching rules.
//!
//! A [`Rule`] pairs CSS selectors with the element kind they describe, where
//! the direction hint goes ([`ResolveTarget`]) and which text decides it
//! ([`ResolveText`]). A [`RuleSet`] is ordered: the first rule whose
//! selectors accept an element owns it.

use std::collections::HashSet;
use std::fmt;
use std::path::Path;
use std::rc::Rc;

use jira_rtl_config::EngineConfig;
use jira_rtl_dom::{Document, NodeId, Selector};
use serde::Deserialize;
use tracing::debug;

use crate::error::RuleError;
use crate::rule_file;

/// Descendants skipped by [`ResolveText::TreeWalker`] unless a rule says
/// otherwise.
pub const DEFAULT_TREE_WALKER_EXCLUDE: &str = "pre, code";

/// How matched elements are handled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ElementKind {
    /// Static text, re-evaluated when the element is (re-)inserted.
    Text,
    /// Form control, re-evaluated on every `input` event.
    Input,
    /// Rich text editor, re-evaluated on every text change inside it.
    ContentEditable,
}

pub type TargetFn = Rc<dyn Fn(&Document, NodeId) -> Option<NodeId>>;
pub type TextFn = Rc<dyn Fn(&Document, NodeId) -> Option<String>>;

/// Element that receives the direction marker, relative to the match.
#[derive(Clone)]
pub enum ResolveTarget {
    SelfElement,
    Parent,
    /// Nearest inclusive ancestor matching the selector.
    Closest(Selector),
    Custom(TargetFn),
}

impl ResolveTarget {
    pub fn closest(selector: &str) -> Result<Self, RuleError> {
        Ok(ResolveTarget::Closest(Selector::parse(selector)?))
    }

    pub fn custom(f: impl Fn(&Document, NodeId) -> Option<NodeId> + 'static) -> Self {
        ResolveTarget::Custom(Rc::new(f))
    }

    /// `None` means no annotation for this element right now.
    pub fn resolve(&self, doc: &Document, element: NodeId) -> Option<NodeId> {
        if !doc.is_element(element) {
            return None;
        }
        match self {
            ResolveTarget::SelfElement => Some(element),
            ResolveTarget::Parent => doc.parent_element(element),
            ResolveTarget::Closest(selector) => doc.closest(element, selector),
            ResolveTarget::Custom(f) => f(doc, element),
        }
    }
}

impl fmt::Debug for ResolveTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResolveTarget::SelfElement => f.write_str("SelfElement"),
            ResolveTarget::Parent => f.write_str("Parent"),
            ResolveTarget::Closest(selector) => f.debug_tuple("Closest").field(selector).finish(),
            ResolveTarget::Custom(_) => f.write_str("Custom(..)"),
        }
    }
}

/// Text examined to decide the direction of a target.
#[derive(Clone)]
pub enum ResolveText {
    /// Every descendant text node, hidden ones included.
    TextContent,
    /// Current value of a form control.
    Value,
    /// Descendant text nodes, skipping any inside an element matching
    /// `exclude`.
    TreeWalker { exclude: Selector },
    Custom(TextFn),
}

impl ResolveText {
    pub fn tree_walker(exclude: &str) -> Result<Self, RuleError> {
        Ok(ResolveText::TreeWalker {
            exclude: Selector::parse(exclude)?,
        })
    }

    pub fn custom(f: impl Fn(&Document, NodeId) -> Option<String> + 'static) -> Self {
        ResolveText::Custom(Rc::new(f))
    }

    /// Text strategy used when a rule does not name one.
    pub fn default_for(kind: ElementKind, exclude: &Selector) -> Self {
        match kind {
            ElementKind::Text => ResolveText::TextContent,
            ElementKind::Input => ResolveText::Value,
            ElementKind::ContentEditable => ResolveText::TreeWalker {
                exclude: exclude.clone(),
            },
        }
    }

    pub fn resolve(&self, doc: &Document, element: NodeId) -> Option<String> {
        match self {
            ResolveText::TextContent => doc.text_content(element),
            ResolveText::Value => doc.value(element).map(str::to_string),
            ResolveText::TreeWalker { exclude } => tree_walker_text(doc, element, exclude),
            ResolveText::Custom(f) => f(doc, element),
        }
    }
}

impl fmt::Debug for ResolveText {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResolveText::TextContent => f.write_str("TextContent"),
            ResolveText::Value => f.write_str("Value"),
            ResolveText::TreeWalker { exclude } => f
                .debug_struct("TreeWalker")
                .field("exclude", exclude)
                .finish(),
            ResolveText::Custom(_) => f.write_str("Custom(..)"),
        }
    }
}

/// Concatenate the text nodes under `root` in tree order, dropping every
/// text node that has an excluded element between itself and `root`.
fn tree_walker_text(doc: &Document, root: NodeId, exclude: &Selector) -> Option<String> {
    if !doc.is_element(root) {
        return None;
    }
    let excluded: HashSet<NodeId> = doc.query_selector_all(root, exclude).into_iter().collect();
    let mut out = String::new();
    for node in doc.descendants(root) {
        let Some(text) = doc.text(node) else {
            continue;
        };
        let hidden = doc
            .ancestors(node)
            .take_while(|ancestor| *ancestor != root)
            .any(|ancestor| excluded.contains(&ancestor));
        if !hidden {
            out.push_str(text);
        }
    }
    Some(out)
}

/// One matching rule.
#[derive(Debug, Clone)]
pub struct Rule {
    selectors: Vec<String>,
    compiled: Selector,
    kind: ElementKind,
    target: ResolveTarget,
    text: ResolveText,
}

impl Rule {
    /// Rule targeting the matched element itself, with the text strategy
    /// usual for `kind`.
    pub fn new<I, S>(kind: ElementKind, selectors: I) -> Result<Self, RuleError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let selectors: Vec<String> = selectors.into_iter().map(Into::into).collect();
        if selectors.is_empty() {
            return Err(RuleError::EmptyPatterns);
        }
        for source in &selectors {
            Selector::parse(source)?;
        }
        let compiled = Selector::union(&selectors)?;
        let exclude = Selector::parse(DEFAULT_TREE_WALKER_EXCLUDE)?;
        Ok(Self {
            selectors,
            compiled,
            kind,
            target: ResolveTarget::SelfElement,
            text: ResolveText::default_for(kind, &exclude),
        })
    }

    pub fn with_target(mut self, target: ResolveTarget) -> Self {
        self.target = target;
        self
    }

    pub fn with_text(mut self, text: ResolveText) -> Self {
        self.text = text;
        self
    }

    pub fn selectors(&self) -> &[String] {
        &self.selectors
    }

    pub fn compiled_match(&self) -> &Selector {
        &self.compiled
    }

    pub fn kind(&self) -> ElementKind {
        self.kind
    }

    pub fn target(&self) -> &ResolveTarget {
        &self.target
    }

    pub fn text(&self) -> &ResolveText {
        &self.text
    }

    pub fn matches(&self, doc: &Document, element: NodeId) -> bool {
        doc.matches(element, &self.compiled)
    }

    /// Resolve the target and its text in one go.
    pub fn resolve(&self, doc: &Document, element: NodeId) -> (Option<NodeId>, Option<String>) {
        let target = self.target.resolve(doc, element);
        let text = target.and_then(|t| self.text.resolve(doc, t));
        (target, text)
    }
}

/// Ordered rules plus the union of all their selectors.
#[derive(Debug, Clone)]
pub struct RuleSet {
    rules: Vec<Rule>,
    combined: Selector,
}

impl RuleSet {
    pub fn new(rules: Vec<Rule>) -> Result<Self, RuleError> {
        if rules.is_empty() {
            return Err(RuleError::EmptyRuleSet);
        }
        let combined = Selector::union(rules.iter().flat_map(|r| r.selectors.iter()))?;
        debug!(
            rules = rules.len(),
            selectors = rules.iter().map(|r| r.selectors.len()).sum::<usize>(),
            "rule set compiled"
        );
        Ok(Self { rules, combined })
    }

    /// Built-in rules for Jira Cloud.
    pub fn jira_default() -> Result<Self, RuleError> {
        Self::from_toml(rule_file::JIRA_RULES)
    }

    pub fn from_toml(source: &str) -> Result<Self, RuleError> {
        Self::from_toml_with_exclude(source, DEFAULT_TREE_WALKER_EXCLUDE)
    }

    /// Parse a rule file; tree-walker rules without their own exclusions
    /// skip `default_exclude`.
    pub fn from_toml_with_exclude(source: &str, default_exclude: &str) -> Result<Self, RuleError> {
        rule_file::parse(source, default_exclude)
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, RuleError> {
        Self::from_file_with_exclude(path, DEFAULT_TREE_WALKER_EXCLUDE)
    }

    fn from_file_with_exclude(
        path: impl AsRef<Path>,
        default_exclude: &str,
    ) -> Result<Self, RuleError> {
        let path = path.as_ref();
        let source = std::fs::read_to_string(path).map_err(|source| RuleError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_with_exclude(&source, default_exclude)
    }

    /// The configured rule file, or the built-in rules.
    pub fn from_config(config: &EngineConfig) -> Result<Self, RuleError> {
        match &config.rules_path {
            Some(path) => Self::from_file_with_exclude(path, &config.tree_walker_exclude),
            None => {
                Self::from_toml_with_exclude(rule_file::JIRA_RULES, &config.tree_walker_exclude)
            }
        }
    }

    pub fn rules(&self) -> &[Rule] {
        &self.rules
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// Union of every rule's selectors.
    pub fn combined_selector(&self) -> &Selector {
        &self.combined
    }

    pub fn matches_any(&self, doc: &Document, element: NodeId) -> bool {
        doc.matches(element, &self.combined)
    }

    pub fn first_matching_rule(&self, doc: &Document, element: NodeId) -> Option<&Rule> {
        self.rules.iter().find(|rule| rule.matches(doc, element))
    }

    pub fn first_matching_rule_of_kind(
        &self,
        doc: &Document,
        element: NodeId,
        kind: ElementKind,
    ) -> Option<&Rule> {
        self.rules
            .iter()
            .find(|rule| rule.kind == kind && rule.matches(doc, element))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sel(s: &str) -> Selector {
        Selector::parse(s).unwrap()
    }

    fn first(doc: &Document, s: &str) -> NodeId {
        doc.query_selector(doc.root(), &sel(s)).unwrap()
    }

    #[test]
    fn empty_inputs_are_rejected() {
        assert!(matches!(
            Rule::new(ElementKind::Text, Vec::<String>::new()),
            Err(RuleError::EmptyPatterns)
        ));
        assert!(matches!(RuleSet::new(Vec::new()), Err(RuleError::EmptyRuleSet)));
        assert!(matches!(
            Rule::new(ElementKind::Text, [".ok", "div[["]),
            Err(RuleError::InvalidSelector(_))
        ));
    }

    #[test]
    fn first_rule_wins_in_order() {
        let doc = Document::parse_html(r#"<p class="a b">x</p>"#);
        let p = first(&doc, "p");
        let set = RuleSet::new(vec![
            Rule::new(ElementKind::Input, [".b"]).unwrap(),
            Rule::new(ElementKind::Text, [".a"]).unwrap(),
        ])
        .unwrap();
        assert!(set.matches_any(&doc, p));
        assert_eq!(set.first_matching_rule(&doc, p).unwrap().kind(), ElementKind::Input);
        assert_eq!(
            set.first_matching_rule_of_kind(&doc, p, ElementKind::Text)
                .unwrap()
                .selectors()
                .to_vec(),
            vec![".a".to_string()]
        );
        assert_eq!(set.combined_selector().as_str(), ".b, .a");
    }

    #[test]
    fn target_strategies() {
        let doc = Document::parse_html(
            r#"<section class="group"><div class="cell"><span class="hit">x</span></div></section>"#,
        );
        let span = first(&doc, ".hit");
        assert_eq!(ResolveTarget::SelfElement.resolve(&doc, span), Some(span));
        assert_eq!(ResolveTarget::Parent.resolve(&doc, span), Some(first(&doc, ".cell")));
        assert_eq!(
            ResolveTarget::closest(".group").unwrap().resolve(&doc, span),
            Some(first(&doc, "section"))
        );
        assert_eq!(ResolveTarget::closest(".missing").unwrap().resolve(&doc, span), None);
        let custom = ResolveTarget::custom(|doc, el| doc.parent_element(el));
        assert_eq!(custom.resolve(&doc, span), Some(first(&doc, ".cell")));
    }

    #[test]
    fn tree_walker_skips_excluded_descendants() {
        let doc = Document::parse_html(
            r#"<div id="ed">שלום <code>let x</code><span>text <pre>raw</pre>end</span></div>"#,
        );
        let ed = first(&doc, "#ed");
        let walker = ResolveText::tree_walker(DEFAULT_TREE_WALKER_EXCLUDE).unwrap();
        assert_eq!(walker.resolve(&doc, ed).as_deref(), Some("שלום text end"));
        assert_eq!(
            ResolveText::TextContent.resolve(&doc, ed).as_deref(),
            Some("שלום let xtext rawend")
        );
    }

    #[test]
    fn tree_walker_root_inside_excluded_element_still_reads() {
        let doc = Document::parse_html(r#"<pre><div id="ed">abc</div></pre>"#);
        let ed = first(&doc, "#ed");
        let walker = ResolveText::tree_walker("pre").unwrap();
        assert_eq!(walker.resolve(&doc, ed).as_deref(), Some("abc"));
    }

    #[test]
    fn default_text_follows_kind() {
        let input = Rule::new(ElementKind::Input, ["input"]).unwrap();
        assert!(matches!(input.text(), ResolveText::Value));
        let editor = Rule::new(ElementKind::ContentEditable, ["[contenteditable]"]).unwrap();
        assert!(matches!(editor.text(), ResolveText::TreeWalker { .. }));
        let text = Rule::new(ElementKind::Text, ["p"]).unwrap();
        assert!(matches!(text.text(), ResolveText::TextContent));
        assert!(matches!(text.target(), ResolveTarget::SelfElement));
    }

    #[test]
    fn resolve_without_target_has_no_text() {
        let doc = Document::parse_html("<p>שלום</p>");
        let p = first(&doc, "p");
        let rule = Rule::new(ElementKind::Text, ["p"])
            .unwrap()
            .with_target(ResolveTarget::closest(".nowhere").unwrap());
        assert_eq!(rule.resolve(&doc, p), (None, None));
    }
}
