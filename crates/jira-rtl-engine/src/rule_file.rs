//! TOML rule files.
//!
//! ```toml
//! [[rule]]
//! kind = "text"
//! selectors = [".ak-renderer-document p"]
//! target = { closest = "[data-testid=\"row\"]" }   # or "self" / "parent"
//! text = "text_content"                             # or "value" / { tree_walker = { exclude = "pre" } }
//! ```

use jira_rtl_dom::Selector;
use serde::Deserialize;

use crate::error::RuleError;
use crate::rules::{ElementKind, ResolveTarget, ResolveText, Rule, RuleSet};

/// Rules for Jira Cloud shipped with the crate.
pub(crate) const JIRA_RULES: &str = include_str!("../rules/jira.toml");

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RuleFile {
    #[serde(default, rename = "rule")]
    rules: Vec<RuleEntry>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RuleEntry {
    kind: ElementKind,
    selectors: Vec<String>,
    #[serde(default)]
    target: Option<TargetEntry>,
    #[serde(default)]
    text: Option<TextEntry>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "snake_case")]
enum TargetEntry {
    #[serde(rename = "self")]
    SelfElement,
    Parent,
    Closest(String),
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "snake_case")]
enum TextEntry {
    TextContent,
    Value,
    TreeWalker {
        #[serde(default)]
        exclude: Option<String>,
    },
}

pub(crate) fn parse(source: &str, default_exclude: &str) -> Result<RuleSet, RuleError> {
    let file: RuleFile = toml::from_str(source)?;
    let default_exclude = Selector::parse(default_exclude)?;
    let rules = file
        .rules
        .into_iter()
        .enumerate()
        .map(|(index, entry)| {
            build_rule(entry, &default_exclude).map_err(|source| RuleError::InRule {
                index,
                source: Box::new(source),
            })
        })
        .collect::<Result<Vec<_>, _>>()?;
    RuleSet::new(rules)
}

fn build_rule(entry: RuleEntry, default_exclude: &Selector) -> Result<Rule, RuleError> {
    let kind = entry.kind;
    let target = match entry.target {
        None | Some(TargetEntry::SelfElement) => ResolveTarget::SelfElement,
        Some(TargetEntry::Parent) => ResolveTarget::Parent,
        Some(TargetEntry::Closest(selector)) => ResolveTarget::closest(&selector)?,
    };
    let text = match entry.text {
        None => ResolveText::default_for(kind, default_exclude),
        Some(TextEntry::TextContent) => ResolveText::TextContent,
        Some(TextEntry::Value) => ResolveText::Value,
        Some(TextEntry::TreeWalker { exclude: None }) => ResolveText::TreeWalker {
            exclude: default_exclude.clone(),
        },
        Some(TextEntry::TreeWalker {
            exclude: Some(exclude),
        }) => ResolveText::tree_walker(&exclude)?,
    };
    Ok(Rule::new(kind, entry.selectors)?
        .with_target(target)
        .with_text(text))
}

#[cfg(test)]
mod tests {
    use super::*;
    use jira_rtl_dom::Document;

    #[test]
    fn defaults_follow_kind() {
        let set = parse(
            r#"
            [[rule]]
            kind = "text"
            selectors = ["p"]

            [[rule]]
            kind = "input"
            selectors = ["input", "textarea"]

            [[rule]]
            kind = "content_editable"
            selectors = ["[contenteditable]"]
            "#,
            "pre",
        )
        .unwrap();
        let rules = set.rules();
        assert!(matches!(rules[0].text(), ResolveText::TextContent));
        assert!(matches!(rules[1].text(), ResolveText::Value));
        match rules[2].text() {
            ResolveText::TreeWalker { exclude } => assert_eq!(exclude.as_str(), "pre"),
            other => panic!("unexpected {other:?}"),
        }
        assert_eq!(set.combined_selector().as_str(), "p, input, textarea, [contenteditable]");
    }

    #[test]
    fn explicit_strategies() {
        let set = parse(
            r##"
            [[rule]]
            kind = "text"
            selectors = [".title"]
            target = { closest = ".row" }

            [[rule]]
            kind = "content_editable"
            selectors = ["#editor"]
            target = "parent"
            text = { tree_walker = { exclude = "blockquote" } }
            "##,
            "pre, code",
        )
        .unwrap();
        let doc = Document::parse_html(
            r#"<div class="row"><span class="title">x</span></div><section><div id="editor"></div></section>"#,
        );
        let title = doc
            .query_selector(doc.root(), &Selector::parse(".title").unwrap())
            .unwrap();
        let row = doc.parent_element(title);
        assert_eq!(set.rules()[0].target().resolve(&doc, title), row);
        assert!(matches!(set.rules()[1].target(), ResolveTarget::Parent));
        match set.rules()[1].text() {
            ResolveText::TreeWalker { exclude } => assert_eq!(exclude.as_str(), "blockquote"),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn errors_name_the_offending_rule() {
        let err = parse(
            r#"
            [[rule]]
            kind = "text"
            selectors = ["p"]

            [[rule]]
            kind = "text"
            selectors = []
            "#,
            "pre",
        )
        .unwrap_err();
        match err {
            RuleError::InRule { index, source } => {
                assert_eq!(index, 1);
                assert!(matches!(*source, RuleError::EmptyPatterns));
            }
            other => panic!("unexpected {other:?}"),
        }

        let err = parse(
            "[[rule]]\nkind = \"text\"\nselectors = [\"p\"]\ntarget = { closest = \"::\" }\n",
            "pre",
        )
        .unwrap_err();
        assert!(matches!(err, RuleError::InRule { index: 0, .. }));
    }

    #[test]
    fn malformed_files_are_rejected() {
        assert!(matches!(parse("", "pre"), Err(RuleError::EmptyRuleSet)));
        assert!(matches!(
            parse("[[rule]]\nkind = \"marquee\"\nselectors = [\"p\"]\n", "pre"),
            Err(RuleError::Parse(_))
        ));
        assert!(matches!(
            parse("[[rule]]\nkind = \"text\"\nselector = [\"p\"]\n", "pre"),
            Err(RuleError::Parse(_))
        ));
    }

    #[test]
    fn builtin_rules_compile() {
        let set = parse(JIRA_RULES, "pre, code").unwrap();
        assert_eq!(set.len(), 12);
        let kinds: Vec<_> = set.rules().iter().map(|r| r.kind()).collect();
        assert_eq!(kinds[10], ElementKind::ContentEditable);
        assert_eq!(kinds[11], ElementKind::Input);
        assert!(kinds[..10].iter().all(|k| *k == ElementKind::Text));
    }
}
