//! Compiled CSS selectors backed by Servo's `selectors` crate.

use std::fmt;

use cssparser::{CssStringWriter, Parser as CssParser, ParserInput, ToCss, serialize_identifier};
use selectors::NthIndexCache;
use selectors::{
    context::QuirksMode,
    matching::{
        IgnoreNthChildForInvalidation, MatchingContext, MatchingMode, NeedsSelectorFlags,
        matches_selector_list,
    },
    parser::{
        ParseRelative, Parser as SelParser, SelectorImpl, SelectorList, SelectorParseErrorKind,
    },
};

use crate::error::{DomError, Result};
use crate::servo_dom::DomElement;

// Local types to satisfy trait bounds and avoid orphan rule issues.
#[derive(Clone, Debug, Default, Eq, PartialEq, Hash)]
pub struct CssIdent(pub String);

impl AsRef<str> for CssIdent {
    fn as_ref(&self) -> &str {
        &self.0
    }
}
impl std::borrow::Borrow<str> for CssIdent {
    fn borrow(&self) -> &str {
        &self.0
    }
}
impl<'a> From<&'a str> for CssIdent {
    fn from(s: &'a str) -> Self {
        Self(s.to_owned())
    }
}
impl ToCss for CssIdent {
    fn to_css<W>(&self, dest: &mut W) -> fmt::Result
    where
        W: fmt::Write,
    {
        serialize_identifier(&self.0, dest)
    }
}

#[derive(Clone, Debug, Default, Eq, PartialEq, Hash)]
pub struct CssAttrValue(pub String);

impl AsRef<str> for CssAttrValue {
    fn as_ref(&self) -> &str {
        &self.0
    }
}
impl<'a> From<&'a str> for CssAttrValue {
    fn from(s: &'a str) -> Self {
        Self(s.to_owned())
    }
}
impl ToCss for CssAttrValue {
    fn to_css<W>(&self, dest: &mut W) -> fmt::Result
    where
        W: fmt::Write,
    {
        use std::fmt::Write;
        write!(CssStringWriter::new(dest), "{}", &self.0)
    }
}

/// Selector implementation without pseudo-classes or pseudo-elements.
#[derive(Clone, Debug)]
pub enum SimpleImpl {}

impl SelectorImpl for SimpleImpl {
    type ExtraMatchingData<'a> = ();
    type AttrValue = CssAttrValue;
    type Identifier = CssIdent;
    type LocalName = CssIdent;
    type NamespaceUrl = CssIdent;
    type NamespacePrefix = CssIdent;
    type BorrowedNamespaceUrl = str;
    type BorrowedLocalName = str;
    type NonTSPseudoClass = Never;
    type PseudoElement = Never;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Never {}

impl ToCss for Never {
    fn to_css<W>(&self, _dest: &mut W) -> fmt::Result
    where
        W: fmt::Write,
    {
        Ok(())
    }
}

impl selectors::parser::NonTSPseudoClass for Never {
    type Impl = SimpleImpl;
    fn is_active_or_hover(&self) -> bool {
        false
    }
    fn is_user_action_state(&self) -> bool {
        false
    }
}

impl selectors::parser::PseudoElement for Never {
    type Impl = SimpleImpl;
    fn accepts_state_pseudo_classes(&self) -> bool {
        false
    }
    fn valid_after_slotted(&self) -> bool {
        false
    }
}

#[derive(Default)]
struct BasicParser;

impl<'i> SelParser<'i> for BasicParser {
    type Impl = SimpleImpl;
    type Error = SelectorParseErrorKind<'i>;
}

/// A parsed selector list together with its source text.
#[derive(Clone)]
pub struct Selector {
    source: String,
    list: SelectorList<SimpleImpl>,
}

impl Selector {
    pub fn parse(source: &str) -> Result<Self> {
        let mut input = ParserInput::new(source);
        let mut parser = CssParser::new(&mut input);
        let parsed = SelectorList::parse(&BasicParser, &mut parser, ParseRelative::No);
        match parsed {
            Ok(list) => Ok(Self {
                source: source.to_string(),
                list,
            }),
            Err(err) => Err(DomError::InvalidSelector {
                selector: source.to_string(),
                reason: format!("{:?}", err.kind),
            }),
        }
    }

    /// Parse every source and join them into one selector list.
    pub fn union<I, S>(sources: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let joined = sources
            .into_iter()
            .map(|s| s.as_ref().trim().to_string())
            .collect::<Vec<_>>()
            .join(", ");
        Self::parse(&joined)
    }

    pub fn as_str(&self) -> &str {
        &self.source
    }

    pub(crate) fn matches_element(&self, el: &DomElement<'_>) -> bool {
        let mut cache = NthIndexCache::default();
        let mut ctx = MatchingContext::new(
            MatchingMode::Normal,
            None,
            &mut cache,
            QuirksMode::NoQuirks,
            NeedsSelectorFlags::No,
            IgnoreNthChildForInvalidation::No,
        );
        matches_selector_list(&self.list, el, &mut ctx)
    }
}

impl fmt::Debug for Selector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Selector").field(&self.source).finish()
    }
}

impl fmt::Display for Selector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.source)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_garbage() {
        let err = Selector::parse("div[").unwrap_err();
        assert!(matches!(err, DomError::InvalidSelector { .. }));
    }

    #[test]
    fn union_joins_sources() {
        let sel = Selector::union(["p", " li "]).unwrap();
        assert_eq!(sel.as_str(), "p, li");
    }
}
