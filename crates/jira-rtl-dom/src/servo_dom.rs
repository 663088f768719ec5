//! Adapter exposing document elements to Servo's `selectors` matcher.

use std::fmt;

use selectors::attr::{AttrSelectorOperation, CaseSensitivity, NamespaceConstraint};
use selectors::{Element as ServoElement, OpaqueElement};

use crate::node::ElementData;
use crate::selector::SimpleImpl;
use crate::{Document, NodeId};

/// Element view over the document arena.
#[derive(Clone, Copy)]
pub struct DomElement<'a> {
    doc: &'a Document,
    id: NodeId,
    data: &'a ElementData,
}

impl<'a> DomElement<'a> {
    /// Returns `None` when `id` is not an element.
    pub fn new(doc: &'a Document, id: NodeId) -> Option<Self> {
        doc.element_data(id).map(|data| Self { doc, id, data })
    }

    pub fn id(&self) -> NodeId {
        self.id
    }

    fn data(&self) -> &'a ElementData {
        self.data
    }

    fn wrap(&self, id: NodeId) -> Option<Self> {
        Self::new(self.doc, id)
    }
}

impl fmt::Debug for DomElement<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DomElement")
            .field("id", &self.id)
            .field("tag", &self.data().tag())
            .finish()
    }
}

impl<'a> ServoElement for DomElement<'a> {
    type Impl = SimpleImpl;

    fn opaque(&self) -> OpaqueElement {
        OpaqueElement::new(self.data)
    }

    fn parent_element(&self) -> Option<Self> {
        self.doc.parent(self.id).and_then(|p| self.wrap(p))
    }

    fn parent_node_is_shadow_root(&self) -> bool {
        false
    }

    fn containing_shadow_host(&self) -> Option<Self> {
        None
    }

    fn prev_sibling_element(&self) -> Option<Self> {
        let parent = self.doc.parent(self.id)?;
        let siblings = self.doc.children(parent);
        let pos = siblings.iter().position(|c| *c == self.id)?;
        siblings[..pos].iter().rev().find_map(|s| self.wrap(*s))
    }

    fn next_sibling_element(&self) -> Option<Self> {
        let parent = self.doc.parent(self.id)?;
        let siblings = self.doc.children(parent);
        let pos = siblings.iter().position(|c| *c == self.id)?;
        siblings[pos + 1..].iter().find_map(|s| self.wrap(*s))
    }

    fn first_element_child(&self) -> Option<Self> {
        self.doc
            .children(self.id)
            .iter()
            .find_map(|c| self.wrap(*c))
    }

    fn is_pseudo_element(&self) -> bool {
        false
    }

    fn is_html_element_in_html_document(&self) -> bool {
        true
    }

    fn has_local_name(
        &self,
        name: &<Self::Impl as selectors::parser::SelectorImpl>::BorrowedLocalName,
    ) -> bool {
        self.data().tag().eq_ignore_ascii_case(name)
    }

    fn has_namespace(
        &self,
        _ns: &<Self::Impl as selectors::parser::SelectorImpl>::BorrowedNamespaceUrl,
    ) -> bool {
        true
    }

    fn is_same_type(&self, other: &Self) -> bool {
        self.data().tag().eq_ignore_ascii_case(other.data().tag())
    }

    fn attr_matches(
        &self,
        ns: &NamespaceConstraint<&<Self::Impl as selectors::parser::SelectorImpl>::NamespaceUrl>,
        local_name: &<Self::Impl as selectors::parser::SelectorImpl>::LocalName,
        operation: &AttrSelectorOperation<
            &<Self::Impl as selectors::parser::SelectorImpl>::AttrValue,
        >,
    ) -> bool {
        match ns {
            NamespaceConstraint::Any | NamespaceConstraint::Specific(_) => {}
        }
        if let Some(value) = self.data().attr(local_name.as_ref()) {
            return operation.eval_str(value);
        }
        false
    }

    fn match_non_ts_pseudo_class(
        &self,
        _pc: &<Self::Impl as selectors::parser::SelectorImpl>::NonTSPseudoClass,
        _context: &mut selectors::matching::MatchingContext<Self::Impl>,
    ) -> bool {
        false
    }

    fn match_pseudo_element(
        &self,
        _pe: &<Self::Impl as selectors::parser::SelectorImpl>::PseudoElement,
        _context: &mut selectors::matching::MatchingContext<Self::Impl>,
    ) -> bool {
        false
    }

    fn apply_selector_flags(&self, _flags: selectors::matching::ElementSelectorFlags) {}

    fn is_link(&self) -> bool {
        self.data().tag().eq_ignore_ascii_case("a") && self.data().attr("href").is_some()
    }

    fn is_html_slot_element(&self) -> bool {
        false
    }

    fn imported_part(
        &self,
        _name: &<Self::Impl as selectors::parser::SelectorImpl>::Identifier,
    ) -> Option<<Self::Impl as selectors::parser::SelectorImpl>::Identifier> {
        None
    }

    fn is_part(&self, _name: &<Self::Impl as selectors::parser::SelectorImpl>::Identifier) -> bool {
        false
    }

    fn has_id(
        &self,
        id: &<Self::Impl as selectors::parser::SelectorImpl>::Identifier,
        case: CaseSensitivity,
    ) -> bool {
        let Some(v) = self.data().attr("id") else {
            return false;
        };
        let id_str = id.as_ref();
        match case {
            CaseSensitivity::CaseSensitive => v == id_str,
            CaseSensitivity::AsciiCaseInsensitive => v.eq_ignore_ascii_case(id_str),
        }
    }

    fn has_class(
        &self,
        name: &<Self::Impl as selectors::parser::SelectorImpl>::Identifier,
        case: CaseSensitivity,
    ) -> bool {
        let needle = name.as_ref();
        self.data().classes().any(|c| match case {
            CaseSensitivity::CaseSensitive => c == needle,
            CaseSensitivity::AsciiCaseInsensitive => c.eq_ignore_ascii_case(needle),
        })
    }

    fn is_empty(&self) -> bool {
        self.doc.children(self.id).iter().all(|c| match self.doc.text(*c) {
            Some(text) => text.is_empty(),
            None => false,
        })
    }

    fn is_root(&self) -> bool {
        self.parent_element().is_none()
    }
}
