//! Elements
//!
//! Immutable descriptions of the desired UI. Application code builds a fresh
//! element tree on every render; the reconciler diffs it against the fibers of
//! the previous generation and then drops it.
//!
//! An element's kind is a closed variant: host tag, component function,
//! context provider or fragment. Fragments never become fibers. Their
//! children are spliced into the surrounding child list.

mod context;
mod refs;
mod value;

use std::fmt;
use std::sync::Arc;

use indexmap::IndexMap;

pub use context::Context;
pub use refs::{NodeRef, RefObject, RefValue};
pub use value::{Event, Listener, PropValue, Style};

use crate::error::Result;
use crate::hooks::Hooks;

/// Prop name under which text fibers keep their content.
pub(crate) const TEXT_PROP: &str = "nodeValue";

/// The list a component returns.
pub type Children = Vec<Child>;

/// Signature of a component function.
pub type RenderFn = dyn Fn(&mut Hooks<'_>, &Props) -> Result<Children> + Send + Sync;

/// A component function with a name for diagnostics.
///
/// Identity is the allocation of the render function. Create a component once
/// and clone it. A component rebuilt on every render has a new kind each
/// time and is remounted.
#[derive(Clone)]
pub struct Component {
    name: Arc<str>,
    render: Arc<RenderFn>,
}

impl Component {
    pub fn new<F>(name: impl Into<Arc<str>>, render: F) -> Self
    where
        F: Fn(&mut Hooks<'_>, &Props) -> Result<Children> + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            render: Arc::new(render),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub(crate) fn render(&self, hooks: &mut Hooks<'_>, props: &Props) -> Result<Children> {
        (self.render)(hooks, props)
    }
}

impl PartialEq for Component {
    fn eq(&self, other: &Self) -> bool {
        std::ptr::addr_eq(Arc::as_ptr(&self.render), Arc::as_ptr(&other.render))
    }
}

impl fmt::Debug for Component {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Component({})", self.name)
    }
}

/// What an element describes.
#[derive(Debug, Clone, PartialEq)]
pub enum ElementKind {
    /// A host node such as `div`.
    Host(Arc<str>),
    Component(Component),
    /// Writes its `value` prop into the context cell for its subtree.
    Provider(Context),
    /// Groups children without a host node of its own.
    Fragment,
}

/// Props passed to an element: named values plus children.
#[derive(Debug, Clone, Default)]
pub struct Props {
    values: IndexMap<String, PropValue>,
    children: Children,
}

impl Props {
    pub fn new() -> Self {
        Self::default()
    }

    /// Props of a text fiber.
    pub(crate) fn text(content: &str) -> Self {
        let mut props = Self::new();
        props.set(TEXT_PROP, content);
        props
    }

    pub fn with(mut self, name: impl Into<String>, value: impl Into<PropValue>) -> Self {
        self.set(name, value);
        self
    }

    pub fn set(&mut self, name: impl Into<String>, value: impl Into<PropValue>) {
        self.values.insert(name.into(), value.into());
    }

    pub fn get(&self, name: &str) -> Option<&PropValue> {
        self.values.get(name)
    }

    pub fn get_str(&self, name: &str) -> Option<&str> {
        self.get(name).and_then(PropValue::as_str)
    }

    pub fn get_number(&self, name: &str) -> Option<f64> {
        self.get(name).and_then(PropValue::as_number)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.values.contains_key(name)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &PropValue)> {
        self.values.iter().map(|(name, value)| (name.as_str(), value))
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn children(&self) -> &[Child] {
        &self.children
    }

    pub fn with_children<I>(mut self, children: I) -> Self
    where
        I: IntoIterator,
        I::Item: Into<Child>,
    {
        self.children.extend(children.into_iter().map(Into::into));
        self
    }

    pub fn push_child(&mut self, child: impl Into<Child>) {
        self.children.push(child.into());
    }
}

/// An entry in a child list.
#[derive(Debug, Clone)]
pub enum Child {
    Element(Element),
    /// Text and numbers both become text nodes.
    Text(Arc<str>),
}

impl Child {
    pub fn key(&self) -> Option<&str> {
        match self {
            Self::Element(element) => element.key(),
            Self::Text(_) => None,
        }
    }
}

impl From<Element> for Child {
    fn from(element: Element) -> Self {
        Self::Element(element)
    }
}

impl From<&str> for Child {
    fn from(text: &str) -> Self {
        Self::Text(text.into())
    }
}

impl From<String> for Child {
    fn from(text: String) -> Self {
        Self::Text(text.into())
    }
}

macro_rules! number_child {
    ($($ty:ty),*) => {
        $(
            impl From<$ty> for Child {
                fn from(value: $ty) -> Self {
                    Self::Text(value.to_string().into())
                }
            }
        )*
    };
}

number_child!(i32, i64, u32, u64, usize, f64);

/// Immutable description of one node of the desired UI.
#[derive(Debug, Clone)]
pub struct Element {
    kind: ElementKind,
    key: Option<Arc<str>>,
    props: Props,
    node_ref: Option<NodeRef>,
}

impl Element {
    fn new(kind: ElementKind, props: Props) -> Self {
        Self {
            kind,
            key: None,
            props,
            node_ref: None,
        }
    }

    /// A host element, e.g. `Element::host("div")`.
    pub fn host(tag: impl Into<Arc<str>>) -> Self {
        Self::new(ElementKind::Host(tag.into()), Props::new())
    }

    pub fn component(component: &Component, props: Props) -> Self {
        Self::new(ElementKind::Component(component.clone()), props)
    }

    pub fn provider<I>(context: &Context, value: impl Into<PropValue>, children: I) -> Self
    where
        I: IntoIterator,
        I::Item: Into<Child>,
    {
        let props = Props::new().with("value", value).with_children(children);
        Self::new(ElementKind::Provider(context.clone()), props)
    }

    pub fn fragment<I>(children: I) -> Self
    where
        I: IntoIterator,
        I::Item: Into<Child>,
    {
        Self::new(ElementKind::Fragment, Props::new().with_children(children))
    }

    pub fn with_key(mut self, key: impl Into<Arc<str>>) -> Self {
        self.key = Some(key.into());
        self
    }

    pub fn with_ref(mut self, node_ref: impl Into<NodeRef>) -> Self {
        self.node_ref = Some(node_ref.into());
        self
    }

    pub fn prop(mut self, name: impl Into<String>, value: impl Into<PropValue>) -> Self {
        self.props.set(name, value);
        self
    }

    /// Attach a listener; `on("click", ..)` stores the prop `onClick`.
    pub fn on<F>(self, event: &str, handler: F) -> Self
    where
        F: Fn(&Event) + Send + Sync + 'static,
    {
        self.listener(event, Listener::new(handler))
    }

    /// Attach an existing listener, keeping its identity across renders.
    pub fn listener(self, event: &str, listener: Listener) -> Self {
        let mut chars = event.chars();
        let name = match chars.next() {
            Some(first) => format!("on{}{}", first.to_ascii_uppercase(), chars.as_str()),
            None => "on".to_string(),
        };
        self.prop(name, listener)
    }

    /// Set one entry of the `style` prop.
    pub fn style(mut self, key: impl Into<String>, value: impl Into<PropValue>) -> Self {
        let mut style = self
            .props
            .get("style")
            .and_then(PropValue::as_style)
            .cloned()
            .unwrap_or_default();
        style.insert(key.into(), value.into());
        self.props.set("style", style);
        self
    }

    pub fn child(mut self, child: impl Into<Child>) -> Self {
        self.props.push_child(child);
        self
    }

    pub fn children<I>(mut self, children: I) -> Self
    where
        I: IntoIterator,
        I::Item: Into<Child>,
    {
        self.props = self.props.with_children(children);
        self
    }

    pub fn kind(&self) -> &ElementKind {
        &self.kind
    }

    pub fn key(&self) -> Option<&str> {
        self.key.as_deref()
    }

    pub(crate) fn key_arc(&self) -> Option<Arc<str>> {
        self.key.clone()
    }

    pub fn props(&self) -> &Props {
        &self.props
    }

    pub fn node_ref(&self) -> Option<&NodeRef> {
        self.node_ref.as_ref()
    }

    pub fn is_fragment(&self) -> bool {
        matches!(self.kind, ElementKind::Fragment)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builder_collects_props_and_children() {
        let element = Element::host("div")
            .prop("id", "main")
            .with_key("k")
            .child("hello")
            .child(Element::host("span"));

        assert_eq!(element.key(), Some("k"));
        assert_eq!(element.props().get_str("id"), Some("main"));
        assert_eq!(element.props().children().len(), 2);
        assert!(matches!(element.kind(), ElementKind::Host(tag) if &**tag == "div"));
    }

    #[test]
    fn on_stores_prefixed_listener() {
        let element = Element::host("button").on("click", |_| {});
        assert!(element.props().get("onClick").and_then(PropValue::as_listener).is_some());
    }

    #[test]
    fn style_entries_accumulate() {
        let element = Element::host("div").style("width", 10).style("opacity", 0.5);
        let style = element.props().get("style").and_then(PropValue::as_style).unwrap();
        assert_eq!(style.len(), 2);
        assert_eq!(style.get("width"), Some(&PropValue::Number(10.0)));
    }

    #[test]
    fn numbers_become_text_children() {
        match Child::from(42) {
            Child::Text(text) => assert_eq!(&*text, "42"),
            other => panic!("expected text, got {other:?}"),
        }
    }

    #[test]
    fn component_identity_is_the_function_allocation() {
        let a = Component::new("A", |_, _| Ok(vec![]));
        let b = Component::new("A", |_, _| Ok(vec![]));
        assert_eq!(a, a.clone());
        assert_ne!(a, b);
    }

    #[test]
    fn provider_carries_value() {
        let ctx = Context::new("theme", "light");
        let element = Element::provider(&ctx, "dark", [Element::host("p")]);
        assert_eq!(element.props().get_str("value"), Some("dark"));
        assert_eq!(element.props().children().len(), 1);
    }
}
