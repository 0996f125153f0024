//! Prop Diffing
//!
//! Translates a previous/next prop pair into host calls. Ordering follows the
//! host's expectations: stale listeners are detached before properties change
//! and new listeners are attached last.

use crate::element::{PropValue, Props, Style};

use super::{HostHandle, HostRenderer};

/// Style keys whose numeric values are written without a unit.
const UNITLESS: &[&str] = &[
    "animationIterationCount",
    "borderImageOutset",
    "borderImageSlice",
    "borderImageWidth",
    "boxFlex",
    "boxFlexGroup",
    "boxOrdinalGroup",
    "columnCount",
    "fillOpacity",
    "flex",
    "flexGrow",
    "flexNegative",
    "flexOrder",
    "flexPositive",
    "flexShrink",
    "floodOpacity",
    "fontWeight",
    "gridArea",
    "gridColumn",
    "gridColumnEnd",
    "gridColumnSpan",
    "gridColumnStart",
    "gridRow",
    "gridRowEnd",
    "gridRowSpan",
    "gridRowStart",
    "lineClamp",
    "lineHeight",
    "opacity",
    "order",
    "orphans",
    "stopOpacity",
    "strokeDasharray",
    "strokeDashoffset",
    "strokeMiterlimit",
    "strokeOpacity",
    "strokeWidth",
    "tabSize",
    "widows",
    "zIndex",
    "zoom",
];

/// Whether numeric values for `key` are written without a `px` suffix.
pub fn is_unitless(key: &str) -> bool {
    UNITLESS.binary_search(&key).is_ok()
}

/// Render a style value the way the host expects it.
pub fn format_style_value(key: &str, value: &PropValue) -> String {
    match value {
        PropValue::Number(n) if !key.starts_with("--") && !is_unitless(key) => format!("{n}px"),
        other => other.to_attribute(),
    }
}

pub(crate) fn is_listener_prop(name: &str) -> bool {
    name.len() > 2 && name.starts_with("on")
}

fn is_plain_prop(name: &str) -> bool {
    name != "style" && !is_listener_prop(name)
}

fn is_attribute(name: &str) -> bool {
    name.starts_with("data-") || name.starts_with("aria-")
}

fn event_name(prop: &str) -> String {
    prop[2..].to_ascii_lowercase()
}

/// Apply the difference between `prev` and `next` to `node`.
pub(crate) fn apply_props(host: &dyn HostRenderer, node: HostHandle, prev: &Props, next: &Props) {
    // Detach listeners that were removed or replaced.
    for (name, value) in prev.iter().filter(|(name, _)| is_listener_prop(name)) {
        if next.get(name) == Some(value) {
            continue;
        }
        if let PropValue::Listener(listener) = value {
            host.remove_listener(node, &event_name(name), listener);
        }
    }

    for (name, _) in prev.iter().filter(|(name, _)| is_plain_prop(name)) {
        if next.contains(name) {
            continue;
        }
        if is_attribute(name) {
            host.remove_attribute(node, name);
        } else {
            host.remove_property(node, name);
        }
    }

    for (name, value) in next.iter().filter(|(name, _)| is_plain_prop(name)) {
        if prev.get(name) == Some(value) {
            continue;
        }
        if is_attribute(name) {
            host.set_attribute(node, name, &value.to_attribute());
        } else {
            host.set_property(node, name, value);
        }
    }

    for (name, value) in next.iter().filter(|(name, _)| is_listener_prop(name)) {
        if prev.get(name) == Some(value) {
            continue;
        }
        match value {
            PropValue::Listener(listener) => host.add_listener(node, &event_name(name), listener),
            other => tracing::warn!(prop = name, value = ?other, "ignoring non-listener value for event prop"),
        }
    }

    let empty = Style::new();
    let prev_style = prev.get("style").and_then(PropValue::as_style);
    let next_style = next.get("style").and_then(PropValue::as_style);
    if prev_style.is_some() || next_style.is_some() {
        apply_style(
            host,
            node,
            prev_style.unwrap_or(&empty),
            next_style.unwrap_or(&empty),
        );
    }
}

fn apply_style(host: &dyn HostRenderer, node: HostHandle, prev: &Style, next: &Style) {
    for key in prev.keys() {
        if !next.contains_key(key) {
            host.set_style(node, key, None);
        }
    }

    for (key, value) in next {
        if prev.get(key) != Some(value) {
            host.set_style(node, key, Some(&format_style_value(key, value)));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::element::{Element, Listener};
    use crate::host::memory::{HostOp, MemoryHost};

    #[test]
    fn unitless_list_is_sorted() {
        assert!(UNITLESS.windows(2).all(|pair| pair[0] < pair[1]));
        assert!(is_unitless("opacity"));
        assert!(is_unitless("zIndex"));
        assert!(!is_unitless("width"));
    }

    #[test]
    fn style_values_get_units() {
        assert_eq!(format_style_value("width", &PropValue::from(10)), "10px");
        assert_eq!(format_style_value("opacity", &PropValue::from(0.5)), "0.5");
        assert_eq!(format_style_value("--gap", &PropValue::from(4)), "4");
        assert_eq!(format_style_value("color", &PropValue::from("red")), "red");
    }

    #[test]
    fn event_names_are_lower_cased() {
        assert!(is_listener_prop("onClick"));
        assert!(!is_listener_prop("on"));
        assert_eq!(event_name("onMouseDown"), "mousedown");
    }

    #[test]
    fn initial_props_are_applied() {
        let host = MemoryHost::new();
        let node = host.create_node("div").unwrap();
        let next = Element::host("div")
            .prop("title", "hi")
            .prop("data-id", 7)
            .style("width", 3)
            .on("click", |_| {})
            .props()
            .clone();

        apply_props(&host, node, &Props::new(), &next);

        assert_eq!(host.property(node, "title"), Some(PropValue::from("hi")));
        assert_eq!(host.attribute(node, "data-id").as_deref(), Some("7"));
        assert_eq!(host.style(node, "width").as_deref(), Some("3px"));
        assert_eq!(host.listener_count(node, "click"), 1);
    }

    #[test]
    fn unchanged_props_issue_no_calls() {
        let host = MemoryHost::new();
        let node = host.create_node("div").unwrap();
        let listener = Listener::new(|_| {});
        let props = Element::host("div")
            .prop("title", "hi")
            .listener("click", listener)
            .style("color", "red")
            .props()
            .clone();

        apply_props(&host, node, &Props::new(), &props);
        host.clear_ops();
        apply_props(&host, node, &props, &props.clone());

        assert!(host.ops().is_empty());
    }

    #[test]
    fn removed_and_replaced_values() {
        let host = MemoryHost::new();
        let node = host.create_node("div").unwrap();
        let prev = Element::host("div")
            .prop("title", "old")
            .prop("aria-label", "x")
            .style("width", 1)
            .style("color", "red")
            .on("click", |_| {})
            .props()
            .clone();
        let next = Element::host("div")
            .style("width", 2)
            .on("click", |_| {})
            .props()
            .clone();

        apply_props(&host, node, &Props::new(), &prev);
        host.clear_ops();
        apply_props(&host, node, &prev, &next);

        assert_eq!(host.property(node, "title"), None);
        assert_eq!(host.attribute(node, "aria-label"), None);
        assert_eq!(host.style(node, "color"), None);
        assert_eq!(host.style(node, "width").as_deref(), Some("2px"));
        assert_eq!(host.listener_count(node, "click"), 1);

        let ops = host.ops();
        let removed = ops.iter().position(|op| matches!(op, HostOp::RemoveListener { .. }));
        let added = ops.iter().position(|op| matches!(op, HostOp::AddListener { .. }));
        assert!(removed < added);
    }
}
