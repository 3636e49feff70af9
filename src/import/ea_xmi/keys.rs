//! Candidate-key matching over the loosely-specified EA dialect.
//!
//! Tag and attribute names vary across EA versions and export options
//! (`xmi:id` in XMI 2.x, `xmi.id` in 1.x exports, bare `id` in some tool
//! chains). Each concept's candidate keys are ordered data queried through
//! the generic first-match helpers here, so a new EA quirk is one more list
//! entry, not another conditional chain.

use roxmltree::Node;

/// Identifier attribute candidates, in priority order.
pub(crate) const ID_KEYS: &[&str] = &["xmi:id", "xmi.id", "id"];

/// Reference attribute candidates, in priority order.
pub(crate) const IDREF_KEYS: &[&str] = &["xmi:idref", "xmi.idref", "idref", "href"];

/// Type attribute candidates, in priority order.
pub(crate) const TYPE_KEYS: &[&str] = &["xmi:type", "xmi.type", "xsi:type", "type"];

/// Look up one attribute by its (possibly prefixed) candidate key.
///
/// A prefixed key like `xmi:id` matches an attribute whose local name is
/// `id` and whose namespace is bound to the `xmi` prefix on this node; an
/// unprefixed key matches only unnamespaced attributes. Prefix matching by
/// name, not by a fixed namespace URI, tolerates the several XMI namespace
/// revisions EA has exported over the years.
pub(crate) fn attr<'a>(node: Node<'a, '_>, key: &str) -> Option<&'a str> {
    match key.split_once(':') {
        None => node
            .attributes()
            .find(|a| a.namespace().is_none() && a.name() == key)
            .map(|a| a.value()),
        Some((prefix, local)) => node.attributes().find_map(|a| {
            if a.name() != local {
                return None;
            }
            let uri = a.namespace()?;
            (node.lookup_prefix(uri) == Some(prefix)).then(|| a.value())
        }),
    }
}

/// First candidate key with a non-empty value.
pub(crate) fn attr_any<'a>(node: Node<'a, '_>, keys: &[&str]) -> Option<&'a str> {
    keys.iter()
        .find_map(|key| attr(node, key).filter(|v| !v.trim().is_empty()))
}

/// First direct element child whose local name matches any candidate.
pub(crate) fn child_named<'a, 'input>(
    node: Node<'a, 'input>,
    names: &[&str],
) -> Option<Node<'a, 'input>> {
    node.children()
        .filter(|c| c.is_element())
        .find(|c| names.contains(&c.tag_name().name()))
}

/// All direct element children whose local name matches any candidate.
pub(crate) fn children_named<'a, 'input>(
    node: Node<'a, 'input>,
    names: &'a [&'a str],
) -> impl Iterator<Item = Node<'a, 'input>> + 'a {
    node.children()
        .filter(|c| c.is_element())
        .filter(move |c| names.contains(&c.tag_name().name()))
}

/// The local tag name of an element node.
pub(crate) fn local_name<'a>(node: Node<'a, '_>) -> &'a str {
    node.tag_name().name()
}

/// The namespace prefix of an element node's tag, if any.
pub(crate) fn tag_prefix<'a>(node: Node<'a, '_>) -> Option<&'a str> {
    let uri = node.tag_name().namespace()?;
    node.lookup_prefix(uri)
}

/// The `xmi:type`-style metaclass of a node, with any namespace prefix
/// stripped: `uml:Class` → `Class`.
pub(crate) fn metaclass<'a>(node: Node<'a, '_>) -> Option<&'a str> {
    let raw = attr_any(node, TYPE_KEYS)?;
    Some(raw.rsplit(':').next().unwrap_or(raw))
}

/// Extract a reference id from a node: idref-style attribute first, then an
/// href fragment.
pub(crate) fn idref_of<'a>(node: Node<'a, '_>) -> Option<&'a str> {
    let raw = attr_any(node, IDREF_KEYS)?;
    Some(super::ids::resolve_href_id(raw))
}

/// Coerce the boolean-ish strings EA emits (`true`, `1`, `yes`).
pub(crate) fn boolish(raw: &str) -> bool {
    matches!(
        raw.trim().to_ascii_lowercase().as_str(),
        "true" | "1" | "yes"
    )
}
