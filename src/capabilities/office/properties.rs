use anyhow::Context;
use std::io::Cursor;
use xmltree::{Element, EmitterConfig, XMLNode};

use super::constants::{EMPTY_CUSTOM_PROPERTIES, PropertyReset};

/// Restablece las propiedades indicadas. Devuelve `None` si el XML ya estaba limpio.
pub(super) fn reset_properties(
    contents: &[u8],
    resets: &[PropertyReset],
) -> anyhow::Result<Option<Vec<u8>>> {
    let mut root =
        Element::parse(Cursor::new(contents)).context("Error leyendo XML de metadata")?;

    let mut modified = false;
    for reset in resets {
        modified |= apply_reset(&mut root, reset);
    }

    if !modified {
        return Ok(None);
    }

    let mut output = Vec::new();
    let config = EmitterConfig::new()
        .perform_indent(false)
        .write_document_declaration(true);
    root.write_with_config(&mut output, config)
        .context("Error escribiendo XML sanitizado")?;
    Ok(Some(output))
}

/// Plantilla vacía de propiedades personalizadas, si el contenido difiere de ella.
pub(super) fn empty_custom_properties(contents: &[u8]) -> Option<Vec<u8>> {
    let empty = EMPTY_CUSTOM_PROPERTIES.as_bytes();
    (contents != empty).then(|| empty.to_vec())
}

/// Comprueba que cada propiedad tenga el valor restablecido.
pub(super) fn properties_are_clean(
    contents: &[u8],
    resets: &[PropertyReset],
) -> anyhow::Result<bool> {
    let root = Element::parse(Cursor::new(contents))
        .context("Error leyendo XML de metadata durante la verificación")?;

    Ok(resets.iter().all(|reset| holds_value(&root, reset)))
}

/// Las propiedades personalizadas están limpias si no queda ningún elemento ni texto.
pub(super) fn custom_properties_are_clean(contents: &[u8]) -> anyhow::Result<bool> {
    if contents == EMPTY_CUSTOM_PROPERTIES.as_bytes() {
        return Ok(true);
    }

    let root = Element::parse(Cursor::new(contents))
        .context("Error leyendo custom.xml durante la verificación")?;

    let has_properties = root
        .children
        .iter()
        .any(|node| matches!(node, XMLNode::Element(_)));
    Ok(!has_properties && text_content(&root).is_empty())
}

fn apply_reset(root: &mut Element, reset: &PropertyReset) -> bool {
    let existing = root.children.iter_mut().find_map(|node| match node {
        XMLNode::Element(child) if matches_reset(child, reset) => Some(child),
        _ => None,
    });

    if let Some(child) = existing {
        return set_text(child, reset.value);
    }

    let mut child = Element::new(reset.local_name);
    child.prefix = reset.prefix.map(str::to_string);
    child.namespace = Some(reset.namespace.to_string());
    if !reset.value.is_empty() {
        child.children.push(XMLNode::Text(reset.value.to_string()));
    }
    root.children.push(XMLNode::Element(child));
    true
}

fn matches_reset(element: &Element, reset: &PropertyReset) -> bool {
    element.name == reset.local_name && element.namespace.as_deref() == Some(reset.namespace)
}

fn set_text(element: &mut Element, value: &str) -> bool {
    if text_content(element) == value {
        return false;
    }

    element
        .children
        .retain(|node| !matches!(node, XMLNode::Text(_)));
    if !value.is_empty() {
        element.children.push(XMLNode::Text(value.to_string()));
    }
    true
}

fn text_content(element: &Element) -> String {
    element
        .children
        .iter()
        .filter_map(|node| match node {
            XMLNode::Text(text) => Some(text.as_str()),
            _ => None,
        })
        .collect::<String>()
        .trim()
        .to_string()
}

fn holds_value(root: &Element, reset: &PropertyReset) -> bool {
    root.children
        .iter()
        .find_map(|node| match node {
            XMLNode::Element(child) if matches_reset(child, reset) => Some(text_content(child)),
            _ => None,
        })
        .map_or(reset.value.is_empty(), |text| text == reset.value)
}
