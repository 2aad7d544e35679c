//! Normalización de nombres de archivo antes de escribir resultados.

use std::collections::HashSet;

const FALLBACK_NAME: &str = "download";
const MAX_NAME_CHARS: usize = 200;
const FORBIDDEN_CHARS: [char; 6] = ['<', '>', '"', '|', '?', '*'];

/// Convierte un nombre recibido del exterior en un nombre de archivo seguro.
pub fn sanitize_filename(raw: &str) -> String {
    let decoded = urlencoding::decode(raw)
        .map(|value| value.into_owned())
        .unwrap_or_else(|_| raw.to_string());
    let without_nul = decoded.replace('\0', "");

    let mut sanitized = without_nul
        .rsplit(['/', '\\'])
        .next()
        .unwrap_or("")
        .to_string();

    while sanitized.contains("..") {
        sanitized = sanitized.replace("..", "");
    }

    sanitized.retain(|c| !c.is_ascii_control());
    let mut sanitized = sanitized.trim_start_matches('.').to_string();
    sanitized.retain(|c| !FORBIDDEN_CHARS.contains(&c));

    let sanitized = truncate_keeping_extension(&sanitized);

    if sanitized.trim().is_empty() {
        return FALLBACK_NAME.to_string();
    }

    let stem = sanitized.split('.').next().unwrap_or("");
    if is_reserved_device_name(stem) {
        return format!("file_{sanitized}");
    }

    sanitized
}

fn truncate_keeping_extension(name: &str) -> String {
    let char_count = name.chars().count();
    if char_count <= MAX_NAME_CHARS {
        return name.to_string();
    }

    match name.rfind('.') {
        Some(dot) if dot > 0 => {
            let ext = &name[dot..];
            let keep = MAX_NAME_CHARS.saturating_sub(ext.chars().count());
            let head: String = name.chars().take(keep).collect();
            format!("{head}{ext}")
        }
        _ => name.chars().take(MAX_NAME_CHARS).collect(),
    }
}

fn is_reserved_device_name(stem: &str) -> bool {
    let lower = stem.to_ascii_lowercase();
    match lower.as_str() {
        "con" | "prn" | "aux" | "nul" => true,
        _ => {
            let bytes = lower.as_bytes();
            bytes.len() == 4
                && (lower.starts_with("com") || lower.starts_with("lpt"))
                && (b'1'..=b'9').contains(&bytes[3])
        }
    }
}

/// Devuelve `name` o, si ya se usó, la primera variante `{n}_{name}` libre,
/// y la marca como usada.
pub fn unique_filename(used: &mut HashSet<String>, name: &str) -> String {
    let mut candidate = name.to_string();
    let mut attempt = 1;
    while !used.insert(candidate.clone()) {
        candidate = format!("{attempt}_{name}");
        attempt += 1;
    }
    candidate
}
