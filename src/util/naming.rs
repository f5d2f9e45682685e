//! Conversions between dashed URL segments and camel-cased identifiers.

/// `user-grid` → `UserGrid`.
pub fn camelize_head_up(segment: &str) -> String {
    segment
        .split('-')
        .filter(|part| !part.is_empty())
        .map(capitalize)
        .collect()
}

/// `fetch-grid` → `fetchGrid`.
pub fn camelize_head_down(segment: &str) -> String {
    let camel = camelize_head_up(segment);
    let mut chars = camel.chars();
    match chars.next() {
        Some(first) => first.to_ascii_lowercase().to_string() + chars.as_str(),
        None => String::new(),
    }
}

/// `UserGrid` / `fetchGrid` → `user-grid` / `fetch-grid`.
pub fn uncamelize(identifier: &str) -> String {
    let mut out = String::with_capacity(identifier.len() + 4);
    for (index, ch) in identifier.chars().enumerate() {
        if ch.is_ascii_uppercase() {
            if index > 0 {
                out.push('-');
            }
            out.push(ch.to_ascii_lowercase());
        } else {
            out.push(ch);
        }
    }
    out
}

fn capitalize(part: &str) -> String {
    let mut chars = part.chars();
    match chars.next() {
        Some(first) => first.to_ascii_uppercase().to_string() + chars.as_str(),
        None => String::new(),
    }
}
