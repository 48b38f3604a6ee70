//! Launch-path and display-name heuristics used by the resolver.

/// Extracts a location code from a launch path like `/KSEA` or `/80301/hourly`.
///
/// Returns the first path segment that looks like a location code, or
/// `None` when the path carries no usable code. Codes are matched by
/// shape, not against any station list, so the result still has to
/// survive a geocode lookup before it names a real place.
pub fn extract_location_code(path: &str) -> Option<&str> {
    path.split('/')
        .map(str::trim)
        .filter(|segment| !segment.is_empty())
        .find(|segment| is_location_code(segment))
}

/// A code-shaped segment: 3 to 12 characters, at least one digit, no dots.
///
/// Digits keep plain words like `hourly` or `settings` out; the dot rule
/// rejects file-ish segments like `favicon.ico`.
fn is_location_code(segment: &str) -> bool {
    let len = segment.chars().count();
    (3..=12).contains(&len)
        && segment.chars().any(|c| c.is_ascii_digit())
        && !segment.contains('.')
}

/// Whether a stored place's display name is worth replacing by a fresh
/// reverse geocode.
///
/// True for empty names, raw coordinate text like `47.6062, -122.3321`,
/// and placeholder labels written before a real name was known.
pub fn needs_display_name_upgrade(display_name: &str) -> bool {
    let trimmed = display_name.trim();
    if trimmed.is_empty() {
        return true;
    }
    if is_coordinate_text(trimmed) {
        return true;
    }
    matches!(
        trimmed.to_lowercase().as_str(),
        "current location" | "unknown location" | "my location"
    )
}

fn is_coordinate_text(text: &str) -> bool {
    let mut parts = text.splitn(2, ',');
    match (parts.next(), parts.next()) {
        (Some(first), Some(second)) => {
            first.trim().parse::<f64>().is_ok() && second.trim().parse::<f64>().is_ok()
        }
        _ => false,
    }
}
