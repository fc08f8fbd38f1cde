pub(crate) fn escape_text(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for ch in value.chars() {
        match ch {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            _ => escaped.push(ch),
        }
    }
    escaped
}

pub(crate) fn escape_attr(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for ch in value.chars() {
        match ch {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#39;"),
            _ => escaped.push(ch),
        }
    }
    escaped
}

/// Format a CSS number with at most two decimals and no trailing zeros.
pub(crate) fn css_number(value: f32) -> String {
    let formatted = format!("{value:.2}");
    let trimmed = formatted.trim_end_matches('0').trim_end_matches('.');
    match trimmed {
        "" | "-0" => "0".to_string(),
        other => other.to_string(),
    }
}

/// Whether an HTML fragment renders anything a reader would see: text other
/// than whitespace, or an image.
pub(crate) fn has_visible_content(fragment: &str) -> bool {
    let mut in_tag = false;
    let mut tag = String::new();
    for ch in fragment.chars() {
        match ch {
            '<' => {
                in_tag = true;
                tag.clear();
            }
            '>' if in_tag => {
                in_tag = false;
                if tag.starts_with("img") {
                    return true;
                }
            }
            _ if in_tag => tag.push(ch),
            _ if !ch.is_whitespace() => return true,
            _ => {}
        }
    }
    false
}

/// Join CSS declarations into a ` style="..."` attribute, or nothing.
pub(crate) fn style_attr(declarations: &[String]) -> String {
    if declarations.is_empty() {
        String::new()
    } else {
        let joined = declarations.join("; ");
        format!(" style=\"{};\"", escape_text(&joined).replace('"', "&quot;"))
    }
}
