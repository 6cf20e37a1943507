//! HTML-to-plain-text normalization.
//!
//! Content arrives as already-rendered HTML. The model only needs the
//! text, so tags are stripped and the common entities decoded. This is
//! deliberately not an HTML parser: malformed markup degrades to
//! slightly noisy text, never to an error.

/// Strip tags and decode common entities, collapsing runs of
/// whitespace to single spaces.
pub fn to_plain_text(html: &str) -> String {
    let mut out = String::with_capacity(html.len());
    let mut in_tag = false;

    for c in html.chars() {
        match c {
            '<' => in_tag = true,
            '>' => {
                if in_tag {
                    in_tag = false;
                    // Tag boundaries separate words.
                    out.push(' ');
                } else {
                    out.push('>');
                }
            }
            _ if in_tag => {}
            _ => out.push(c),
        }
    }

    let decoded = decode_entities(&out);

    // Collapse whitespace runs.
    let mut result = String::with_capacity(decoded.len());
    let mut last_was_space = true;
    for c in decoded.chars() {
        if c.is_whitespace() {
            if !last_was_space {
                result.push(' ');
                last_was_space = true;
            }
        } else {
            result.push(c);
            last_was_space = false;
        }
    }
    result.trim_end().to_string()
}

/// Decode the handful of entities that show up in rendered site content.
fn decode_entities(text: &str) -> String {
    text.replace("&amp;", "&")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&apos;", "'")
        .replace("&nbsp;", " ")
}
