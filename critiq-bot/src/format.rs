//! Outgoing text formatting
//!
//! Telegram caps a message at 4096 characters, so long assistant replies are
//! split into chunks below that limit.

/// Default chunk size, leaving room below Telegram's 4096 limit
pub const DEFAULT_CHUNK_CHARS: usize = 3500;

/// Split `text` into chunks of at most `budget` characters
///
/// Splits between lines where possible. A single line longer than `budget`
/// is cut on char boundaries. Newlines at a cut are dropped and no chunk is
/// empty, so empty or whitespace-only input yields no chunks.
pub fn split_message(text: &str, budget: usize) -> Vec<String> {
    let budget = budget.max(1);
    let mut chunks = Vec::new();
    let mut current = String::new();
    let mut current_len = 0usize;

    for line in text.split_inclusive('\n') {
        let line_len = line.chars().count();

        if current_len + line_len <= budget {
            current.push_str(line);
            current_len += line_len;
            continue;
        }

        flush(&mut chunks, &mut current);
        current_len = 0;

        if line_len <= budget {
            current.push_str(line);
            current_len = line_len;
            continue;
        }

        for ch in line.chars() {
            if current_len == budget {
                flush(&mut chunks, &mut current);
                current_len = 0;
            }
            current.push(ch);
            current_len += 1;
        }
    }

    flush(&mut chunks, &mut current);
    chunks
}

fn flush(chunks: &mut Vec<String>, current: &mut String) {
    let chunk = current.trim_end_matches(['\n', '\r']);
    if !chunk.trim().is_empty() {
        chunks.push(chunk.to_string());
    }
    current.clear();
}

/// Plain-text rendering of a Telegram HTML message
///
/// Used when Telegram rejects the markup; tags are removed and the basic
/// entities decoded.
pub fn strip_html_tags(text: &str) -> String {
    let mut plain = String::with_capacity(text.len());
    let mut in_tag = false;

    for ch in text.chars() {
        match ch {
            '<' => in_tag = true,
            '>' if in_tag => in_tag = false,
            _ if !in_tag => plain.push(ch),
            _ => {}
        }
    }

    plain
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&amp;", "&")
}
