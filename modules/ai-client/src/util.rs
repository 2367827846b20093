/// Cap page text handed to a model at `max_bytes`, backing off to the last
/// whole character so multi-byte currency symbols are never split.
pub fn truncate_to_char_boundary(text: &str, max_bytes: usize) -> &str {
    let end = text
        .char_indices()
        .map(|(start, c)| start + c.len_utf8())
        .take_while(|&end| end <= max_bytes)
        .last()
        .unwrap_or(0);
    &text[..end]
}

/// Models sometimes answer a JSON-only prompt inside a markdown fence anyway.
/// Returns the fenced body, or the trimmed reply when there is no fence.
pub fn strip_code_blocks(reply: &str) -> &str {
    let reply = reply.trim();
    let Some(body) = reply.strip_prefix("```") else {
        return reply;
    };

    // Opening line may carry a language tag (`json`, `JSON`, ...).
    let body = match body.find('\n') {
        Some(nl) if body[..nl].trim().chars().all(|c| c.is_ascii_alphanumeric()) => {
            &body[nl + 1..]
        }
        _ => body.trim_start_matches(|c: char| c.is_ascii_alphabetic()),
    };
    body.strip_suffix("```").unwrap_or(body).trim()
}
