//! Light cleanup of scraped markdown before aggregation.

/// Normalize scraped markdown: trim trailing whitespace per line, drop
/// empty headers (`###` with no text), collapse runs of spaces and runs of
/// 3+ newlines.
pub fn clean_markdown(content: &str) -> String {
    let mut lines: Vec<String> = Vec::new();
    for raw in content.lines() {
        let line = raw.trim_end();

        let stripped = line.trim_start_matches('#').trim();
        if line.starts_with('#') && stripped.is_empty() {
            lines.push(String::new());
            continue;
        }

        lines.push(collapse_spaces(line));
    }

    let mut out = String::with_capacity(content.len());
    let mut blank_run = 0;
    for line in &lines {
        if line.is_empty() {
            blank_run += 1;
            if blank_run > 1 {
                continue;
            }
        } else {
            blank_run = 0;
        }
        out.push_str(line);
        out.push('\n');
    }

    out.trim().to_string()
}

/// Collapse interior runs of 2+ spaces, preserving leading indentation.
fn collapse_spaces(line: &str) -> String {
    let indent_len = line.len() - line.trim_start_matches(' ').len();
    let (indent, rest) = line.split_at(indent_len);
    let mut out = String::with_capacity(line.len());
    out.push_str(indent);
    let mut prev_space = false;
    for ch in rest.chars() {
        if ch == ' ' {
            if prev_space {
                continue;
            }
            prev_space = true;
        } else {
            prev_space = false;
        }
        out.push(ch);
    }
    out
}
