use crate::error::ConfigError;

/// Splits a dotted path into its segments.
///
/// A segment (or part of one) wrapped in double quotes is taken literally, so
/// `"a.b".c` yields `["a.b", "c"]`. Whitespace around unquoted segments is
/// trimmed. An empty path yields no segments.
///
/// # Errors
/// Returns `ConfigError::InvalidPath` for an unterminated quote or an empty
/// unquoted segment such as `a..b`.
pub fn split_dotted_path(path: &str) -> Result<Vec<String>, ConfigError> {
    if path.trim().is_empty() {
        return Ok(Vec::new());
    }

    let invalid = |reason: &str| ConfigError::InvalidPath {
        path: path.to_string(),
        reason: reason.to_string(),
    };

    let mut segments = Vec::new();
    let mut current = Segment::default();
    let mut in_quotes = false;
    let mut chars = path.chars();

    while let Some(c) = chars.next() {
        match c {
            '"' => {
                in_quotes = !in_quotes;
                current.quoted = true;
            }
            '\\' if in_quotes => match chars.next() {
                Some(escaped) => current.text.push(escaped),
                None => return Err(invalid("unterminated quoted segment")),
            },
            '.' if !in_quotes => {
                segments.push(current.finish().ok_or_else(|| invalid("empty path segment"))?);
                current = Segment::default();
            }
            _ if in_quotes => current.text.push(c),
            _ => current.push_unquoted(c),
        }
    }

    if in_quotes {
        return Err(invalid("unterminated quoted segment"));
    }
    segments.push(current.finish().ok_or_else(|| invalid("empty path segment"))?);
    Ok(segments)
}

/// Renders segments back into a dotted path, quoting the segments that
/// would not survive a round trip through [`split_dotted_path`] unquoted.
pub fn join_path<S: AsRef<str>>(segments: &[S]) -> String {
    segments
        .iter()
        .map(|segment| {
            let segment = segment.as_ref();
            let needs_quotes = segment.is_empty()
                || segment.trim() != segment
                || segment.contains(['.', '"', '\\']);
            if needs_quotes {
                let escaped = segment.replace('\\', "\\\\").replace('"', "\\\"");
                format!("\"{escaped}\"")
            } else {
                segment.to_string()
            }
        })
        .collect::<Vec<_>>()
        .join(".")
}

#[derive(Default)]
struct Segment {
    text: String,
    // Unquoted whitespace is held back so trailing runs can be dropped.
    pending_space: String,
    quoted: bool,
}

impl Segment {
    fn push_unquoted(&mut self, c: char) {
        if c.is_whitespace() {
            if !self.text.is_empty() {
                self.pending_space.push(c);
            }
        } else {
            self.text.push_str(&self.pending_space);
            self.pending_space.clear();
            self.text.push(c);
        }
    }

    fn finish(self) -> Option<String> {
        if self.text.is_empty() && !self.quoted {
            None
        } else {
            Some(self.text)
        }
    }
}
