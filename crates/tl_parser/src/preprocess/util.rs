//! Shared scanning helpers for preprocessing passes.

/// Skip over comments and quoted strings starting at `i`.
///
/// Template literals are handled by [`TemplateState`] instead, since their
/// `${..}` interpolations contain code.
///
/// Returns the first position after the region, or `None` when `i` does
/// not start one.
pub(super) fn skip_non_code(chars: &[char], i: usize) -> Option<usize> {
    if i >= chars.len() {
        return Some(chars.len());
    }

    if chars[i] == '/' && chars.get(i + 1) == Some(&'/') {
        let mut j = i + 2;
        while j < chars.len() && chars[j] != '\n' {
            j += 1;
        }
        return Some(j);
    }

    if chars[i] == '/' && chars.get(i + 1) == Some(&'*') {
        let mut j = i + 2;
        while j + 1 < chars.len() {
            if chars[j] == '*' && chars[j + 1] == '/' {
                return Some(j + 2);
            }
            j += 1;
        }
        return Some(chars.len());
    }

    if chars[i] == '"' || chars[i] == '\'' {
        return Some(skip_string(chars, i));
    }

    None
}

/// End of the quoted string opening at `i` (one past the closing quote).
pub(super) fn skip_string(chars: &[char], i: usize) -> usize {
    let quote = chars[i];
    let mut j = i + 1;
    while j < chars.len() && chars[j] != quote {
        if chars[j] == '\\' {
            j += 1;
        }
        j += 1;
    }
    (j + 1).min(chars.len())
}

pub(super) fn skip_whitespace(chars: &[char], mut i: usize) -> usize {
    while i < chars.len() && chars[i].is_whitespace() {
        i += 1;
    }
    i
}

pub(super) fn is_ident_char(c: char) -> bool {
    c.is_alphanumeric() || c == '_' || c == '$'
}

/// Whether `word` appears at `i` as a whole identifier.
pub(super) fn keyword_at(chars: &[char], i: usize, word: &str) -> bool {
    let len = word.chars().count();
    if i + len > chars.len() {
        return false;
    }
    if i > 0 && (is_ident_char(chars[i - 1]) || chars[i - 1] == '.') {
        return false;
    }
    if !chars[i..i + len].iter().copied().eq(word.chars()) {
        return false;
    }
    chars.get(i + len).map_or(true, |&c| !is_ident_char(c))
}

/// Nesting of template literals seen so far.
///
/// Each entry is the brace depth inside that literal's current
/// interpolation; `0` means the scanner is in the literal text.
#[derive(Default)]
pub(super) struct TemplateState {
    stack: Vec<i32>,
}

pub(super) enum HandleResult {
    /// Consumed by template handling; skip this many characters.
    Skip(usize),
    /// Code; process normally.
    Process,
}

impl TemplateState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn handle_char(&mut self, chars: &[char], i: usize) -> HandleResult {
        let Some(depth) = self.stack.last_mut() else {
            if chars[i] == '`' {
                self.stack.push(0);
                return HandleResult::Skip(1);
            }
            return HandleResult::Process;
        };

        if *depth == 0 {
            return match chars[i] {
                '\\' if i + 1 < chars.len() => HandleResult::Skip(2),
                '$' if chars.get(i + 1) == Some(&'{') => {
                    *depth = 1;
                    HandleResult::Skip(2)
                }
                '`' => {
                    self.stack.pop();
                    HandleResult::Skip(1)
                }
                _ => HandleResult::Skip(1),
            };
        }

        match chars[i] {
            '`' => {
                self.stack.push(0);
                HandleResult::Skip(1)
            }
            '{' => {
                *depth += 1;
                HandleResult::Process
            }
            '}' => {
                *depth -= 1;
                if *depth == 0 {
                    HandleResult::Skip(1)
                } else {
                    HandleResult::Process
                }
            }
            _ => HandleResult::Process,
        }
    }
}
