//! `import lazy { .. } from "m"` rewriting.
//!
//! Only the named-specifier form is lazy; `import lazy from "m"` is an
//! ordinary default import of a binding called `lazy` and is left alone.

use tl_ast::{LAZY_ATTRIBUTE_KEY, LAZY_ATTRIBUTE_VALUE};

use super::util::{keyword_at, skip_non_code, skip_string, skip_whitespace, HandleResult, TemplateState};

struct LazyImport {
    /// Char range of the `lazy` keyword.
    keyword: (usize, usize),
    /// Char position where the attribute text goes.
    insert_at: usize,
    insert: String,
}

pub fn rewrite_lazy_imports(source: &str) -> String {
    let chars: Vec<char> = source.chars().collect();
    let found = find_lazy_imports(&chars);
    if found.is_empty() {
        return source.to_string();
    }
    tracing::trace!(count = found.len(), "rewriting lazy imports");

    let mut out = String::with_capacity(source.len() + found.len() * 24);
    let mut next = found.iter().peekable();
    for (i, &c) in chars.iter().enumerate() {
        if let Some(edit) = next.peek() {
            if i == edit.insert_at {
                out.push_str(&edit.insert);
                next.next();
            }
        }
        let blanked = found.iter().any(|edit| i >= edit.keyword.0 && i < edit.keyword.1);
        out.push(if blanked { ' ' } else { c });
    }
    if let Some(edit) = next.next() {
        debug_assert_eq!(edit.insert_at, chars.len());
        out.push_str(&edit.insert);
    }
    out
}

fn find_lazy_imports(chars: &[char]) -> Vec<LazyImport> {
    let mut found = Vec::new();
    let mut template_state = TemplateState::new();
    let mut i = 0;

    while i < chars.len() {
        match template_state.handle_char(chars, i) {
            HandleResult::Skip(n) => {
                i += n;
                continue;
            }
            HandleResult::Process => {}
        }

        if let Some(skip) = skip_non_code(chars, i) {
            i = skip;
            continue;
        }

        if keyword_at(chars, i, "import") {
            if let Some((edit, end)) = match_lazy_import(chars, i + "import".len()) {
                found.push(edit);
                i = end;
                continue;
            }
        }
        i += 1;
    }

    found
}

/// Match ` lazy { .. } from "m"` starting right after `import`.
///
/// Returns the edit and the position to resume scanning from.
fn match_lazy_import(chars: &[char], after_import: usize) -> Option<(LazyImport, usize)> {
    let lazy_start = skip_whitespace(chars, after_import);
    if lazy_start == after_import || !keyword_at(chars, lazy_start, "lazy") {
        return None;
    }
    let lazy_end = lazy_start + "lazy".len();

    let open = skip_whitespace(chars, lazy_end);
    if chars.get(open) != Some(&'{') {
        return None;
    }
    let close = matching_brace(chars, open)?;

    let from = skip_whitespace(chars, close + 1);
    if !keyword_at(chars, from, "from") {
        return None;
    }
    let quote = skip_whitespace(chars, from + "from".len());
    if !matches!(chars.get(quote), Some('"') | Some('\'')) {
        return None;
    }
    let source_end = skip_string(chars, quote);

    let attr = skip_whitespace(chars, source_end);
    let existing = ["with", "assert"].into_iter().find_map(|kw| {
        if !keyword_at(chars, attr, kw) {
            return None;
        }
        let brace = skip_whitespace(chars, attr + kw.len());
        (chars.get(brace) == Some(&'{')).then_some(brace)
    });

    let (insert_at, insert) = match existing {
        Some(brace) => (
            brace + 1,
            format!(" {LAZY_ATTRIBUTE_KEY}: \"{LAZY_ATTRIBUTE_VALUE}\","),
        ),
        None => (
            source_end,
            format!(" with {{ {LAZY_ATTRIBUTE_KEY}: \"{LAZY_ATTRIBUTE_VALUE}\" }}"),
        ),
    };

    Some((
        LazyImport {
            keyword: (lazy_start, lazy_end),
            insert_at,
            insert,
        },
        insert_at,
    ))
}

fn matching_brace(chars: &[char], open: usize) -> Option<usize> {
    let mut depth = 0usize;
    let mut i = open;
    while i < chars.len() {
        if let Some(skip) = skip_non_code(chars, i) {
            i = skip;
            continue;
        }
        match chars[i] {
            '{' => depth += 1,
            '}' => {
                depth -= 1;
                if depth == 0 {
                    return Some(i);
                }
            }
            _ => {}
        }
        i += 1;
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rewrites_named_lazy_import() {
        let out = rewrite_lazy_imports("import lazy { a, b as c } from \"./m\";\n");
        assert_eq!(
            out,
            "import      { a, b as c } from \"./m\" with { lazy: \"true\" };\n"
        );
    }

    #[test]
    fn keeps_offsets_before_the_attribute() {
        let src = "import lazy {x} from 'm'";
        let out = rewrite_lazy_imports(src);
        assert_eq!(&out[..src.len()], "import      {x} from 'm'");
        assert!(out.ends_with(" with { lazy: \"true\" }"));
    }

    #[test]
    fn default_import_named_lazy_is_untouched() {
        let src = "import lazy from \"m\";\nimport lazy, { a } from \"n\";";
        assert_eq!(rewrite_lazy_imports(src), src);
    }

    #[test]
    fn merges_into_existing_attributes() {
        let out = rewrite_lazy_imports("import lazy { a } from \"m\" with { type: \"json\" };");
        assert_eq!(
            out,
            "import      { a } from \"m\" with { lazy: \"true\", type: \"json\" };"
        );
    }

    #[test]
    fn ignores_strings_comments_and_templates() {
        let src = "// import lazy { a } from \"m\"\nconst s = \"import lazy { b } from 'n'\";\nconst t = `import lazy { c } from \"o\"`;\n";
        assert_eq!(rewrite_lazy_imports(src), src);
    }

    #[test]
    fn rewrites_every_occurrence() {
        let out = rewrite_lazy_imports("import lazy { a } from \"m\";\nimport { b } from \"n\";\nimport lazy { c } from \"o\";");
        assert_eq!(out.matches("lazy: \"true\"").count(), 2);
        assert!(out.contains("import { b } from \"n\";"));
    }
}
