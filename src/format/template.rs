//! `{placeholder}` substitution for summary and dedup key templates.
//!
//! `{{` and `}}` produce literal braces. Resolution never fails the caller:
//! it reports what went wrong and lets the formatter pick a fallback.

/// Result of resolving a template.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TemplateOutcome {
    Rendered(String),
    /// A placeholder named a field the lookup could not provide.
    MissingField(String),
    /// Unbalanced or empty braces.
    Malformed,
}

impl TemplateOutcome {
    pub fn rendered(self) -> Option<String> {
        match self {
            TemplateOutcome::Rendered(s) => Some(s),
            _ => None,
        }
    }
}

/// Substitute every `{name}` in `template` with `lookup(name)`.
pub fn render<F>(template: &str, lookup: F) -> TemplateOutcome
where
    F: Fn(&str) -> Option<String>,
{
    let mut out = String::with_capacity(template.len());
    let mut chars = template.chars().peekable();

    while let Some(c) = chars.next() {
        match c {
            '{' if chars.peek() == Some(&'{') => {
                chars.next();
                out.push('{');
            }
            '}' if chars.peek() == Some(&'}') => {
                chars.next();
                out.push('}');
            }
            '}' => return TemplateOutcome::Malformed,
            '{' => {
                let mut name = String::new();
                let mut closed = false;
                for n in chars.by_ref() {
                    if n == '}' {
                        closed = true;
                        break;
                    }
                    if n == '{' {
                        return TemplateOutcome::Malformed;
                    }
                    name.push(n);
                }
                if !closed || name.is_empty() {
                    return TemplateOutcome::Malformed;
                }
                match lookup(&name) {
                    Some(value) => out.push_str(&value),
                    None => return TemplateOutcome::MissingField(name),
                }
            }
            other => out.push(other),
        }
    }

    TemplateOutcome::Rendered(out)
}
