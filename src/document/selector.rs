//! Shorthand CSS selector to path expression translation

use crate::SelectorError;
use std::iter::Peekable;
use std::str::Chars;

/// Translates a shorthand CSS selector into a path expression
///
/// Input starting with `/` is already a path and is returned unchanged. The
/// first `@` starts an attribute step, so `a@href` selects the `href` values of
/// every `a` element.
///
/// Supported syntax: type and `*` selectors, `.class`, `#id`, `[attr]`,
/// `[attr=v]`, `[attr~=v]`, `[attr^=v]`, `[attr*=v]`, and the descendant
/// (whitespace) and child (`>`) combinators.
///
/// # Example
///
/// ```
/// use ripple_crawl::translate_selector;
///
/// assert_eq!(translate_selector("ul > li").unwrap(), "//ul/li");
/// assert_eq!(translate_selector("a@href").unwrap(), "//a/@href");
/// assert_eq!(translate_selector("/html/body").unwrap(), "/html/body");
/// ```
pub fn translate_selector(selector: &str) -> Result<String, SelectorError> {
    let selector = selector.trim();
    if selector.is_empty() {
        return Err(SelectorError::Empty);
    }
    if selector.starts_with('/') {
        return Ok(selector.to_string());
    }

    let (elements, attribute) = match selector.split_once('@') {
        Some((elements, attribute)) => (elements.trim(), Some(attribute.trim())),
        None => (selector, None),
    };

    let mut out = if elements.is_empty() {
        String::from("//")
    } else {
        translate_sequence(elements)?
    };

    if let Some(attribute) = attribute {
        if !is_ident(attribute) && attribute != "*" {
            return Err(SelectorError::Unsupported(format!("@{}", attribute)));
        }
        if !out.ends_with('/') {
            out.push('/');
        }
        out.push('@');
        out.push_str(attribute);
    }

    Ok(out)
}

/// Translates compound selectors joined by combinators
fn translate_sequence(selector: &str) -> Result<String, SelectorError> {
    let mut out = String::new();
    let mut chars = selector.chars().peekable();
    let mut first = true;

    loop {
        let mut separator = "//";
        let mut saw_space = skip_whitespace(&mut chars);
        if chars.peek() == Some(&'>') {
            chars.next();
            separator = "/";
            saw_space = true;
            skip_whitespace(&mut chars);
            if first || chars.peek().is_none() {
                return Err(SelectorError::Unsupported(selector.to_string()));
            }
        }

        if chars.peek().is_none() {
            break;
        }
        if !first && !saw_space {
            return Err(SelectorError::Unsupported(chars.collect()));
        }

        out.push_str(if first { "//" } else { separator });
        out.push_str(&translate_compound(&mut chars)?);
        first = false;
    }

    Ok(out)
}

fn skip_whitespace(chars: &mut Peekable<Chars<'_>>) -> bool {
    let mut skipped = false;
    while chars.peek().is_some_and(|c| c.is_whitespace()) {
        chars.next();
        skipped = true;
    }
    skipped
}

/// Translates one compound selector such as `div.note#main[lang]`
fn translate_compound(chars: &mut Peekable<Chars<'_>>) -> Result<String, SelectorError> {
    let mut out = match chars.peek() {
        Some('*') => {
            chars.next();
            "*".to_string()
        }
        Some(c) if is_ident_char(*c) => read_ident(chars),
        _ => "*".to_string(),
    };

    while let Some(&c) = chars.peek() {
        match c {
            '.' => {
                chars.next();
                let class = read_required_ident(chars, '.')?;
                out.push_str(&token_predicate("class", &class)?);
            }
            '#' => {
                chars.next();
                let id = read_required_ident(chars, '#')?;
                out.push_str(&format!("[@id={}]", literal(&id)?));
            }
            '[' => {
                chars.next();
                let mut inner = String::new();
                let mut quote: Option<char> = None;
                loop {
                    match chars.next() {
                        None => return Err(SelectorError::Unsupported(format!("[{}", inner))),
                        Some(c) if quote == Some(c) => {
                            quote = None;
                            inner.push(c);
                        }
                        Some(c) if quote.is_none() && (c == '\'' || c == '"') => {
                            quote = Some(c);
                            inner.push(c);
                        }
                        Some(']') if quote.is_none() => break,
                        Some(c) => inner.push(c),
                    }
                }
                out.push_str(&attribute_predicate(&inner)?);
            }
            c if c.is_whitespace() || c == '>' => break,
            _ => return Err(SelectorError::Unsupported(chars.collect())),
        }
    }

    Ok(out)
}

fn attribute_predicate(inner: &str) -> Result<String, SelectorError> {
    let unsupported = || SelectorError::Unsupported(format!("[{}]", inner));
    let inner = inner.trim();

    let Some(op_start) = inner.find(|c: char| matches!(c, '=' | '~' | '^' | '*' | '|' | '$'))
    else {
        return if is_ident(inner) {
            Ok(format!("[@{}]", inner))
        } else {
            Err(unsupported())
        };
    };

    let name = inner[..op_start].trim();
    if !is_ident(name) {
        return Err(unsupported());
    }

    let rest = &inner[op_start..];
    let (operator, raw_value) = match rest.find('=') {
        Some(eq) => (&rest[..eq + 1], rest[eq + 1..].trim()),
        None => return Err(unsupported()),
    };
    let value = unquote(raw_value).ok_or_else(unsupported)?;

    match operator {
        "=" => Ok(format!("[@{}={}]", name, literal(&value)?)),
        "~=" => token_predicate(name, &value),
        "^=" => Ok(format!("[starts-with(@{}, {})]", name, literal(&value)?)),
        "*=" => Ok(format!("[contains(@{}, {})]", name, literal(&value)?)),
        _ => Err(unsupported()),
    }
}

/// Predicate matching one whitespace-separated token of an attribute
fn token_predicate(attribute: &str, token: &str) -> Result<String, SelectorError> {
    Ok(format!(
        "[contains(concat(' ', normalize-space(@{}), ' '), {})]",
        attribute,
        literal(&format!(" {} ", token))?
    ))
}

/// Quotes a string literal, picking whichever quote it does not contain
fn literal(value: &str) -> Result<String, SelectorError> {
    if !value.contains('\'') {
        Ok(format!("'{}'", value))
    } else if !value.contains('"') {
        Ok(format!("\"{}\"", value))
    } else {
        Err(SelectorError::Unsupported(value.to_string()))
    }
}

fn unquote(raw: &str) -> Option<String> {
    let first = raw.chars().next()?;
    if first == '\'' || first == '"' {
        let inner = raw.strip_prefix(first)?.strip_suffix(first)?;
        Some(inner.to_string())
    } else if is_ident(raw) {
        Some(raw.to_string())
    } else {
        None
    }
}

fn read_ident(chars: &mut Peekable<Chars<'_>>) -> String {
    let mut out = String::new();
    while let Some(&c) = chars.peek() {
        if !is_ident_char(c) {
            break;
        }
        out.push(c);
        chars.next();
    }
    out
}

fn read_required_ident(
    chars: &mut Peekable<Chars<'_>>,
    marker: char,
) -> Result<String, SelectorError> {
    let ident = read_ident(chars);
    if ident.is_empty() {
        Err(SelectorError::Unsupported(marker.to_string()))
    } else {
        Ok(ident)
    }
}

fn is_ident_char(c: char) -> bool {
    c.is_alphanumeric() || c == '-' || c == '_'
}

fn is_ident(s: &str) -> bool {
    !s.is_empty() && s.chars().all(is_ident_char)
}
