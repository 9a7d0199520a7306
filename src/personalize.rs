//! Message personalization: `{name}` / `{number}` placeholder substitution.

use std::sync::LazyLock;

use regex::{NoExpand, Regex};

use crate::contacts::Contact;

static NAME_TOKEN: LazyLock<Option<Regex>> = LazyLock::new(|| Regex::new(r"(?i)\{name\}").ok());
static NUMBER_TOKEN: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"(?i)\{number\}").ok());

/// Render `template` for a single contact.
///
/// Every case-insensitive `{name}` and `{number}` is replaced with the
/// contact's field. A missing contact renders both placeholders as empty
/// strings. An empty template renders as an empty string.
pub fn render(template: &str, contact: Option<&Contact>) -> String {
    if template.is_empty() {
        return String::new();
    }
    let (name, number) = contact.map_or(("", ""), |c| (c.name.as_str(), c.number.as_str()));
    let named = replace_all(&NAME_TOKEN, template, name);
    replace_all(&NUMBER_TOKEN, &named, number)
}

fn replace_all(token: &LazyLock<Option<Regex>>, haystack: &str, value: &str) -> String {
    match token.as_ref() {
        Some(re) => re.replace_all(haystack, NoExpand(value)).into_owned(),
        None => haystack.to_owned(),
    }
}
