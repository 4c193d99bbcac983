//! Template resolution for mapping outputs.
//!
//! Two forms draw from the same variable set of a mapping application:
//!
//! - placeholders, `{name}` or `{name:arg}`, expanded anywhere in a string;
//!   `{$name}` reads a produced-UID variable such as `$parent`;
//! - macros, a whole value `$name` or `$name:arg`, which try the produced-UID
//!   variables first and then the plain ones.
//!
//! Text in braces that is not a well-formed variable name is left as is.

use unicode_normalization::UnicodeNormalization;
use unicode_normalization::char::is_combining_mark;

use crate::error::{MappingError, MappingResult};

/// Outcome of a variable lookup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Lookup {
    Found(String),
    /// The name is known but has no value in this context.
    Unresolved,
    Unknown,
}

/// The variables visible to one mapping application.
pub trait VariableScope {
    /// Plain variables: `title`, `pin-value`, metadata keys…
    fn variable(&self, name: &str, arg: Option<&str>) -> Lookup;
    /// Produced-UID variables: `parent`, `ancestor`, `item`, `group`, `facet`.
    fn uid_variable(&self, name: &str, arg: Option<&str>) -> Lookup;
}

/// Split `name:arg` into its parts.
pub fn split_name(spec: &str) -> (&str, Option<&str>) {
    match spec.split_once(':') {
        Some((name, arg)) => (name, Some(arg)),
        None => (spec, None),
    }
}

fn is_name(name: &str) -> bool {
    let mut chars = name.chars();
    chars.next().is_some_and(|c| c.is_ascii_alphabetic())
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_' || c == '.')
}

fn is_variable_spec(spec: &str) -> bool {
    let (name, arg) = split_name(spec);
    is_name(name) && arg.is_none_or(|a| !a.is_empty() && !a.contains(char::is_whitespace))
}

fn unknown(mapping: &str, name: &str) -> MappingError {
    MappingError::UnknownVariable {
        mapping: mapping.into(),
        name: name.into(),
    }
}

fn unresolved(mapping: &str, name: &str) -> MappingError {
    MappingError::UnresolvedMacro {
        mapping: mapping.into(),
        name: name.into(),
    }
}

fn resolve_placeholder(
    inner: &str,
    scope: &dyn VariableScope,
    mapping: &str,
) -> MappingResult<String> {
    if let Some(spec) = inner.strip_prefix('$') {
        let (name, arg) = split_name(spec);
        return match scope.uid_variable(name, arg) {
            Lookup::Found(value) => Ok(value),
            Lookup::Unresolved => Err(unresolved(mapping, inner)),
            Lookup::Unknown => Err(unknown(mapping, inner)),
        };
    }
    let (name, arg) = split_name(inner);
    match scope.variable(name, arg) {
        Lookup::Found(value) => Ok(value),
        Lookup::Unresolved | Lookup::Unknown => Err(unknown(mapping, inner)),
    }
}

/// Expand every placeholder in `template`.
pub fn expand(template: &str, scope: &dyn VariableScope, mapping: &str) -> MappingResult<String> {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;
    while let Some(start) = rest.find('{') {
        out.push_str(&rest[..start]);
        let after = &rest[start + 1..];
        let Some(end) = after.find('}') else {
            out.push('{');
            rest = after;
            continue;
        };
        let inner = &after[..end];
        let spec = inner.strip_prefix('$').unwrap_or(inner);
        if !is_variable_spec(spec) {
            out.push('{');
            rest = after;
            continue;
        }
        out.push_str(&resolve_placeholder(inner, scope, mapping)?);
        rest = &after[end + 1..];
    }
    out.push_str(rest);
    Ok(out)
}

/// Whether a whole value is a macro (`$name[:arg]`).
pub fn is_macro(value: &str) -> bool {
    value
        .trim()
        .strip_prefix('$')
        .is_some_and(is_variable_spec)
}

/// Resolve a value that is either a macro or a placeholder template.
pub fn resolve_value(value: &str, scope: &dyn VariableScope, mapping: &str) -> MappingResult<String> {
    let trimmed = value.trim();
    let Some(spec) = trimmed.strip_prefix('$').filter(|s| is_variable_spec(s)) else {
        return expand(value, scope, mapping);
    };
    let (name, arg) = split_name(spec);
    match scope.uid_variable(name, arg) {
        Lookup::Found(uid) => Ok(uid),
        Lookup::Unresolved => Err(unresolved(mapping, trimmed)),
        Lookup::Unknown => match scope.variable(name, arg) {
            Lookup::Found(value) => Ok(value),
            Lookup::Unresolved | Lookup::Unknown => Err(unknown(mapping, trimmed)),
        },
    }
}

/// A literal object after parsing its typed or tagged form.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LiteralValue {
    pub value: String,
    pub literal_type: Option<String>,
    pub language: Option<String>,
}

/// Parse `"value"^^type`, `"value"@lang`, `"value"` or a bare value.
pub fn parse_literal(text: &str) -> LiteralValue {
    let trimmed = text.trim();
    if let Some(body) = trimmed.strip_prefix('"')
        && let Some(close) = body.rfind('"')
    {
        let value = &body[..close];
        let suffix = &body[close + 1..];
        if suffix.is_empty() {
            return LiteralValue {
                value: value.into(),
                ..Default::default()
            };
        }
        if let Some(ty) = suffix.strip_prefix("^^").filter(|t| !t.is_empty()) {
            return LiteralValue {
                value: value.into(),
                literal_type: Some(ty.into()),
                language: None,
            };
        }
        if let Some(lang) = suffix.strip_prefix('@').filter(|l| !l.is_empty()) {
            return LiteralValue {
                value: value.into(),
                literal_type: None,
                language: Some(lang.into()),
            };
        }
    }
    LiteralValue {
        value: text.into(),
        ..Default::default()
    }
}

/// An item title split by the `[#uid]` / `[@prefix]` convention.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TitleParts {
    /// The title without the bracketed parts.
    pub title: String,
    pub uid: Option<String>,
    pub prefix: Option<String>,
}

/// Split bracketed UID and prefix markers out of a title.
pub fn parse_title(raw: &str) -> TitleParts {
    let mut parts = TitleParts::default();
    let mut title = String::with_capacity(raw.len());
    let mut rest = raw;
    while let Some(open) = rest.find('[') {
        let after = &rest[open + 1..];
        let marker = after.chars().next();
        let close = after.find(']');
        match (marker, close) {
            (Some(m @ ('#' | '@')), Some(close)) => {
                title.push_str(&rest[..open]);
                let value = after[1..close].trim().to_string();
                if m == '#' {
                    parts.uid = Some(value);
                } else {
                    parts.prefix = Some(value);
                }
                rest = &after[close + 1..];
            }
            _ => {
                title.push_str(&rest[..=open]);
                rest = after;
            }
        }
    }
    title.push_str(rest);
    parts.title = title.split_whitespace().collect::<Vec<_>>().join(" ");
    parts
}

/// Reduce a label to a UID-safe slug: lowercase, accents stripped,
/// alphanumerics and `-` kept, other runs collapsed to `_`.
pub fn slug(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut pending_separator = false;
    for c in text.nfd().filter(|c| !is_combining_mark(*c)) {
        if c.is_alphanumeric() || c == '-' {
            if pending_separator && !out.is_empty() {
                out.push('_');
            }
            pending_separator = false;
            out.extend(c.to_lowercase());
        } else {
            pending_separator = true;
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    struct Vars {
        plain: HashMap<&'static str, &'static str>,
        uids: HashMap<&'static str, Option<&'static str>>,
    }

    impl VariableScope for Vars {
        fn variable(&self, name: &str, arg: Option<&str>) -> Lookup {
            if name == "group-id" {
                let group = "lit/poetry";
                return match arg {
                    None => Lookup::Found(group.into()),
                    Some(n) => n
                        .parse::<usize>()
                        .ok()
                        .and_then(|n| group.split('/').nth(n.wrapping_sub(1)))
                        .map_or(Lookup::Unresolved, |c| Lookup::Found(c.into())),
                };
            }
            self.plain
                .get(name)
                .map_or(Lookup::Unknown, |v| Lookup::Found((*v).into()))
        }

        fn uid_variable(&self, name: &str, _arg: Option<&str>) -> Lookup {
            match self.uids.get(name) {
                Some(Some(uid)) => Lookup::Found((*uid).into()),
                Some(None) => Lookup::Unresolved,
                None => Lookup::Unknown,
            }
        }
    }

    fn vars() -> Vars {
        Vars {
            plain: HashMap::from([("pin-value", "Arezzo"), ("pin-eid", "ev1")]),
            uids: HashMap::from([("parent", Some("x:events/ev1")), ("facet", None)]),
        }
    }

    #[test]
    fn expands_placeholders() {
        let v = vars();
        assert_eq!(expand("x:events/{pin-eid}", &v, "m").unwrap(), "x:events/ev1");
        assert_eq!(expand("{group-id:2}", &v, "m").unwrap(), "poetry");
        assert_eq!(expand("of {$parent}", &v, "m").unwrap(), "of x:events/ev1");
        // Not a variable: kept verbatim.
        assert_eq!(expand("{ not a var }", &v, "m").unwrap(), "{ not a var }");
        assert_eq!(expand("open {", &v, "m").unwrap(), "open {");
    }

    #[test]
    fn unknown_placeholder_fails() {
        let v = vars();
        let err = expand("{pin-vlaue}", &v, "places").unwrap_err();
        assert!(matches!(err, MappingError::UnknownVariable { ref name, .. } if name == "pin-vlaue"));
    }

    #[test]
    fn macros_prefer_uid_variables() {
        let v = vars();
        assert_eq!(resolve_value("$parent", &v, "m").unwrap(), "x:events/ev1");
        assert_eq!(resolve_value("$pin-value", &v, "m").unwrap(), "Arezzo");
        assert!(matches!(
            resolve_value("$facet", &v, "m"),
            Err(MappingError::UnresolvedMacro { .. })
        ));
        assert_eq!(resolve_value("crm:P7_took_place_at", &v, "m").unwrap(), "crm:P7_took_place_at");
        assert!(is_macro(" $ancestor:2 "));
        assert!(!is_macro("$ x"));
    }

    #[test]
    fn literal_forms() {
        let typed = parse_literal("\"1250\"^^xsd:float");
        assert_eq!(typed.value, "1250");
        assert_eq!(typed.literal_type.as_deref(), Some("xsd:float"));

        let tagged = parse_literal("\"Arezzo\"@it");
        assert_eq!(tagged.language.as_deref(), Some("it"));

        let bare = parse_literal("plain text");
        assert_eq!(bare.value, "plain text");
        assert!(bare.literal_type.is_none() && bare.language.is_none());
    }

    #[test]
    fn title_markers_are_extracted() {
        let parts = parse_title("Letter to Guido [#x:letters/guido] [@x:letters/]");
        assert_eq!(parts.title, "Letter to Guido");
        assert_eq!(parts.uid.as_deref(), Some("x:letters/guido"));
        assert_eq!(parts.prefix.as_deref(), Some("x:letters/"));

        let plain = parse_title("Notes [draft]");
        assert_eq!(plain.title, "Notes [draft]");
        assert!(plain.uid.is_none());
    }

    #[test]
    fn slugs() {
        assert_eq!(slug("Arezzo"), "arezzo");
        assert_eq!(slug("San Giovanni, Città"), "san_giovanni_citta");
        assert_eq!(slug("  --x--  "), "--x--");
        assert_eq!(slug("!!"), "");
    }
}
