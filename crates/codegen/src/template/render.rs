//! A small logic-less template engine.
//!
//! Templates are rendered against a `serde_json::Value` context built from
//! the IR. Supported tags:
//!
//! - `{{path}}`, `{{path | filter | filter}}` -- variable output
//! - `{{#each path}}..{{else}}..{{/each}}` -- iterate arrays (or objects)
//! - `{{#if path}}..{{else}}..{{/if}}`, `{{#unless path}}..{{/unless}}`
//! - `{{#with path}}..{{/with}}` -- push a scope
//! - `{{! comment }}`
//!
//! Paths are dotted (`service.name`); the first segment is looked up from
//! the innermost scope outwards. `.`/`this` is the current scope value and
//! `@index`, `@first`, `@last`, `@key` describe the innermost loop.
//!
//! A line holding only a section, `else` or comment tag is removed entirely,
//! so block tags can sit on their own lines without leaving blank lines.

use heck::{ToKebabCase, ToLowerCamelCase, ToShoutySnakeCase, ToSnakeCase, ToUpperCamelCase};
use serde_json::Value;

use crate::error::TemplateError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SectionKind {
    Each,
    If,
    Unless,
    With,
}

impl SectionKind {
    fn parse(s: &str) -> Option<SectionKind> {
        match s {
            "each" => Some(SectionKind::Each),
            "if" => Some(SectionKind::If),
            "unless" => Some(SectionKind::Unless),
            "with" => Some(SectionKind::With),
            _ => None,
        }
    }

    fn as_str(&self) -> &'static str {
        match self {
            SectionKind::Each => "each",
            SectionKind::If => "if",
            SectionKind::Unless => "unless",
            SectionKind::With => "with",
        }
    }
}

#[derive(Debug, Clone)]
enum Node {
    Text(String),
    Var {
        path: String,
        filters: Vec<String>,
        line: usize,
    },
    Section {
        kind: SectionKind,
        path: String,
        body: Vec<Node>,
        alt: Vec<Node>,
    },
}

#[derive(Debug, Clone)]
enum Token {
    Text(String),
    Tag { body: String, line: usize },
}

impl Token {
    fn is_standalone_kind(&self) -> bool {
        match self {
            Token::Tag { body, .. } => {
                body.starts_with('#') || body.starts_with('/') || body.starts_with('!') || body == "else"
            }
            Token::Text(_) => false,
        }
    }
}

/// A parsed template, reusable across contexts.
#[derive(Debug, Clone)]
pub struct Template {
    name: String,
    nodes: Vec<Node>,
}

impl Template {
    pub fn parse(name: &str, source: &str) -> Result<Template, TemplateError> {
        let mut tokens = tokenize(name, source)?;
        strip_standalone(&mut tokens);
        let mut iter = tokens.into_iter();
        let (nodes, end) = parse_nodes(name, &mut iter, None)?;
        if let Some((kind, line)) = end {
            return Err(parse_err(name, line, format!("unexpected close of '{}'", kind)));
        }
        Ok(Template {
            name: name.to_string(),
            nodes,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn render(&self, ctx: &Value) -> Result<String, TemplateError> {
        let mut out = String::new();
        let mut scopes = vec![Scope::root(ctx)];
        render_nodes(&self.name, &self.nodes, &mut scopes, &mut out)?;
        Ok(out)
    }
}

/// Parse and render in one call.
pub fn render(name: &str, source: &str, ctx: &Value) -> Result<String, TemplateError> {
    Template::parse(name, source)?.render(ctx)
}

fn parse_err(name: &str, line: usize, message: impl Into<String>) -> TemplateError {
    TemplateError::Parse {
        name: name.to_string(),
        line,
        message: message.into(),
    }
}

// ── Tokenizer ────────────────────────────────────────────────────────

fn tokenize(name: &str, source: &str) -> Result<Vec<Token>, TemplateError> {
    let mut tokens = Vec::new();
    let mut rest = source;
    let mut line = 1usize;
    while let Some(start) = rest.find("{{") {
        let (text, after) = rest.split_at(start);
        if !text.is_empty() {
            tokens.push(Token::Text(text.to_string()));
        }
        line += text.matches('\n').count();
        let Some(end) = after.find("}}") else {
            return Err(parse_err(name, line, "unterminated tag"));
        };
        let body = after[2..end].trim().to_string();
        tokens.push(Token::Tag { body, line });
        line += after[..end].matches('\n').count();
        rest = &after[end + 2..];
    }
    if !rest.is_empty() {
        tokens.push(Token::Text(rest.to_string()));
    }
    Ok(tokens)
}

/// Drop the indentation and line break around tags that stand alone on a
/// line. Standalone-ness is decided on the unmodified token stream first.
fn strip_standalone(tokens: &mut [Token]) {
    let standalone: Vec<bool> = (0..tokens.len())
        .map(|i| tokens[i].is_standalone_kind() && line_start_before(tokens, i) && line_end_after(tokens, i))
        .collect();
    for (i, &strip) in standalone.iter().enumerate() {
        if !strip {
            continue;
        }
        if i > 0 {
            if let Token::Text(t) = &mut tokens[i - 1] {
                let keep = t.trim_end_matches([' ', '\t']).len();
                t.truncate(keep);
            }
        }
        if let Some(Token::Text(t)) = tokens.get_mut(i + 1) {
            let head = t.trim_start_matches([' ', '\t']);
            let head = head
                .strip_prefix("\r\n")
                .or_else(|| head.strip_prefix('\n'))
                .unwrap_or(head);
            *t = head.to_string();
        }
    }
}

fn line_start_before(tokens: &[Token], i: usize) -> bool {
    match i.checked_sub(1).map(|j| &tokens[j]) {
        None => true,
        Some(Token::Text(t)) => {
            let tail = t.rsplit('\n').next().unwrap_or("");
            tail.chars().all(|c| c == ' ' || c == '\t') && (t.contains('\n') || i == 1)
        }
        Some(Token::Tag { .. }) => false,
    }
}

fn line_end_after(tokens: &[Token], i: usize) -> bool {
    match tokens.get(i + 1) {
        None => true,
        Some(Token::Text(t)) => {
            let head = t.trim_start_matches([' ', '\t']);
            (head.is_empty() && i + 2 == tokens.len()) || head.starts_with('\n') || head.starts_with("\r\n")
        }
        Some(Token::Tag { .. }) => false,
    }
}

// ── Parser ───────────────────────────────────────────────────────────

type SectionEnd = Option<(String, usize)>;

fn parse_nodes(
    name: &str,
    tokens: &mut std::vec::IntoIter<Token>,
    open: Option<SectionKind>,
) -> Result<(Vec<Node>, SectionEnd), TemplateError> {
    let mut nodes = Vec::new();
    while let Some(token) = tokens.next() {
        let (body, line) = match token {
            Token::Text(t) => {
                if !t.is_empty() {
                    nodes.push(Node::Text(t));
                }
                continue;
            }
            Token::Tag { body, line } => (body, line),
        };
        if body.starts_with('!') {
            continue;
        }
        if let Some(close) = body.strip_prefix('/') {
            return Ok((nodes, Some((close.trim().to_string(), line))));
        }
        if body == "else" {
            if open.is_none() {
                return Err(parse_err(name, line, "'else' outside a section"));
            }
            return Ok((nodes, Some(("else".to_string(), line))));
        }
        if let Some(section) = body.strip_prefix('#') {
            let mut parts = section.trim().splitn(2, char::is_whitespace);
            let keyword = parts.next().unwrap_or("");
            let path = parts.next().unwrap_or("").trim().to_string();
            let Some(kind) = SectionKind::parse(keyword) else {
                return Err(parse_err(name, line, format!("unknown section '{}'", keyword)));
            };
            if path.is_empty() {
                return Err(parse_err(name, line, format!("'#{}' needs a path", keyword)));
            }
            let (body_nodes, end) = parse_nodes(name, tokens, Some(kind))?;
            let (alt, end) = match end {
                Some((e, _)) if e == "else" => parse_nodes(name, tokens, Some(kind))?,
                other => (Vec::new(), other),
            };
            match end {
                Some((e, _)) if e == kind.as_str() => {}
                Some((e, l)) => {
                    return Err(parse_err(
                        name,
                        l,
                        format!("'{{{{/{}}}}}' closes '#{}'", e, kind.as_str()),
                    ))
                }
                None => {
                    return Err(parse_err(name, line, format!("unclosed '#{}'", kind.as_str())));
                }
            }
            nodes.push(Node::Section {
                kind,
                path,
                body: body_nodes,
                alt,
            });
            continue;
        }
        let mut pieces = body.split('|').map(str::trim);
        let path = pieces.next().unwrap_or("").to_string();
        if path.is_empty() {
            return Err(parse_err(name, line, "empty tag"));
        }
        nodes.push(Node::Var {
            path,
            filters: pieces.map(str::to_string).collect(),
            line,
        });
    }
    Ok((nodes, None))
}

// ── Renderer ─────────────────────────────────────────────────────────

struct Scope<'a> {
    value: &'a Value,
    index: Option<(usize, usize)>,
    key: Option<&'a str>,
}

impl<'a> Scope<'a> {
    fn root(value: &'a Value) -> Self {
        Scope {
            value,
            index: None,
            key: None,
        }
    }
}

fn lookup<'a>(scopes: &[Scope<'a>], path: &str) -> Value {
    if path == "." || path == "this" {
        return scopes.last().map(|s| s.value.clone()).unwrap_or(Value::Null);
    }
    if let Some(meta) = path.strip_prefix('@') {
        let Some(scope) = scopes.iter().rev().find(|s| s.index.is_some()) else {
            return Value::Null;
        };
        let (i, len) = scope.index.unwrap_or((0, 0));
        return match meta {
            "index" => Value::from(i),
            "first" => Value::Bool(i == 0),
            "last" => Value::Bool(i + 1 == len),
            "key" => scope.key.map(Value::from).unwrap_or(Value::Null),
            _ => Value::Null,
        };
    }
    let path = path.strip_prefix("this.").unwrap_or(path);
    let mut segments = path.split('.');
    let Some(head) = segments.next() else {
        return Value::Null;
    };
    let found = scopes
        .iter()
        .rev()
        .find_map(|s| s.value.as_object().and_then(|o| o.get(head)));
    let mut current = match found {
        Some(v) => v,
        None => return Value::Null,
    };
    for seg in segments {
        current = match current {
            Value::Object(o) => match o.get(seg) {
                Some(v) => v,
                None => return Value::Null,
            },
            Value::Array(a) => match seg.parse::<usize>().ok().and_then(|i| a.get(i)) {
                Some(v) => v,
                None => return Value::Null,
            },
            _ => return Value::Null,
        };
    }
    current.clone()
}

fn truthy(v: &Value) -> bool {
    match v {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().map(|f| f != 0.0).unwrap_or(true),
        Value::String(s) => !s.is_empty(),
        Value::Array(a) => !a.is_empty(),
        Value::Object(o) => !o.is_empty(),
    }
}

fn to_text(v: &Value) -> String {
    match v {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => n.to_string(),
        other => other.to_string(),
    }
}

fn apply_filter(template: &str, line: usize, filter: &str, value: Value) -> Result<Value, TemplateError> {
    let text = || to_text(&value);
    let out = match filter {
        "pascal" => text().to_upper_camel_case(),
        "camel" => text().to_lower_camel_case(),
        "snake" => text().to_snake_case(),
        "kebab" => text().to_kebab_case(),
        "shouty" => text().to_shouty_snake_case(),
        "upper" => text().to_uppercase(),
        "lower" => text().to_lowercase(),
        "trim" => text().trim().to_string(),
        "json" => value.to_string(),
        "quote" => Value::String(text()).to_string(),
        "len" => {
            let n = match &value {
                Value::Array(a) => a.len(),
                Value::Object(o) => o.len(),
                Value::String(s) => s.len(),
                _ => 0,
            };
            return Ok(Value::from(n));
        }
        other => {
            return Err(TemplateError::Render {
                name: template.to_string(),
                message: format!("line {}: unknown filter '{}'", line, other),
            })
        }
    };
    Ok(Value::String(out))
}

fn render_nodes<'a>(
    template: &str,
    nodes: &'a [Node],
    scopes: &mut Vec<Scope<'a>>,
    out: &mut String,
) -> Result<(), TemplateError> {
    for node in nodes {
        match node {
            Node::Text(t) => out.push_str(t),
            Node::Var {
                path,
                filters,
                line,
            } => {
                let mut value = lookup(scopes, path);
                for f in filters {
                    value = apply_filter(template, *line, f, value)?;
                }
                out.push_str(&to_text(&value));
            }
            Node::Section {
                kind,
                path,
                body,
                alt,
            } => {
                let value = lookup(scopes, path);
                render_section(template, *kind, &value, body, alt, scopes, out)?;
            }
        }
    }
    Ok(())
}

fn render_section<'a>(
    template: &str,
    kind: SectionKind,
    value: &Value,
    body: &'a [Node],
    alt: &'a [Node],
    scopes: &mut Vec<Scope<'a>>,
    out: &mut String,
) -> Result<(), TemplateError> {
    match kind {
        SectionKind::If | SectionKind::Unless => {
            let take = truthy(value) == (kind == SectionKind::If);
            render_nodes(template, if take { body } else { alt }, scopes, out)
        }
        SectionKind::With => {
            if !truthy(value) {
                return render_nodes(template, alt, scopes, out);
            }
            render_scoped(template, body, scopes, value, None, None, out)
        }
        SectionKind::Each => {
            let items: Vec<(Option<&str>, &Value)> = match value {
                Value::Array(a) => a.iter().map(|v| (None, v)).collect(),
                Value::Object(o) => o.iter().map(|(k, v)| (Some(k.as_str()), v)).collect(),
                _ => Vec::new(),
            };
            if items.is_empty() {
                return render_nodes(template, alt, scopes, out);
            }
            let len = items.len();
            for (i, (key, item)) in items.into_iter().enumerate() {
                render_scoped(template, body, scopes, item, Some((i, len)), key, out)?;
            }
            Ok(())
        }
    }
}

fn render_scoped(
    template: &str,
    body: &[Node],
    scopes: &[Scope<'_>],
    value: &Value,
    index: Option<(usize, usize)>,
    key: Option<&str>,
    out: &mut String,
) -> Result<(), TemplateError> {
    let mut inner: Vec<Scope<'_>> = scopes
        .iter()
        .map(|s| Scope {
            value: s.value,
            index: s.index,
            key: s.key,
        })
        .collect();
    inner.push(Scope { value, index, key });
    render_nodes(template, body, &mut inner, out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn variables_and_filters() {
        let out = render(
            "t",
            "type {{name | pascal}} struct { // {{name | snake}} {{missing}}",
            &json!({"name": "order item"}),
        )
        .unwrap();
        assert_eq!(out, "type OrderItem struct { // order_item ");
    }

    #[test]
    fn each_with_loop_metadata_and_outer_lookup() {
        let tpl = "{{#each fields}}{{pkg}}.{{name}}{{#unless @last}}, {{/unless}}{{/each}}";
        let out = render(
            "t",
            tpl,
            &json!({"pkg": "domain", "fields": [{"name": "A"}, {"name": "B"}]}),
        )
        .unwrap();
        assert_eq!(out, "domain.A, domain.B");
    }

    #[test]
    fn standalone_block_lines_vanish() {
        let tpl = "start\n{{#if on}}\n  yes\n{{else}}\n  no\n{{/if}}\nend\n";
        assert_eq!(render("t", tpl, &json!({"on": true})).unwrap(), "start\n  yes\nend\n");
        assert_eq!(render("t", tpl, &json!({"on": false})).unwrap(), "start\n  no\nend\n");
    }

    #[test]
    fn indented_each_keeps_body_indentation() {
        let tpl = "func() {\n\t{{#each items}}\n\tx := {{.}}\n\t{{/each}}\n}\n";
        let out = render("t", tpl, &json!({"items": [1, 2]})).unwrap();
        assert_eq!(out, "func() {\n\tx := 1\n\tx := 2\n}\n");
    }

    #[test]
    fn each_else_on_empty() {
        let out = render("t", "{{#each xs}}x{{else}}none{{/each}}", &json!({"xs": []})).unwrap();
        assert_eq!(out, "none");
    }

    #[test]
    fn parse_errors_carry_line() {
        let err = Template::parse("broken", "a\n{{#each xs}}\nb\n").unwrap_err();
        match err {
            TemplateError::Parse { line, message, .. } => {
                assert_eq!(line, 2);
                assert!(message.contains("unclosed"), "{}", message);
            }
            other => panic!("unexpected {other:?}"),
        }
        assert!(Template::parse("t", "{{#if a}}{{/each}}").is_err());
        assert!(Template::parse("t", "{{unterminated").is_err());
    }

    #[test]
    fn unknown_filter_is_a_render_error() {
        let err = render("t", "{{x | shout}}", &json!({"x": "a"})).unwrap_err();
        assert!(matches!(err, TemplateError::Render { .. }));
    }
}
