//! Relaxed JSON reader with source positions.
//!
//! Accepts standard JSON plus `//` and `/* */` comments and trailing commas.
//! Every value is returned as a [`Node`] that remembers file, 1-based line and
//! column, and the dotted path from the document root.

use ang_ir::SourceLoc;

use super::node::{Node, NodeValue};
use super::LoadError;

pub fn parse(src: &str, file: &str) -> Result<Node, LoadError> {
    let mut p = Parser {
        chars: src.chars().collect(),
        pos: 0,
        line: 1,
        col: 1,
        file,
    };
    p.skip_trivia()?;
    let node = p.value(String::new())?;
    p.skip_trivia()?;
    if p.pos < p.chars.len() {
        return Err(p.error("unexpected trailing content"));
    }
    Ok(node)
}

struct Parser<'a> {
    chars: Vec<char>,
    pos: usize,
    line: u32,
    col: u32,
    file: &'a str,
}

fn child_path(parent: &str, key: &str) -> String {
    if parent.is_empty() {
        key.to_string()
    } else {
        format!("{}.{}", parent, key)
    }
}

impl<'a> Parser<'a> {
    fn error(&self, message: impl Into<String>) -> LoadError {
        LoadError::Parse {
            file: self.file.to_string(),
            line: self.line,
            column: self.col,
            message: message.into(),
        }
    }

    fn peek(&self) -> Option<char> {
        self.chars.get(self.pos).copied()
    }

    fn bump(&mut self) -> Option<char> {
        let c = self.chars.get(self.pos).copied()?;
        self.pos += 1;
        if c == '\n' {
            self.line += 1;
            self.col = 1;
        } else {
            self.col += 1;
        }
        Some(c)
    }

    fn loc(&self, path: &str) -> SourceLoc {
        SourceLoc {
            file: self.file.to_string(),
            line: self.line,
            column: self.col,
            path: path.to_string(),
        }
    }

    fn skip_trivia(&mut self) -> Result<(), LoadError> {
        loop {
            match self.peek() {
                Some(c) if c.is_whitespace() => {
                    self.bump();
                }
                Some('/') if self.chars.get(self.pos + 1) == Some(&'/') => {
                    while let Some(c) = self.peek() {
                        if c == '\n' {
                            break;
                        }
                        self.bump();
                    }
                }
                Some('/') if self.chars.get(self.pos + 1) == Some(&'*') => {
                    self.bump();
                    self.bump();
                    loop {
                        match self.bump() {
                            None => return Err(self.error("unterminated block comment")),
                            Some('*') if self.peek() == Some('/') => {
                                self.bump();
                                break;
                            }
                            Some(_) => {}
                        }
                    }
                }
                _ => return Ok(()),
            }
        }
    }

    fn value(&mut self, path: String) -> Result<Node, LoadError> {
        let loc = self.loc(&path);
        let value = match self.peek() {
            None => return Err(self.error("unexpected end of input")),
            Some('{') => self.object(&path)?,
            Some('[') => self.array(&path)?,
            Some('"') => NodeValue::String(self.string()?),
            Some(c) if c == '-' || c.is_ascii_digit() => self.number()?,
            Some(c) if c.is_ascii_alphabetic() => {
                let word = self.word();
                match word.as_str() {
                    "true" => NodeValue::Bool(true),
                    "false" => NodeValue::Bool(false),
                    "null" => NodeValue::Null,
                    other => return Err(self.error(format!("unexpected identifier '{}'", other))),
                }
            }
            Some(c) => return Err(self.error(format!("unexpected character '{}'", c))),
        };
        Ok(Node { value, loc })
    }

    fn object(&mut self, path: &str) -> Result<NodeValue, LoadError> {
        self.bump();
        let mut members: Vec<(String, Node)> = Vec::new();
        loop {
            self.skip_trivia()?;
            match self.peek() {
                Some('}') => {
                    self.bump();
                    return Ok(NodeValue::Object(members));
                }
                Some('"') => {}
                Some(c) if c.is_ascii_alphabetic() || c == '_' || c == '@' => {}
                _ => return Err(self.error("expected object key or '}'")),
            }
            let key = if self.peek() == Some('"') {
                self.string()?
            } else {
                self.word()
            };
            if members.iter().any(|(k, _)| *k == key) {
                return Err(self.error(format!("duplicate key '{}'", key)));
            }
            self.skip_trivia()?;
            if self.bump() != Some(':') {
                return Err(self.error(format!("expected ':' after key '{}'", key)));
            }
            self.skip_trivia()?;
            let node = self.value(child_path(path, &key))?;
            members.push((key, node));
            self.skip_trivia()?;
            match self.peek() {
                Some(',') => {
                    self.bump();
                }
                Some('}') => {}
                _ => return Err(self.error("expected ',' or '}'")),
            }
        }
    }

    fn array(&mut self, path: &str) -> Result<NodeValue, LoadError> {
        self.bump();
        let mut items = Vec::new();
        loop {
            self.skip_trivia()?;
            if self.peek() == Some(']') {
                self.bump();
                return Ok(NodeValue::Array(items));
            }
            let item = self.value(format!("{}[{}]", path, items.len()))?;
            items.push(item);
            self.skip_trivia()?;
            match self.peek() {
                Some(',') => {
                    self.bump();
                }
                Some(']') => {}
                _ => return Err(self.error("expected ',' or ']'")),
            }
        }
    }

    fn word(&mut self) -> String {
        let mut s = String::new();
        while let Some(c) = self.peek() {
            if c.is_ascii_alphanumeric() || c == '_' || c == '@' || c == '-' {
                s.push(c);
                self.bump();
            } else {
                break;
            }
        }
        s
    }

    fn string(&mut self) -> Result<String, LoadError> {
        self.bump();
        let mut s = String::new();
        loop {
            match self.bump() {
                None | Some('\n') => return Err(self.error("unterminated string literal")),
                Some('"') => return Ok(s),
                Some('\\') => match self.bump() {
                    Some('"') => s.push('"'),
                    Some('\\') => s.push('\\'),
                    Some('/') => s.push('/'),
                    Some('n') => s.push('\n'),
                    Some('t') => s.push('\t'),
                    Some('r') => s.push('\r'),
                    Some('b') => s.push('\u{8}'),
                    Some('f') => s.push('\u{c}'),
                    Some('u') => {
                        let mut code = 0u32;
                        for _ in 0..4 {
                            let digit = self
                                .bump()
                                .and_then(|c| c.to_digit(16))
                                .ok_or_else(|| self.error("invalid \\u escape"))?;
                            code = code * 16 + digit;
                        }
                        s.push(char::from_u32(code).unwrap_or('\u{fffd}'));
                    }
                    _ => return Err(self.error("invalid escape sequence")),
                },
                Some(c) => s.push(c),
            }
        }
    }

    fn number(&mut self) -> Result<NodeValue, LoadError> {
        let mut text = String::new();
        while let Some(c) = self.peek() {
            if c.is_ascii_digit() || matches!(c, '-' | '+' | '.' | 'e' | 'E') {
                text.push(c);
                self.bump();
            } else {
                break;
            }
        }
        if let Ok(i) = text.parse::<i64>() {
            return Ok(NodeValue::Number(i.into()));
        }
        text.parse::<f64>()
            .ok()
            .and_then(serde_json::Number::from_f64)
            .map(NodeValue::Number)
            .ok_or_else(|| self.error(format!("invalid number '{}'", text)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_comments_and_trailing_commas() {
        let src = r#"{
  // users
  "User": {
    fields: { id: "uuid", email: "string", },
    /* soft delete */
    "@owner": "auth",
  },
}"#;
        let node = parse(src, "cue/domain/user.json").unwrap();
        let user = node.get("User").unwrap();
        assert_eq!(user.loc.line, 3);
        assert_eq!(user.loc.column, 11);
        let email = user.get("fields").and_then(|f| f.get("email")).unwrap();
        assert_eq!(email.as_str(), Some("string"));
        assert_eq!(email.loc.path, "User.fields.email");
        assert_eq!(user.get("@owner").and_then(Node::as_str), Some("auth"));
    }

    #[test]
    fn array_paths_use_indices() {
        let node = parse(r#"{"flow": [{"action": "repo.Find"}, {"action": "repo.Save"}]}"#, "f.json").unwrap();
        let steps = node.get("flow").and_then(Node::as_array).unwrap();
        assert_eq!(steps[1].loc.path, "flow[1]");
        assert_eq!(steps[1].get("action").unwrap().loc.path, "flow[1].action");
    }

    #[test]
    fn reports_position_of_errors() {
        let err = parse("{\n  \"a\": tru\n}", "bad.json").unwrap_err();
        match err {
            LoadError::Parse { line, file, .. } => {
                assert_eq!(line, 2);
                assert_eq!(file, "bad.json");
            }
            other => panic!("unexpected {:?}", other),
        }
        assert!(parse(r#"{"a": 1, "a": 2}"#, "dup.json").is_err());
    }
}
