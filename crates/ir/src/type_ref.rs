//! Canonical type lattice.
//!
//! Source declarations name types with short strings (`string`, `[]Order`,
//! `map[string]int`, `Card | Wallet`). [`TypeRef::parse`] turns them into a
//! closed tree; [`fmt::Display`] prints the canonical spelling back, so
//! `parse(t.to_string()) == t` for every parsed `t`.

use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TypeRef {
    String,
    Int32,
    Int64,
    Float32,
    Float64,
    Bool,
    Time,
    Uuid,
    Json,
    Any,
    File,
    Array { item: Box<TypeRef> },
    Map { key: Box<TypeRef>, value: Box<TypeRef> },
    Entity { name: String },
    Union { variants: Vec<TypeRef> },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TypeParseError {
    pub input: String,
    pub message: String,
}

impl fmt::Display for TypeParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "invalid type '{}': {}", self.input, self.message)
    }
}

impl std::error::Error for TypeParseError {}

impl TypeRef {
    /// Parse a declared type string.
    pub fn parse(input: &str) -> Result<TypeRef, TypeParseError> {
        let mut parser = Parser {
            src: input.as_bytes(),
            pos: 0,
            input,
        };
        let ty = parser.union()?;
        parser.skip_ws();
        if parser.pos != parser.src.len() {
            return Err(parser.error("unexpected trailing input"));
        }
        Ok(ty)
    }

    pub fn entity(name: impl Into<String>) -> TypeRef {
        TypeRef::Entity { name: name.into() }
    }

    pub fn array(item: TypeRef) -> TypeRef {
        TypeRef::Array {
            item: Box::new(item),
        }
    }

    pub fn is_scalar(&self) -> bool {
        !matches!(
            self,
            TypeRef::Array { .. } | TypeRef::Map { .. } | TypeRef::Entity { .. } | TypeRef::Union { .. }
        )
    }

    pub fn is_array(&self) -> bool {
        matches!(self, TypeRef::Array { .. })
    }

    /// Collect every entity name referenced anywhere in the type.
    pub fn entity_refs<'a>(&'a self, out: &mut Vec<&'a str>) {
        match self {
            TypeRef::Entity { name } => out.push(name),
            TypeRef::Array { item } => item.entity_refs(out),
            TypeRef::Map { key, value } => {
                key.entity_refs(out);
                value.entity_refs(out);
            }
            TypeRef::Union { variants } => {
                for v in variants {
                    v.entity_refs(out);
                }
            }
            _ => {}
        }
    }

    /// The entity name when this is `Entity` or an array of `Entity`.
    pub fn element_entity(&self) -> Option<&str> {
        match self {
            TypeRef::Entity { name } => Some(name),
            TypeRef::Array { item } => item.element_entity(),
            _ => None,
        }
    }

    fn scalar(name: &str) -> Option<TypeRef> {
        let ty = match name {
            "string" | "str" | "text" => TypeRef::String,
            "int" | "int64" | "integer" => TypeRef::Int64,
            "int32" => TypeRef::Int32,
            "float" | "float64" | "number" | "decimal" => TypeRef::Float64,
            "float32" => TypeRef::Float32,
            "bool" | "boolean" => TypeRef::Bool,
            "time" | "time.Time" | "datetime" | "timestamp" => TypeRef::Time,
            "uuid" => TypeRef::Uuid,
            "json" | "json.RawMessage" | "object" => TypeRef::Json,
            "any" | "interface{}" => TypeRef::Any,
            "file" => TypeRef::File,
            _ => return None,
        };
        Some(ty)
    }
}

impl fmt::Display for TypeRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TypeRef::String => f.write_str("string"),
            TypeRef::Int32 => f.write_str("int32"),
            TypeRef::Int64 => f.write_str("int64"),
            TypeRef::Float32 => f.write_str("float32"),
            TypeRef::Float64 => f.write_str("float64"),
            TypeRef::Bool => f.write_str("bool"),
            TypeRef::Time => f.write_str("time"),
            TypeRef::Uuid => f.write_str("uuid"),
            TypeRef::Json => f.write_str("json"),
            TypeRef::Any => f.write_str("any"),
            TypeRef::File => f.write_str("file"),
            TypeRef::Array { item } => match item.as_ref() {
                TypeRef::Union { .. } => write!(f, "[]({})", item),
                _ => write!(f, "[]{}", item),
            },
            TypeRef::Map { key, value } => match value.as_ref() {
                TypeRef::Union { .. } => write!(f, "map[{}]({})", key, value),
                _ => write!(f, "map[{}]{}", key, value),
            },
            TypeRef::Entity { name } => f.write_str(name),
            TypeRef::Union { variants } => {
                for (i, v) in variants.iter().enumerate() {
                    if i > 0 {
                        f.write_str(" | ")?;
                    }
                    write!(f, "{}", v)?;
                }
                Ok(())
            }
        }
    }
}

struct Parser<'a> {
    src: &'a [u8],
    pos: usize,
    input: &'a str,
}

impl<'a> Parser<'a> {
    fn error(&self, message: &str) -> TypeParseError {
        TypeParseError {
            input: self.input.to_string(),
            message: format!("{} at offset {}", message, self.pos),
        }
    }

    fn skip_ws(&mut self) {
        while self.pos < self.src.len() && self.src[self.pos].is_ascii_whitespace() {
            self.pos += 1;
        }
    }

    fn eat(&mut self, lit: &str) -> bool {
        self.skip_ws();
        if self.src[self.pos..].starts_with(lit.as_bytes()) {
            self.pos += lit.len();
            true
        } else {
            false
        }
    }

    fn union(&mut self) -> Result<TypeRef, TypeParseError> {
        let first = self.term()?;
        let mut variants = vec![first];
        while self.eat("|") {
            variants.push(self.term()?);
        }
        if variants.len() == 1 {
            Ok(variants.remove(0))
        } else {
            Ok(TypeRef::Union { variants })
        }
    }

    fn term(&mut self) -> Result<TypeRef, TypeParseError> {
        if self.eat("(") {
            let inner = self.union()?;
            if !self.eat(")") {
                return Err(self.error("expected ')'"));
            }
            return Ok(inner);
        }
        if self.eat("[]") {
            let item = self.term()?;
            return Ok(TypeRef::array(item));
        }
        if self.eat("map[") {
            let key = self.union()?;
            if !self.eat("]") {
                return Err(self.error("expected ']' after map key"));
            }
            let value = self.term()?;
            return Ok(TypeRef::Map {
                key: Box::new(key),
                value: Box::new(value),
            });
        }
        let ident = self.ident()?;
        if ident == "interface" && self.eat("{}") {
            return Ok(TypeRef::Any);
        }
        if let Some(scalar) = TypeRef::scalar(&ident) {
            return Ok(scalar);
        }
        let name = ident
            .strip_prefix("domain.")
            .map(str::to_string)
            .unwrap_or(ident);
        Ok(TypeRef::Entity { name })
    }

    fn ident(&mut self) -> Result<String, TypeParseError> {
        self.skip_ws();
        let start = self.pos;
        while self.pos < self.src.len() {
            let c = self.src[self.pos];
            if c.is_ascii_alphanumeric() || c == b'_' || c == b'.' {
                self.pos += 1;
            } else {
                break;
            }
        }
        if start == self.pos {
            return Err(self.error("expected type name"));
        }
        Ok(self.input[start..self.pos].to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_scalars_and_aliases() {
        assert_eq!(TypeRef::parse("string").unwrap(), TypeRef::String);
        assert_eq!(TypeRef::parse("int").unwrap(), TypeRef::Int64);
        assert_eq!(TypeRef::parse("time.Time").unwrap(), TypeRef::Time);
        assert_eq!(TypeRef::parse("interface{}").unwrap(), TypeRef::Any);
    }

    #[test]
    fn parses_composites() {
        let ty = TypeRef::parse("map[string][]domain.Order").unwrap();
        assert_eq!(
            ty,
            TypeRef::Map {
                key: Box::new(TypeRef::String),
                value: Box::new(TypeRef::array(TypeRef::entity("Order"))),
            }
        );
        assert_eq!(ty.to_string(), "map[string][]Order");
    }

    #[test]
    fn union_round_trips_through_display() {
        let ty = TypeRef::parse("[](Card | Wallet)").unwrap();
        assert_eq!(ty.to_string(), "[](Card | Wallet)");
        assert_eq!(TypeRef::parse(&ty.to_string()).unwrap(), ty);
        let mut refs = Vec::new();
        ty.entity_refs(&mut refs);
        assert_eq!(refs, vec!["Card", "Wallet"]);
    }

    #[test]
    fn rejects_garbage() {
        assert!(TypeRef::parse("map[string").is_err());
        assert!(TypeRef::parse("").is_err());
        assert!(TypeRef::parse("string extra").is_err());
    }
}
