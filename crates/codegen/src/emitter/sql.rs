//! SQL schema and query families, plus the repository contexts shared with
//! the Go repository adapters.

use serde_json::{json, Value};

use ang_ir::{Direction, Entity, Finder, FinderAction, PredicateOp, Repository, TypeRef};

use super::{Emitter, Root};
use crate::context::{camel, go_name, go_type, plural, snake, sql_type, table_name};
use crate::error::CodegenError;

/// Result shape of a finder.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Shape {
    One,
    Many,
    Count,
    Exists,
    Delete,
}

fn shape(f: &Finder) -> Shape {
    match f.action {
        FinderAction::Find | FinderAction::FindOne => {
            if f.returns.as_deref().is_some_and(|r| r.starts_with("[]") || r == "many") {
                Shape::Many
            } else {
                Shape::One
            }
        }
        FinderAction::List => Shape::Many,
        FinderAction::Count => Shape::Count,
        FinderAction::Exists => Shape::Exists,
        FinderAction::Delete => Shape::Delete,
    }
}

fn columns(e: &Entity) -> Vec<String> {
    e.fields.iter().map(|f| snake(&f.name)).collect()
}

/// `INSERT .. ON CONFLICT (id) DO UPDATE` covering every column.
pub(crate) fn upsert_sql(e: &Entity) -> String {
    let cols = columns(e);
    let placeholders: Vec<String> = (1..=cols.len()).map(|i| format!("${}", i)).collect();
    let updates: Vec<String> = cols
        .iter()
        .filter(|c| c.as_str() != "id")
        .map(|c| format!("{} = EXCLUDED.{}", c, c))
        .collect();
    let conflict = if updates.is_empty() {
        "DO NOTHING".to_string()
    } else {
        format!("DO UPDATE SET {}", updates.join(", "))
    };
    format!(
        "INSERT INTO {} ({}) VALUES ({}) ON CONFLICT (id) {}",
        table_name(&e.name),
        cols.join(", "),
        placeholders.join(", "),
        conflict
    )
}

fn finder_sql(e: &Entity, f: &Finder) -> String {
    if let Some(custom) = &f.custom_sql {
        return custom.trim().trim_end_matches(';').to_string();
    }
    let table = table_name(&e.name);
    let mut conds = Vec::new();
    for (i, p) in f.predicates.iter().enumerate() {
        let col = snake(&p.field);
        if p.op == PredicateOp::In {
            conds.push(format!("{} = ANY(${})", col, i + 1));
        } else {
            conds.push(format!("{} {} ${}", col, p.op.as_sql(), i + 1));
        }
    }
    let filter = if conds.is_empty() {
        String::new()
    } else {
        format!(" WHERE {}", conds.join(" AND "))
    };
    let select = if f.select.is_empty() {
        columns(e).join(", ")
    } else {
        f.select.iter().map(|s| snake(s)).collect::<Vec<_>>().join(", ")
    };
    let mut sql = match shape(f) {
        Shape::Count => format!("SELECT COUNT(*) FROM {}{}", table, filter),
        Shape::Exists => format!("SELECT EXISTS(SELECT 1 FROM {}{})", table, filter),
        Shape::Delete => format!("DELETE FROM {}{}", table, filter),
        Shape::One | Shape::Many => format!("SELECT {} FROM {}{}", select, table, filter),
    };
    if matches!(shape(f), Shape::One | Shape::Many) {
        if let Some(order) = &f.order_by {
            let dir = match order.direction {
                Direction::Asc => "ASC",
                Direction::Desc => "DESC",
            };
            sql.push_str(&format!(" ORDER BY {} {}", snake(&order.field), dir));
        }
        if shape(f) == Shape::One {
            sql.push_str(" LIMIT 1");
        } else if f.limit > 0 {
            sql.push_str(&format!(" LIMIT {}", f.limit));
        }
        if f.for_update {
            sql.push_str(" FOR UPDATE");
        }
    }
    sql
}

fn mongo_op(op: PredicateOp) -> Option<&'static str> {
    match op {
        PredicateOp::Eq => None,
        PredicateOp::Ne => Some("$ne"),
        PredicateOp::Lt => Some("$lt"),
        PredicateOp::Gt => Some("$gt"),
        PredicateOp::Le => Some("$lte"),
        PredicateOp::Ge => Some("$gte"),
        PredicateOp::In => Some("$in"),
    }
}

/// Finder context for the port, Postgres, Mongo and sqlc families.
pub(crate) fn finder_ctx(e: &Entity, f: &Finder) -> Value {
    let sh = shape(f);
    let params: Vec<Value> = f
        .predicates
        .iter()
        .map(|p| {
            let name = camel(&p.param);
            let ty = if p.op == PredicateOp::In && !matches!(p.param_ty, TypeRef::Array { .. }) {
                TypeRef::array(p.param_ty.clone())
            } else {
                p.param_ty.clone()
            };
            json!({"name": name, "go_type": go_type(&ty, Some("domain")), "arg": name})
        })
        .collect();
    let mongo_filter: Vec<String> = f
        .predicates
        .iter()
        .map(|p| {
            let key = Value::String(snake(&p.field)).to_string();
            let arg = camel(&p.param);
            match mongo_op(p.op) {
                None => format!("{}: {}", key, arg),
                Some(op) => format!("{}: bson.M{{\"{}\": {}}}", key, op, arg),
            }
        })
        .collect();
    let returns = match sh {
        Shape::One => format!("(*domain.{}, error)", e.name),
        Shape::Many => format!("([]domain.{}, error)", e.name),
        Shape::Count | Shape::Delete => "(int64, error)".to_string(),
        Shape::Exists => "(bool, error)".to_string(),
    };
    json!({
        "entity": e.name,
        "name": go_name(&f.name),
        "params": params,
        "returns": returns,
        "sql": finder_sql(e, f),
        "sqlc_kind": match sh {
            Shape::One | Shape::Count | Shape::Exists => "one",
            Shape::Many => "many",
            Shape::Delete => "execrows",
        },
        "mongo_filter": mongo_filter.join(", "),
        "is_one": sh == Shape::One,
        "is_many": sh == Shape::Many,
        "is_count": sh == Shape::Count,
        "is_exists": sh == Shape::Exists,
        "is_delete": sh == Shape::Delete,
    })
}

/// Repository context for one persisted entity.
pub(crate) fn repo_ctx(e: &Entity, repo: Option<&Repository>) -> Value {
    let finders: Vec<Value> = repo
        .map(|r| r.finders.iter().map(|f| finder_ctx(e, f)).collect())
        .unwrap_or_default();
    let scan: Vec<String> = e.fields.iter().map(|f| format!("&e.{}", go_name(&f.name))).collect();
    let save: Vec<String> = e.fields.iter().map(|f| format!("e.{}", go_name(&f.name))).collect();
    json!({
        "name": e.name,
        "camel": camel(&e.name),
        "plural": go_name(&plural(&e.name)),
        "table": table_name(&e.name),
        "columns": columns(e).join(", "),
        "scan_args": scan.join(", "),
        "save_args": save.join(", "),
        "upsert": upsert_sql(e),
        "finders": finders,
    })
}

fn table_ctx(e: &Entity) -> Value {
    let cols: Vec<Value> = e
        .fields
        .iter()
        .map(|f| {
            json!({
                "column": snake(&f.name),
                "sql_type": sql_type(&f.ty),
                "primary": f.name == "id" || f.constraints.primary_key,
                "optional": f.optional,
                "unique": f.constraints.unique,
            })
        })
        .collect();
    let table = table_name(&e.name);
    let mut indexes: Vec<Value> = e
        .fields
        .iter()
        .filter(|f| f.constraints.index && !f.constraints.unique)
        .map(|f| {
            json!({
                "name": format!("idx_{}_{}", table, snake(&f.name)),
                "columns": snake(&f.name),
                "unique": false,
            })
        })
        .collect();
    for idx in &e.indexes {
        let cols: Vec<String> = idx.fields.iter().map(|f| snake(f)).collect();
        let name = if idx.name.is_empty() {
            format!("idx_{}_{}", table, cols.join("_"))
        } else {
            idx.name.clone()
        };
        indexes.push(json!({"name": name, "columns": cols.join(", "), "unique": idx.unique}));
    }
    json!({"table": table, "columns": cols, "indexes": indexes})
}

impl<'a> Emitter<'a> {
    /// Entities backed by SQL on this target, in declaration order.
    pub(crate) fn sql_entities(&self) -> Vec<&'a Entity> {
        let main = self.main();
        self.schema()
            .persisted_entities()
            .filter(|e| main.store_for(e) == Some("sql"))
            .collect()
    }

    pub(crate) fn mongo_entities(&self) -> Vec<&'a Entity> {
        let main = self.main();
        self.schema()
            .persisted_entities()
            .filter(|e| main.store_for(e) == Some("mongo"))
            .collect()
    }

    /// `db/schema/schema.sql`.
    pub fn emit_sql_schema(&mut self) -> Result<(), CodegenError> {
        let tables: Vec<Value> = self.sql_entities().into_iter().map(table_ctx).collect();
        let refresh_tokens = self.main().has_auth;
        let ctx = json!({"tables": tables, "refresh_tokens": refresh_tokens});
        self.emit(Root::Backend, "db/schema/schema.sql", "sql/schema.sql.tmpl", &ctx)
    }

    /// `db/queries/<entity>.sql` for sqlc.
    pub fn emit_sql_queries(&mut self) -> Result<(), CodegenError> {
        let schema = self.schema();
        for e in self.sql_entities() {
            let ctx = repo_ctx(e, schema.repo_for(&e.name));
            let rel = format!("db/queries/{}.sql", snake(&e.name));
            self.emit(Root::Backend, &rel, "sql/queries.sql.tmpl", &ctx)?;
        }
        Ok(())
    }
}
