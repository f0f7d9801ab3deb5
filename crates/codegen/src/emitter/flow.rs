//! Flow-to-Go translation for service implementations.
//!
//! Each [`FlowAction`] maps to a fixed Go statement shape. Arguments are Go
//! expressions written by the author (`req.Email`, `user.ID`) and are
//! emitted verbatim. Actions without a translation are reported back to the
//! caller so they end up in the Blind Spots report.

use std::collections::HashSet;
use std::fmt::Write as _;

use ang_ir::flow::walk_steps;
use ang_ir::{FlowAction, FlowStep, Method, Schema, Service, SourceLoc};

use crate::context::{camel, go_name};

/// Translated method body plus the actions that had no translation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GoBody {
    pub code: String,
    pub missing: Vec<(String, SourceLoc)>,
}

/// Service collaborators referenced by a set of flows.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FlowDeps {
    pub tx: bool,
    pub publisher: bool,
    pub cache: bool,
    pub limiter: bool,
    pub storage: bool,
    pub mailer: bool,
}

pub fn flow_deps(svc: &Service) -> FlowDeps {
    let mut deps = FlowDeps::default();
    for m in &svc.methods {
        walk_steps(&m.flow, &mut |step| match step.action {
            FlowAction::TxBlock | FlowAction::RepoGetForUpdate => deps.tx = true,
            FlowAction::EventPublish => deps.publisher = true,
            FlowAction::CacheGet | FlowAction::CacheSet => deps.cache = true,
            FlowAction::RateLimitCheck => deps.limiter = true,
            FlowAction::StorageUpload => deps.storage = true,
            FlowAction::MailerSend => deps.mailer = true,
            _ => {}
        });
        if !m.publishes.is_empty() {
            deps.publisher = true;
        }
        if m.implementation.as_ref().is_some_and(|i| i.requires_tx) {
            deps.tx = true;
        }
    }
    deps
}

/// Translate the body of `svc.method`.
pub fn translate_method(schema: &Schema, svc: &Service, method: &Method) -> GoBody {
    let mut t = Translator {
        schema,
        svc,
        has_output: method.output.is_some(),
        out: String::new(),
        indent: 1,
        tx_depth: 0,
        scopes: vec![HashSet::from(["req".to_string(), "resp".to_string(), "err".to_string()])],
        missing: Vec::new(),
    };
    if let Some(imp) = &method.implementation {
        if imp.lang.eq_ignore_ascii_case("go") {
            for line in imp.code.lines() {
                t.line(line.trim_end());
            }
            let returns = imp.code.lines().any(|l| l.trim_start().starts_with("return"));
            if !returns {
                let done = t.ret("nil");
                t.line(&done);
            }
            return t.finish();
        }
        t.missing.push(("impl".to_string(), imp.source.clone()));
    }
    if method.flow.is_empty() {
        if method.implementation.is_none() {
            t.missing.push(("impl".to_string(), method.source.clone()));
        }
        let stmt = t.ret(&format!("apperr.NotImplemented(\"{}.{}\")", svc.name, method.name));
        t.line(&stmt);
        return t.finish();
    }
    t.steps(&method.flow);
    let done = t.ret("nil");
    t.line(&done);
    t.finish()
}

struct Translator<'s> {
    schema: &'s Schema,
    svc: &'s Service,
    has_output: bool,
    out: String,
    indent: usize,
    tx_depth: usize,
    scopes: Vec<HashSet<String>>,
    missing: Vec<(String, SourceLoc)>,
}

fn expr(step: &FlowStep, key: &str) -> Option<String> {
    match step.args.get(key)? {
        serde_json::Value::String(s) if s.trim().is_empty() => None,
        serde_json::Value::String(s) => Some(s.trim().to_string()),
        serde_json::Value::Null => None,
        other => Some(other.to_string()),
    }
}

fn quoted(s: &str) -> String {
    serde_json::Value::String(s.to_string()).to_string()
}

/// Go expression for a duration literal like `30s` or `5m`; anything else
/// falls back to one minute.
pub fn go_duration(s: &str) -> String {
    let s = s.trim();
    let split = s.find(|c: char| !c.is_ascii_digit()).unwrap_or(s.len());
    let (num, unit) = s.split_at(split);
    let unit = match unit {
        "ms" => "time.Millisecond",
        "s" => "time.Second",
        "m" => "time.Minute",
        "h" => "time.Hour",
        _ => return "time.Minute".to_string(),
    };
    match num.parse::<u64>() {
        Ok(1) => unit.to_string(),
        Ok(n) => format!("{}*{}", n, unit),
        Err(_) => "time.Minute".to_string(),
    }
}

fn error_ctor(message: &str) -> String {
    let lower = message.to_ascii_lowercase();
    if lower.contains("access denied") || lower.contains("forbidden") {
        format!("apperr.Forbidden({})", quoted(message))
    } else {
        format!("apperr.BadRequest({})", quoted(message))
    }
}

impl<'s> Translator<'s> {
    fn finish(self) -> GoBody {
        GoBody {
            code: self.out,
            missing: self.missing,
        }
    }

    fn line(&mut self, s: &str) {
        if s.is_empty() {
            self.out.push('\n');
            return;
        }
        for _ in 0..self.indent {
            self.out.push('\t');
        }
        let _ = writeln!(self.out, "{}", s);
    }

    fn ret(&self, err: &str) -> String {
        if self.tx_depth > 0 || !self.has_output {
            format!("return {}", err)
        } else {
            format!("return resp, {}", err)
        }
    }

    fn declared(&self, name: &str) -> bool {
        self.scopes.iter().any(|s| s.contains(name))
    }

    fn declare(&mut self, name: &str) {
        if let Some(scope) = self.scopes.last_mut() {
            scope.insert(name.to_string());
        }
    }

    /// `:=` for a fresh simple name, `=` otherwise.
    fn bind_op(&mut self, name: &str) -> &'static str {
        if name.contains('.') || name == "_" || self.declared(name) {
            "="
        } else {
            self.declare(name);
            ":="
        }
    }

    fn open(&mut self, header: &str) {
        self.line(header);
        self.indent += 1;
        self.scopes.push(HashSet::new());
    }

    fn close(&mut self, footer: &str) {
        self.scopes.pop();
        self.indent = self.indent.saturating_sub(1);
        self.line(footer);
    }

    fn check_err(&mut self) {
        self.open("if err != nil {");
        let r = self.ret("err");
        self.line(&r);
        self.close("}");
    }

    fn steps(&mut self, steps: &[FlowStep]) {
        for step in steps {
            self.step(step);
        }
    }

    fn repo_field(source: &str) -> String {
        format!("s.{}Repo", camel(source))
    }

    fn step(&mut self, step: &FlowStep) {
        let source = step.arg_str("source").unwrap_or_default().to_string();
        match &step.action {
            FlowAction::RepoFind | FlowAction::RepoGet | FlowAction::RepoGetForUpdate => {
                let out = expr(step, "output").unwrap_or_else(|| camel(&source));
                let input = expr(step, "input").unwrap_or_else(|| "req.ID".to_string());
                let call = match (step.arg_str("finder"), &step.action) {
                    (Some(f), _) => go_name(f),
                    (None, FlowAction::RepoGetForUpdate) => "FindByIDForUpdate".to_string(),
                    (None, _) => "FindByID".to_string(),
                };
                let op = self.bind_pair(&out);
                self.line(&format!(
                    "{}, err {} {}.{}(ctx, {})",
                    out,
                    op,
                    Self::repo_field(&source),
                    call,
                    input
                ));
                self.check_err();
                if let Some(msg) = step.arg_str("error") {
                    self.open(&format!("if {} == nil {{", out));
                    let r = self.ret(&format!("apperr.NotFound({})", quoted(msg)));
                    self.line(&r);
                    self.close("}");
                }
            }
            FlowAction::RepoList | FlowAction::RepoQuery => {
                let out = expr(step, "output").unwrap_or_else(|| format!("{}List", camel(&source)));
                let call = step
                    .arg_str("finder")
                    .map(go_name)
                    .unwrap_or_else(|| "List".to_string());
                let args = match expr(step, "input") {
                    Some(i) => format!("ctx, {}", i),
                    None => "ctx".to_string(),
                };
                let op = self.bind_pair(&out);
                self.line(&format!(
                    "{}, err {} {}.{}({})",
                    out,
                    op,
                    Self::repo_field(&source),
                    call,
                    args
                ));
                self.check_err();
            }
            FlowAction::RepoSave | FlowAction::RepoDelete => {
                let verb = if step.action == FlowAction::RepoSave {
                    "Save"
                } else {
                    "Delete"
                };
                let input = expr(step, "input").unwrap_or_else(|| camel(&source));
                self.open(&format!(
                    "if err := {}.{}(ctx, {}); err != nil {{",
                    Self::repo_field(&source),
                    verb,
                    input
                ));
                let r = self.ret("err");
                self.line(&r);
                self.close("}");
            }
            FlowAction::MappingMap => {
                let Some(out) = expr(step, "output") else {
                    self.unsupported(step);
                    return;
                };
                let entity = step
                    .arg_str("entity")
                    .map(str::to_string)
                    .unwrap_or_else(|| go_name(&out));
                let op = self.bind_op(&out);
                let fields = step
                    .args
                    .get("data")
                    .or_else(|| step.args.get("fields"))
                    .and_then(|v| v.as_object())
                    .cloned()
                    .unwrap_or_default();
                if fields.is_empty() {
                    self.line(&format!("{} {} &domain.{}{{}}", out, op, entity));
                } else {
                    self.open(&format!("{} {} &domain.{}{{", out, op, entity));
                    for (k, v) in &fields {
                        let value = match v {
                            serde_json::Value::String(s) => s.clone(),
                            other => other.to_string(),
                        };
                        self.line(&format!("{}: {},", go_name(k), value));
                    }
                    self.close("}");
                }
            }
            FlowAction::MappingAssign => {
                let (Some(to), Some(value)) = (expr(step, "to"), expr(step, "value")) else {
                    self.unsupported(step);
                    return;
                };
                let op = self.bind_op(&to);
                self.line(&format!("{} {} {}", to, op, value));
            }
            FlowAction::LogicCheck => {
                let cond = step.condition().unwrap_or("true").to_string();
                let throw = step.arg_str("throw").unwrap_or("check failed").to_string();
                self.open(&format!("if !({}) {{", cond));
                let r = self.ret(&error_ctor(&throw));
                self.line(&r);
                self.close("}");
            }
            FlowAction::LogicCall => self.call(step),
            FlowAction::FlowIf => {
                let cond = step.condition().unwrap_or("true").to_string();
                self.open(&format!("if {} {{", cond));
                self.steps(&step.then_steps);
                if step.else_steps.is_empty() {
                    self.close("}");
                } else {
                    self.close("} else {");
                    self.indent += 1;
                    self.scopes.push(HashSet::new());
                    self.steps(&step.else_steps);
                    self.close("}");
                }
            }
            FlowAction::FlowFor => {
                let each = expr(step, "each").unwrap_or_else(|| "nil".to_string());
                let item = expr(step, "as").unwrap_or_else(|| "item".to_string());
                self.open(&format!("for _, {} := range {} {{", item, each));
                self.declare(&item);
                self.steps(&step.do_steps);
                self.close("}");
            }
            FlowAction::FlowBlock => {
                self.open("{");
                self.steps(&step.do_steps);
                self.close("}");
            }
            FlowAction::TxBlock => {
                self.open("if err := s.tx.WithinTx(ctx, func(ctx context.Context) error {");
                self.tx_depth += 1;
                self.steps(&step.do_steps);
                self.line("return nil");
                self.tx_depth -= 1;
                self.close("}); err != nil {");
                self.indent += 1;
                let r = self.ret("err");
                self.line(&r);
                self.indent -= 1;
                self.line("}");
            }
            FlowAction::FsmTransition => {
                let (Some(entity), Some(to)) = (expr(step, "entity"), step.arg_str("to")) else {
                    self.unsupported(step);
                    return;
                };
                self.open(&format!("if err := {}.TransitionTo({}); err != nil {{", entity, quoted(to)));
                let r = self.ret("apperr.BadRequest(err.Error())");
                self.line(&r);
                self.close("}");
            }
            FlowAction::EventPublish => {
                let name = step.arg_str("name").unwrap_or_default().to_string();
                let payload = expr(step, "payload").unwrap_or_else(|| "nil".to_string());
                self.open(&format!(
                    "if err := s.publisher.Publish(ctx, {}, {}); err != nil {{",
                    quoted(&name),
                    payload
                ));
                let r = self.ret("err");
                self.line(&r);
                self.close("}");
            }
            FlowAction::CacheGet => {
                let key = expr(step, "key").unwrap_or_else(|| "\"\"".to_string());
                let out = expr(step, "output").unwrap_or_else(|| "cached".to_string());
                let op = self.bind_pair(&out);
                self.line(&format!("{}, _ {} s.cache.Get(ctx, {})", out, op, key));
            }
            FlowAction::CacheSet => {
                let key = expr(step, "key").unwrap_or_else(|| "\"\"".to_string());
                let value = expr(step, "value").unwrap_or_else(|| "nil".to_string());
                let ttl = go_duration(step.arg_str("ttl").unwrap_or("5m"));
                self.line(&format!("_ = s.cache.Set(ctx, {}, {}, {})", key, value, ttl));
            }
            FlowAction::RateLimitCheck => {
                let key = expr(step, "key").unwrap_or_else(|| "\"\"".to_string());
                self.open(&format!("if !s.limiter.Allow(ctx, {}) {{", key));
                let r = self.ret("apperr.TooManyRequests()");
                self.line(&r);
                self.close("}");
            }
            FlowAction::StorageUpload => {
                let input = expr(step, "input").unwrap_or_else(|| "req.File".to_string());
                let out = expr(step, "output").unwrap_or_else(|| "url".to_string());
                let op = self.bind_pair(&out);
                self.line(&format!("{}, err {} s.storage.Upload(ctx, {})", out, op, input));
                self.check_err();
            }
            FlowAction::MailerSend => {
                let template = step.arg_str("template").unwrap_or_default().to_string();
                let to = expr(step, "to").unwrap_or_else(|| "\"\"".to_string());
                let data = expr(step, "data").unwrap_or_else(|| "nil".to_string());
                self.open(&format!(
                    "if err := s.mailer.Send(ctx, {}, {}, {}); err != nil {{",
                    quoted(&template),
                    to,
                    data
                ));
                let r = self.ret("err");
                self.line(&r);
                self.close("}");
            }
            FlowAction::Other(_) => self.unsupported(step),
        }
    }

    /// Bind operator for `x, err := ...`: `:=` declares `x` unless it is
    /// already in scope or a selector.
    fn bind_pair(&mut self, name: &str) -> &'static str {
        if name.contains('.') {
            return "=";
        }
        self.bind_op(name)
    }

    fn call(&mut self, step: &FlowStep) {
        let Some(target) = step.arg_str("method").or_else(|| step.arg_str("call")) else {
            self.unsupported(step);
            return;
        };
        let (svc_name, method_name) = match target.split_once('.') {
            Some((s, m)) => (s.to_string(), m.to_string()),
            None => (self.svc.name.clone(), target.to_string()),
        };
        let schema = self.schema;
        let Some(callee) = schema.method(&svc_name, &method_name) else {
            self.unsupported(step);
            return;
        };
        let receiver = if svc_name == self.svc.name {
            "s".to_string()
        } else {
            format!("s.{}", camel(&svc_name))
        };
        let mut args = vec!["ctx".to_string()];
        if callee.input.is_some() {
            args.push(expr(step, "input").unwrap_or_else(|| "req".to_string()));
        }
        let call = format!("{}.{}({})", receiver, method_name, args.join(", "));
        match (callee.output.is_some(), expr(step, "output")) {
            (true, Some(out)) => {
                let op = self.bind_pair(&out);
                self.line(&format!("{}, err {} {}", out, op, call));
                self.check_err();
            }
            (true, None) => {
                self.open(&format!("if _, err := {}; err != nil {{", call));
                let r = self.ret("err");
                self.line(&r);
                self.close("}");
            }
            (false, _) => {
                self.open(&format!("if err := {}; err != nil {{", call));
                let r = self.ret("err");
                self.line(&r);
                self.close("}");
            }
        }
    }

    fn unsupported(&mut self, step: &FlowStep) {
        let tag = step.action.as_str().to_string();
        self.line(&format!("// unsupported flow action: {}", tag));
        let r = self.ret(&format!("apperr.NotImplemented({})", quoted(&tag)));
        self.line(&r);
        self.missing.push((tag, step.source.clone()));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ang_ir::{Method, Service};

    fn login() -> (Schema, Service) {
        let method = Method {
            name: "Login".into(),
            input: Some("LoginRequest".into()),
            output: Some("LoginResponse".into()),
            flow: vec![
                FlowStep::new(FlowAction::RepoFind)
                    .with_arg("source", "User")
                    .with_arg("finder", "FindByEmail")
                    .with_arg("input", "req.Email")
                    .with_arg("output", "user")
                    .with_arg("error", "User not found"),
                FlowStep::new(FlowAction::LogicCheck)
                    .with_arg("condition", "user.Active")
                    .with_arg("throw", "Access denied"),
                FlowStep::new(FlowAction::MappingAssign)
                    .with_arg("to", "resp.Token")
                    .with_arg("value", "user.ID"),
            ],
            ..Method::default()
        };
        let svc = Service {
            name: "Auth".into(),
            methods: vec![method],
            ..Service::default()
        };
        let schema = Schema {
            services: vec![svc.clone()],
            ..Schema::default()
        };
        (schema, svc)
    }

    #[test]
    fn login_flow_translates() {
        let (schema, svc) = login();
        let body = translate_method(&schema, &svc, &svc.methods[0]);
        assert!(body.missing.is_empty());
        let expected = "\tuser, err := s.userRepo.FindByEmail(ctx, req.Email)\n\
\tif err != nil {\n\t\treturn resp, err\n\t}\n\
\tif user == nil {\n\t\treturn resp, apperr.NotFound(\"User not found\")\n\t}\n\
\tif !(user.Active) {\n\t\treturn resp, apperr.Forbidden(\"Access denied\")\n\t}\n\
\tresp.Token = user.ID\n\
\treturn resp, nil\n";
        assert_eq!(body.code, expected);
    }

    #[test]
    fn tx_blocks_return_plain_errors() {
        let mut tx = FlowStep::new(FlowAction::TxBlock);
        tx.do_steps.push(
            FlowStep::new(FlowAction::RepoSave)
                .with_arg("source", "Order")
                .with_arg("input", "order"),
        );
        let method = Method {
            name: "Place".into(),
            output: Some("PlaceResponse".into()),
            flow: vec![tx],
            ..Method::default()
        };
        let svc = Service {
            name: "Orders".into(),
            methods: vec![method],
            ..Service::default()
        };
        let body = translate_method(&Schema::default(), &svc, &svc.methods[0]);
        assert!(body.code.contains("\t\tif err := s.orderRepo.Save(ctx, order); err != nil {\n\t\t\treturn err\n"));
        assert!(body.code.contains("\t}); err != nil {\n\t\treturn resp, err\n\t}\n"));
        assert!(flow_deps(&svc).tx);
    }

    #[test]
    fn durations() {
        assert_eq!(go_duration("5m"), "5*time.Minute");
        assert_eq!(go_duration("1h"), "time.Hour");
        assert_eq!(go_duration("250ms"), "250*time.Millisecond");
        assert_eq!(go_duration("soon"), "time.Minute");
    }

    #[test]
    fn unknown_actions_are_reported() {
        let method = Method {
            name: "Audit".into(),
            flow: vec![FlowStep::new(FlowAction::parse("audit.Log"))],
            ..Method::default()
        };
        let svc = Service {
            name: "Ops".into(),
            methods: vec![method],
            ..Service::default()
        };
        let body = translate_method(&Schema::default(), &svc, &svc.methods[0]);
        assert_eq!(body.missing.len(), 1);
        assert_eq!(body.missing[0].0, "audit.Log");
        assert!(body.code.contains("return apperr.NotImplemented(\"audit.Log\")"));
    }

    #[test]
    fn method_without_flow_is_missing() {
        let method = Method {
            name: "Noop".into(),
            ..Method::default()
        };
        let svc = Service {
            name: "Ops".into(),
            methods: vec![method],
            ..Service::default()
        };
        let body = translate_method(&Schema::default(), &svc, &svc.methods[0]);
        assert_eq!(body.missing[0].0, "impl");
        assert_eq!(body.code, "\treturn apperr.NotImplemented(\"Ops.Noop\")\n");
    }
}
