//! Flow variable scoping.
//!
//! A step may only read variables that are method inputs (`req`), builtins
//! or bound by an earlier step of the same or an enclosing list. Bindings
//! come from `output` and `flow.For`'s `as`; a plain `mapping.Assign` `to`
//! also binds. Bindings made inside `_do`, `_then` or `_else` stay there.

use ang_ir::{FlowAction, FlowStep, Method};

use super::refs::at;

const BUILTINS: &[&str] = &[
    "req", "resp", "ctx", "time", "uuid", "strings", "nil", "true", "false", "errors", "len",
];

/// Arguments read as variable references. `dotted_only` arguments are
/// checked only when they look like `var.Field`, since they also accept
/// bare literals.
const READS: &[(&str, bool)] = &[
    ("input", false),
    ("each", false),
    ("items", false),
    ("from", false),
    ("value", true),
    ("item", true),
    ("target", true),
    ("to", true),
];

/// Root identifier of an expression, when it names a variable.
fn root_var(expr: &str) -> Option<&str> {
    let expr = expr.trim();
    let end = expr
        .find(|c: char| !(c.is_ascii_alphanumeric() || c == '_'))
        .unwrap_or(expr.len());
    let ident = &expr[..end];
    ident
        .chars()
        .next()
        .filter(|c| c.is_ascii_lowercase())
        .map(|_| ident)
}

fn binding(step: &FlowStep) -> Option<&str> {
    match step.action {
        FlowAction::MappingAssign => step.arg_str("to").filter(|to| !to.contains('.')),
        _ => step.arg_str("output"),
    }
}

struct Checker<'a> {
    service: &'a str,
    method: &'a str,
    /// Every binding in preorder, with its position.
    all: Vec<(usize, &'a str)>,
    errors: &'a mut Vec<String>,
}

impl<'a> Checker<'a> {
    fn collect(&mut self, steps: &'a [FlowStep], counter: &mut usize) {
        for step in steps {
            *counter += 1;
            if let Some(name) = binding(step) {
                self.all.push((*counter, name));
            }
            if step.action == FlowAction::FlowFor {
                if let Some(var) = step.arg_str("as") {
                    self.all.push((*counter, var));
                }
            }
            for (_, nested) in step.children() {
                self.collect(nested, counter);
            }
        }
    }

    fn check(&mut self, steps: &'a [FlowStep], scope: &mut Vec<&'a str>, counter: &mut usize) {
        for step in steps {
            *counter += 1;
            let position = *counter;
            for &(arg, dotted_only) in READS {
                if step.action == FlowAction::MappingAssign && arg == "to" {
                    continue;
                }
                let Some(expr) = step.arg_str(arg) else {
                    continue;
                };
                if dotted_only && !expr.contains('.') {
                    continue;
                }
                let Some(var) = root_var(expr) else {
                    continue;
                };
                if BUILTINS.contains(&var) || scope.contains(&var) {
                    continue;
                }
                self.report(step, position, var);
            }
            if step.action == FlowAction::MappingAssign {
                if let Some(var) = step.arg_str("to").filter(|to| to.contains('.')).and_then(root_var) {
                    if !BUILTINS.contains(&var) && !scope.contains(&var) {
                        self.report(step, position, var);
                    }
                }
            }

            for (_, nested) in step.children() {
                let mut inner = scope.clone();
                if step.action == FlowAction::FlowFor {
                    inner.extend(step.arg_str("as"));
                }
                self.check(nested, &mut inner, counter);
            }
            if let Some(name) = binding(step) {
                scope.push(name);
            }
        }
    }

    fn report(&mut self, step: &FlowStep, position: usize, var: &str) {
        let later = self.all.iter().any(|&(pos, name)| name == var && pos >= position);
        let kind = if later {
            "forward reference to"
        } else if self.all.iter().any(|&(_, name)| name == var) {
            "out-of-scope variable"
        } else {
            "undefined variable"
        };
        self.errors.push(format!(
            "method {}.{} {}: {} '{}'{}",
            self.service,
            self.method,
            step.action,
            kind,
            var,
            at(&step.source)
        ));
    }
}

/// Report flow variables that are not in scope where they are read.
pub fn check_flow_scopes(service: &str, method: &Method, errors: &mut Vec<String>) {
    let mut checker = Checker {
        service,
        method: &method.name,
        all: Vec::new(),
        errors,
    };
    checker.collect(&method.flow, &mut 0);
    checker.check(&method.flow, &mut Vec::new(), &mut 0);
}

#[cfg(test)]
mod tests {
    use super::*;

    fn step(action: &str) -> FlowStep {
        FlowStep::new(FlowAction::parse(action))
    }

    fn errors_for(flow: Vec<FlowStep>) -> Vec<String> {
        let method = Method {
            name: "Update".into(),
            flow,
            ..Method::default()
        };
        let mut errors = Vec::new();
        check_flow_scopes("Orders", &method, &mut errors);
        errors
    }

    #[test]
    fn bound_outputs_are_visible_to_later_and_nested_steps() {
        let mut check = step("flow.If").with_arg("condition", "order.Total > 0");
        check.then_steps = vec![step("mapping.Assign").with_arg("to", "order.Status").with_arg("value", "\"paid\"")];
        let errors = errors_for(vec![
            step("repo.Find")
                .with_arg("source", "Order")
                .with_arg("input", "req.ID")
                .with_arg("output", "order"),
            check,
            step("repo.Save").with_arg("source", "Order").with_arg("input", "order"),
        ]);
        assert!(errors.is_empty(), "{:?}", errors);
    }

    #[test]
    fn forward_and_undefined_references_are_reported() {
        let errors = errors_for(vec![
            step("repo.Save").with_arg("source", "Order").with_arg("input", "order"),
            step("mapping.Map").with_arg("input", "draft").with_arg("output", "order"),
        ]);
        assert_eq!(errors.len(), 2);
        assert!(errors[0].contains("forward reference to 'order'"));
        assert!(errors[1].contains("undefined variable 'draft'"));
    }

    #[test]
    fn loop_variable_is_scoped_to_its_body() {
        let mut each = step("flow.For").with_arg("each", "req.Items").with_arg("as", "item");
        each.do_steps = vec![step("repo.Save").with_arg("source", "Item").with_arg("input", "item")];
        let errors = errors_for(vec![
            each,
            step("event.Publish").with_arg("name", "ItemsSaved").with_arg("input", "item"),
        ]);
        assert_eq!(errors.len(), 1);
        assert!(errors[0].contains("out-of-scope variable 'item'"), "{:?}", errors);
    }
}
