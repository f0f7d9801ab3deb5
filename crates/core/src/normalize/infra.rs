//! Infrastructure sections of `cue/infra` and the registry that composes them.

use ang_ir::{AuthClaims, Channel, NotificationPolicy, RefreshStore};

use super::{NormalizeError, Normalizer};
use crate::defs::{AuthDef, ConfigDef, ContextPatch, NotificationsDef, TemplateDef};
use crate::error::{ContractError, ErrorCode};
use crate::loader::Node;

/// Typed result of every registered infra extractor.
#[derive(Debug, Clone, Default)]
pub struct InfraSections {
    pub config: ConfigDef,
    pub auth: Option<AuthDef>,
    pub notifications: NotificationsDef,
    pub templates: Vec<TemplateDef>,
    /// Provider named by the `cache` section (`redis`, ...).
    pub cache: Option<String>,
    /// Driver named by the `database` section (`postgres`, ...).
    pub database: Option<String>,
}

type Extractor = fn(&mut Normalizer, &Node, &mut InfraSections) -> Result<(), NormalizeError>;
type ContextHook = fn(&InfraSections, &mut ContextPatch);

struct InfraDef {
    key: &'static str,
    code: ErrorCode,
    op: &'static str,
    extract: Extractor,
    hook: Option<ContextHook>,
}

const INFRA_DEFS: &[InfraDef] = &[
    InfraDef {
        key: "auth",
        code: ErrorCode::CueInfraAuthParse,
        op: "extract auth",
        extract: |n, node, out| {
            out.auth = Some(n.extract_auth(node)?);
            Ok(())
        },
        hook: Some(|sections, patch| {
            let Some(auth) = &sections.auth else {
                return;
            };
            if matches!(auth.refresh_store, RefreshStore::Redis | RefreshStore::Hybrid) {
                patch.force_cache = true;
            }
            if auth.refresh_store == RefreshStore::Hybrid {
                patch.force_sql = true;
            }
            if let Some(service) = &auth.service {
                patch.auth_overrides.insert("service".to_string(), service.clone());
            }
        }),
    },
    InfraDef {
        key: "cache",
        code: ErrorCode::CueInfraLoad,
        op: "extract cache",
        extract: |_, node, out| {
            out.cache = node
                .as_str()
                .map(str::to_string)
                .or_else(|| node.str_field("provider"));
            Ok(())
        },
        hook: Some(|sections, patch| {
            if sections.cache.as_deref().is_some_and(|c| c != "none") {
                patch.force_cache = true;
            }
        }),
    },
    InfraDef {
        key: "config",
        code: ErrorCode::CueInfraConfigParse,
        op: "extract config",
        extract: |n, node, out| {
            out.config = n.extract_config(node)?;
            Ok(())
        },
        hook: None,
    },
    InfraDef {
        key: "database",
        code: ErrorCode::CueInfraLoad,
        op: "extract database",
        extract: |_, node, out| {
            out.database = node
                .as_str()
                .map(str::to_string)
                .or_else(|| node.str_field("driver"));
            Ok(())
        },
        hook: Some(|sections, patch| {
            if sections.database.is_some() {
                patch.force_sql = true;
            }
        }),
    },
    InfraDef {
        key: "email_templates",
        code: ErrorCode::CueInfraLoad,
        op: "extract email templates",
        extract: |n, node, out| {
            let templates = n.extract_email_templates(node)?;
            out.templates.extend(templates);
            Ok(())
        },
        hook: None,
    },
    InfraDef {
        key: "notifications",
        code: ErrorCode::CueInfraLoad,
        op: "extract notifications",
        extract: |n, node, out| {
            out.notifications = n.extract_notifications(node);
            Ok(())
        },
        hook: Some(|sections, patch| {
            if sections.notifications.muted {
                patch.notification_muting = true;
            }
        }),
    },
    InfraDef {
        key: "templates",
        code: ErrorCode::CueInfraLoad,
        op: "extract templates",
        extract: |n, node, out| {
            let templates = n.extract_templates(node)?;
            out.templates.extend(templates);
            Ok(())
        },
        hook: None,
    },
];

/// Ordered set of infra extractors (sorted by key).
pub struct InfraRegistry {
    defs: &'static [InfraDef],
}

impl Default for InfraRegistry {
    fn default() -> Self {
        InfraRegistry { defs: INFRA_DEFS }
    }
}

impl InfraRegistry {
    pub fn keys(&self) -> Vec<&'static str> {
        self.defs.iter().map(|d| d.key).collect()
    }

    /// Run every extractor whose section is present, then fold the context
    /// hooks into one patch.
    pub fn extract_all(
        &self,
        n: &mut Normalizer,
        infra: Option<&Node>,
    ) -> Result<(InfraSections, ContextPatch), ContractError> {
        let mut sections = InfraSections::default();
        if let Some(infra) = infra {
            n.check_fields(infra, &self.keys(), "infra");
            for def in self.defs {
                if let Some(node) = infra.get(def.key) {
                    (def.extract)(n, node, &mut sections)
                        .map_err(|e| ContractError::new(def.code, def.op, e))?;
                }
            }
        }
        let mut patch = ContextPatch::default();
        for hook in self.defs.iter().filter_map(|d| d.hook) {
            hook(&sections, &mut patch);
        }
        Ok((sections, patch))
    }
}

const AUTH_FIELDS: &[&str] = &[
    "algorithm",
    "issuer",
    "audience",
    "access_ttl",
    "refresh_ttl",
    "rotation",
    "refresh_store",
    "claims",
    "service",
    "login_op",
    "refresh_op",
    "logout_op",
];

const TEMPLATE_FIELDS: &[&str] = &[
    "channel",
    "engine",
    "subject",
    "subject_file",
    "body",
    "body_file",
    "text",
    "text_file",
    "html",
    "html_file",
];

impl Normalizer {
    pub fn extract_config(&mut self, node: &Node) -> Result<ConfigDef, NormalizeError> {
        let fields = self.fields(node, "config")?;
        Ok(ConfigDef { fields })
    }

    pub fn extract_auth(&mut self, node: &Node) -> Result<AuthDef, NormalizeError> {
        self.check_fields(node, AUTH_FIELDS, "auth");
        let store_raw = node.str_field("refresh_store").unwrap_or_default();
        let Some(refresh_store) = RefreshStore::parse(&store_raw) else {
            return Err(NormalizeError::invalid(
                node,
                format!(
                    "unknown refresh_store '{}' (expected memory, redis, postgres or hybrid)",
                    store_raw
                ),
            ));
        };
        let claims = node.get("claims");
        let claim = |key: &str, fallback: &str| {
            claims
                .and_then(|c| c.str_field(key))
                .unwrap_or_else(|| fallback.to_string())
        };
        Ok(AuthDef {
            algorithm: node.str_field("algorithm").unwrap_or_else(|| "HS256".to_string()),
            issuer: node.str_field("issuer").unwrap_or_default(),
            audience: node.str_field("audience").unwrap_or_default(),
            access_ttl: node.str_field("access_ttl").unwrap_or_else(|| "15m".to_string()),
            refresh_ttl: node.str_field("refresh_ttl").unwrap_or_else(|| "720h".to_string()),
            rotation: node.get("rotation").and_then(Node::as_bool).unwrap_or(true),
            refresh_store,
            claims: AuthClaims {
                user_id: claim("user_id", "sub"),
                roles: claim("roles", "roles"),
                permissions: claim("permissions", "perms"),
            },
            service: node.str_field("service"),
            login_op: node.str_field("login_op"),
            refresh_op: node.str_field("refresh_op"),
            logout_op: node.str_field("logout_op"),
        })
    }

    pub fn extract_notifications(&mut self, node: &Node) -> NotificationsDef {
        self.check_fields(node, &["muted", "channels", "policies"], "notifications");
        let channels = node
            .get("channels")
            .map(|c| {
                c.members()
                    .iter()
                    .map(|(name, ch)| Channel {
                        name: name.clone(),
                        kind: ch.str_field("kind").unwrap_or_else(|| name.clone()),
                        enabled: ch.get("enabled").and_then(Node::as_bool).unwrap_or(true),
                    })
                    .collect()
            })
            .unwrap_or_default();
        let policies = node
            .get("policies")
            .map(|p| {
                p.members()
                    .iter()
                    .map(|(name, pol)| NotificationPolicy {
                        name: name.clone(),
                        event: pol.str_field("event").unwrap_or_default(),
                        channel: pol.str_field("channel").unwrap_or_default(),
                        template: pol.str_field("template").unwrap_or_default(),
                    })
                    .collect()
            })
            .unwrap_or_default();
        NotificationsDef {
            muted: node.bool_field("muted"),
            channels,
            policies,
        }
    }

    pub fn extract_templates(&mut self, node: &Node) -> Result<Vec<TemplateDef>, NormalizeError> {
        let mut out = Vec::new();
        for (name, t) in node.members() {
            let channel = t.str_field("channel").unwrap_or_else(|| "email".to_string());
            out.push(self.template(name, t, &channel, "plain")?);
        }
        Ok(out)
    }

    pub fn extract_email_templates(&mut self, node: &Node) -> Result<Vec<TemplateDef>, NormalizeError> {
        let mut out = Vec::new();
        for (name, t) in node.members() {
            out.push(self.template(name, t, "email", "go_template")?);
        }
        Ok(out)
    }

    fn template(
        &mut self,
        name: &str,
        node: &Node,
        channel: &str,
        default_engine: &str,
    ) -> Result<TemplateDef, NormalizeError> {
        self.check_fields(node, TEMPLATE_FIELDS, &format!("template {}", name));
        let subject = self.template_part(name, node, "subject")?;
        let body = match self.template_part(name, node, "body")? {
            s if s.is_empty() => self.template_part(name, node, "text")?,
            s => s,
        };
        let html = self.template_part(name, node, "html")?;
        if body.is_empty() && html.is_empty() {
            return Err(NormalizeError::MissingTemplateBody {
                name: name.to_string(),
                field: "body".to_string(),
            });
        }
        Ok(TemplateDef {
            name: name.to_string(),
            channel: channel.to_string(),
            engine: node.str_field("engine").unwrap_or_else(|| default_engine.to_string()),
            subject,
            body,
            html,
        })
    }

    /// Inline content, else the `<field>_file` read relative to the project.
    fn template_part(&mut self, name: &str, node: &Node, field: &str) -> Result<String, NormalizeError> {
        if let Some(inline) = node.get(field).and_then(Node::as_str) {
            if !inline.trim().is_empty() {
                return Ok(inline.to_string());
            }
        }
        let Some(file) = node.str_field(&format!("{}_file", field)) else {
            return Ok(String::new());
        };
        let path = self.resolve_path(&file);
        std::fs::read_to_string(&path).map_err(|source| NormalizeError::TemplateFile {
            name: name.to_string(),
            path: path.display().to_string(),
            source,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::loader::parse_relaxed_json;

    #[test]
    fn hybrid_store_forces_cache_and_sql() {
        let node = parse_relaxed_json(
            r#"{"auth": {"refresh_store": "hybrid", "service": "Auth"},
                "notifications": {"muted": true}}"#,
            "cue/infra/infra.json",
        )
        .unwrap();
        let mut n = Normalizer::new(std::path::Path::new("."));
        let (sections, patch) = InfraRegistry::default().extract_all(&mut n, Some(&node)).unwrap();
        assert_eq!(sections.auth.unwrap().refresh_store, RefreshStore::Hybrid);
        assert!(patch.force_cache && patch.force_sql && patch.notification_muting);
        assert_eq!(patch.auth_overrides["service"], "Auth");
    }

    #[test]
    fn bad_refresh_store_is_auth_parse_error() {
        let node = parse_relaxed_json(r#"{"auth": {"refresh_store": "disk"}}"#, "i.json").unwrap();
        let mut n = Normalizer::new(std::path::Path::new("."));
        let err = InfraRegistry::default()
            .extract_all(&mut n, Some(&node))
            .unwrap_err();
        assert_eq!(err.code, ErrorCode::CueInfraAuthParse);
    }

    #[test]
    fn template_bodies_load_from_files() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("templates/email")).unwrap();
        std::fs::write(dir.path().join("templates/email/welcome.html"), "<p>Hi {{.Name}}</p>").unwrap();
        let node = parse_relaxed_json(
            r#"{"Welcome": {"subject": "Welcome", "html_file": "templates/email/welcome.html"},
                "Broken": {"subject": "x"}}"#,
            "cue/infra/email.json",
        )
        .unwrap();
        let mut n = Normalizer::new(dir.path());
        let err = n.extract_email_templates(&node).unwrap_err();
        assert!(matches!(err, NormalizeError::MissingTemplateBody { ref name, .. } if name == "Broken"));

        let only_welcome = parse_relaxed_json(
            r#"{"Welcome": {"subject": "Welcome", "html_file": "templates/email/welcome.html"}}"#,
            "cue/infra/email.json",
        )
        .unwrap();
        let templates = n.extract_email_templates(&only_welcome).unwrap();
        assert_eq!(templates[0].html, "<p>Hi {{.Name}}</p>");
        assert_eq!(templates[0].engine, "go_template");
    }
}
