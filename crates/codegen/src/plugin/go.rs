//! Steps for Go targets.

use crate::capability::{Capability as C, Profile};
use crate::emitter::Emitter;
use crate::error::CodegenError;
use crate::step::{Step, StepRegistry};

use super::{BuildContext, TargetPlugin};

pub struct GoLegacyPlugin;

fn go(
    name: &str,
    key: &str,
    run: impl Fn(&mut Emitter<'_>) -> Result<(), CodegenError> + 'static,
) -> Step {
    Step::new(name, key, run).for_profile(Profile::GoLegacy)
}

fn no_auth(em: &Emitter<'_>) -> bool {
    em.schema().auth.is_none()
}

impl TargetPlugin for GoLegacyPlugin {
    fn name(&self) -> &'static str {
        "go_legacy"
    }

    fn register_steps(&self, r: &mut StepRegistry, ctx: &BuildContext<'_>) {
        // ── Core ──
        r.register(go("Config", "config", |em| em.emit_go_config()));
        r.register(go("Logger", "logger", |em| em.emit_go_logger()));
        r.register(go("RBAC", "rbac", |em| em.emit_go_rbac()).requires(&[C::Rbac]));
        r.register(go("Domain Entities", "domain", |em| em.emit_go_domain()));
        r.register(go("DTOs", "dto", |em| em.emit_go_dtos()));
        r.register(go("Service Ports", "service_port", |em| em.emit_go_service_ports()));

        // ── Transport ──
        r.register(go("HTTP Handlers", "http_handlers", |em| em.emit_go_http_handlers()).requires(&[C::Http]));
        r.register(go("Health Probes", "health", |em| em.emit_go_health()).requires(&[C::Http]));

        // ── Storage ──
        r.register(go("Repository Ports", "repository_port", |em| em.emit_go_repository_ports()));
        r.register(go("S3 Client", "s3_client", |em| em.emit_go_s3_client()).requires(&[C::Storage]));
        r.register(go("Postgres Repos", "postgres_repos", |em| em.emit_go_postgres_repos()).requires(&[C::Sql]));
        r.register(go("Postgres Common", "postgres_common", |em| em.emit_go_postgres_common()).requires(&[C::Sql]));
        r.register(go("Mongo Repos", "mongo_repos", |em| em.emit_go_mongo_repos()).requires(&[C::Mongo]));
        r.register(go("Mongo Common", "mongo_common", |em| em.emit_go_mongo_common()).requires(&[C::Mongo]));
        r.register(go("SQL Schema", "sql_schema", |em| em.emit_sql_schema()).requires(&[C::Sql]));
        r.register(go("Infra Configs", "infra_configs", |em| em.emit_infra_configs()));
        r.register(go("SQL Queries", "sql_queries", |em| em.emit_sql_queries()).requires(&[C::Sql]));
        r.register(go("Redis Client", "redis_client", |em| em.emit_go_redis_client()).requires(&[C::Cache]));

        // ── Auth ──
        r.register(go("Auth Package", "auth", |em| em.emit_go_auth()).requires(&[C::Auth]).skip_when(no_auth));
        for (name, kind, caps) in [
            ("Refresh Store Port", "port", &[C::Auth][..]),
            ("Refresh Store Memory", "memory", &[C::Auth][..]),
            ("Refresh Store Redis", "redis", &[C::Auth, C::Cache][..]),
            ("Refresh Store Postgres", "postgres", &[C::Auth, C::Sql][..]),
            ("Refresh Store Hybrid", "hybrid", &[C::Auth, C::Cache, C::Sql][..]),
        ] {
            let key = format!("refresh_store_{}", kind);
            r.register(
                go(name, &key, move |em| em.emit_go_refresh_store(kind))
                    .requires(caps)
                    .skip_when(no_auth),
            );
        }

        // ── Notifications ──
        r.register(go("Mailer Port", "mailer_port", |em| em.emit_go_mailer_port()).requires(&[C::Email]));
        r.register(go("SMTP Client", "smtp_client", |em| em.emit_go_smtp()).requires(&[C::Email]));
        r.register(
            go("Email Templates", "email_templates", |em| em.emit_go_email_templates())
                .requires(&[C::Email])
                .skip_when(|em| em.schema().templates.is_empty()),
        );

        // ── Events ──
        r.register(go("Events", "events", |em| em.emit_go_events()).requires(&[C::Events]));
        r.register(
            go("Scheduler", "scheduler", |em| em.emit_go_scheduler())
                .requires(&[C::Scheduler])
                .skip_when(|em| em.schema().schedules.is_empty()),
        );
        r.register(go("Publisher Interface", "publisher", |em| em.emit_go_publisher_port()).requires(&[C::Events]));
        r.register(go("NATS Adapter", "nats_adapter", |em| em.emit_go_nats_adapter()).requires(&[C::Events, C::Queue]));

        // ── Observability ──
        r.register(go("Metrics Middleware", "metrics", |em| em.emit_go_metrics_middleware()).requires(&[C::Http]));
        r.register(go("Logging Middleware", "logging", |em| em.emit_go_logging_middleware()).requires(&[C::Http]));

        // ── Errors, views and tests ──
        r.register(go("Errors", "errors", |em| em.emit_go_errors()));
        r.register(go("Views", "views", |em| em.emit_go_views()).requires(&[C::Views]));
        r.register(go("Contract Tests", "contract_tests", |em| em.emit_go_contract_tests()).requires(&[C::Http]));
        r.register(
            go("E2E Behavioral Tests", "e2e_tests", |em| em.emit_go_e2e_tests())
                .requires(&[C::Http])
                .skip_when(|em| em.schema().scenarios.is_empty()),
        );
        if ctx.test_stubs {
            r.register(go("Test Stubs", "test_stubs", |em| em.emit_test_stubs()).requires(&[C::FrontendSdk]));
        }

        // ── Frontend ──
        r.register(go("Frontend SDK", "frontend_sdk", |em| em.emit_frontend_sdk()).requires(&[C::FrontendSdk]));
        r.register(
            go("Frontend Components", "frontend_components", |em| em.emit_frontend_components())
                .requires(&[C::FrontendSdk]),
        );
        r.register(go("Frontend Admin", "frontend_admin", |em| em.emit_frontend_admin()).requires(&[C::FrontendAdmin]));
        if let Some(app) = ctx.frontend_app_dir.clone() {
            let copy_to = app.clone();
            r.register(
                go("Frontend SDK Copy", "frontend_sdk_copy", move |em| em.copy_frontend_sdk(&copy_to))
                    .requires(&[C::FrontendSdk]),
            );
            let env = ctx.frontend_env_path.clone();
            r.register(
                go("Frontend Env Example", "frontend_env_example", move |em| {
                    em.write_env_example(&app, env.as_deref())
                })
                .requires(&[C::FrontendSdk]),
            );
        }
        if let Some(admin_app) = ctx.frontend_admin_app_dir.clone() {
            r.register(
                go("Frontend Admin Copy", "frontend_admin_copy", move |em| em.copy_frontend_admin(&admin_app))
                    .requires(&[C::FrontendAdmin]),
            );
        }

        // ── Wiring ──
        r.register(go("Tracing", "tracing", |em| em.emit_go_tracing()));
        r.register(go("Service Impls", "service_impl", |em| em.emit_go_service_impls()));
        r.register(go("DI Container", "di_container", |em| em.emit_go_container()));
        r.register(go("Cached Services", "cached_services", |em| em.emit_go_cached_services()).requires(&[C::Cache]));
        r.register(go("K8s Manifests", "k8s", |em| em.emit_k8s()).requires(&[C::K8s]));
        r.register(go("Server Main", "server_main", |em| em.emit_go_server_main()));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ang_ir::{Schema, Target};

    #[test]
    fn post_generation_steps_need_an_app_dir() {
        let schema = Schema::default();
        let target = Target::default();
        let mut reg = StepRegistry::new();
        GoLegacyPlugin.register_steps(&mut reg, &BuildContext::new(&schema, &target));
        let names: Vec<&str> = reg.steps().iter().map(|s| s.name.as_str()).collect();
        assert!(!names.contains(&"Frontend SDK Copy"));
        assert!(!names.contains(&"Test Stubs"));
        assert_eq!(names.first(), Some(&"Config"));
        assert_eq!(names.last(), Some(&"Server Main"));
    }
}
