//! Templates compiled into the crate, keyed by resolver name.

pub static BUILTIN_TEMPLATES: &[(&str, &str)] = &[
    (
        "go/auth.go.tmpl",
        include_str!("../../templates/go/auth.go.tmpl"),
    ),
    (
        "go/cached_service.go.tmpl",
        include_str!("../../templates/go/cached_service.go.tmpl"),
    ),
    (
        "go/config.go.tmpl",
        include_str!("../../templates/go/config.go.tmpl"),
    ),
    (
        "go/container.go.tmpl",
        include_str!("../../templates/go/container.go.tmpl"),
    ),
    (
        "go/contract_test.go.tmpl",
        include_str!("../../templates/go/contract_test.go.tmpl"),
    ),
    (
        "go/dto.go.tmpl",
        include_str!("../../templates/go/dto.go.tmpl"),
    ),
    (
        "go/e2e_test.go.tmpl",
        include_str!("../../templates/go/e2e_test.go.tmpl"),
    ),
    (
        "go/email_templates.go.tmpl",
        include_str!("../../templates/go/email_templates.go.tmpl"),
    ),
    (
        "go/entity.go.tmpl",
        include_str!("../../templates/go/entity.go.tmpl"),
    ),
    (
        "go/errors.go.tmpl",
        include_str!("../../templates/go/errors.go.tmpl"),
    ),
    (
        "go/events.go.tmpl",
        include_str!("../../templates/go/events.go.tmpl"),
    ),
    (
        "go/go.mod.tmpl",
        include_str!("../../templates/go/go.mod.tmpl"),
    ),
    (
        "go/handler.go.tmpl",
        include_str!("../../templates/go/handler.go.tmpl"),
    ),
    (
        "go/health.go.tmpl",
        include_str!("../../templates/go/health.go.tmpl"),
    ),
    (
        "go/logger.go.tmpl",
        include_str!("../../templates/go/logger.go.tmpl"),
    ),
    (
        "go/logging_middleware.go.tmpl",
        include_str!("../../templates/go/logging_middleware.go.tmpl"),
    ),
    (
        "go/mailer_port.go.tmpl",
        include_str!("../../templates/go/mailer_port.go.tmpl"),
    ),
    (
        "go/main.go.tmpl",
        include_str!("../../templates/go/main.go.tmpl"),
    ),
    (
        "go/metrics.go.tmpl",
        include_str!("../../templates/go/metrics.go.tmpl"),
    ),
    (
        "go/mongo_common.go.tmpl",
        include_str!("../../templates/go/mongo_common.go.tmpl"),
    ),
    (
        "go/mongo_repo.go.tmpl",
        include_str!("../../templates/go/mongo_repo.go.tmpl"),
    ),
    (
        "go/nats.go.tmpl",
        include_str!("../../templates/go/nats.go.tmpl"),
    ),
    (
        "go/postgres_common.go.tmpl",
        include_str!("../../templates/go/postgres_common.go.tmpl"),
    ),
    (
        "go/postgres_repo.go.tmpl",
        include_str!("../../templates/go/postgres_repo.go.tmpl"),
    ),
    (
        "go/publisher.go.tmpl",
        include_str!("../../templates/go/publisher.go.tmpl"),
    ),
    (
        "go/rbac.go.tmpl",
        include_str!("../../templates/go/rbac.go.tmpl"),
    ),
    (
        "go/redis.go.tmpl",
        include_str!("../../templates/go/redis.go.tmpl"),
    ),
    (
        "go/refresh_hybrid.go.tmpl",
        include_str!("../../templates/go/refresh_hybrid.go.tmpl"),
    ),
    (
        "go/refresh_memory.go.tmpl",
        include_str!("../../templates/go/refresh_memory.go.tmpl"),
    ),
    (
        "go/refresh_port.go.tmpl",
        include_str!("../../templates/go/refresh_port.go.tmpl"),
    ),
    (
        "go/refresh_postgres.go.tmpl",
        include_str!("../../templates/go/refresh_postgres.go.tmpl"),
    ),
    (
        "go/refresh_redis.go.tmpl",
        include_str!("../../templates/go/refresh_redis.go.tmpl"),
    ),
    (
        "go/repository_port.go.tmpl",
        include_str!("../../templates/go/repository_port.go.tmpl"),
    ),
    (
        "go/router.go.tmpl",
        include_str!("../../templates/go/router.go.tmpl"),
    ),
    (
        "go/s3.go.tmpl",
        include_str!("../../templates/go/s3.go.tmpl"),
    ),
    (
        "go/scheduler.go.tmpl",
        include_str!("../../templates/go/scheduler.go.tmpl"),
    ),
    (
        "go/service_impl.go.tmpl",
        include_str!("../../templates/go/service_impl.go.tmpl"),
    ),
    (
        "go/service_port.go.tmpl",
        include_str!("../../templates/go/service_port.go.tmpl"),
    ),
    (
        "go/smtp.go.tmpl",
        include_str!("../../templates/go/smtp.go.tmpl"),
    ),
    (
        "go/tracing.go.tmpl",
        include_str!("../../templates/go/tracing.go.tmpl"),
    ),
    (
        "go/views.go.tmpl",
        include_str!("../../templates/go/views.go.tmpl"),
    ),
    (
        "infra/Dockerfile.tmpl",
        include_str!("../../templates/infra/Dockerfile.tmpl"),
    ),
    (
        "infra/atlas.hcl.tmpl",
        include_str!("../../templates/infra/atlas.hcl.tmpl"),
    ),
    (
        "infra/docker-compose.yml.tmpl",
        include_str!("../../templates/infra/docker-compose.yml.tmpl"),
    ),
    (
        "infra/sqlc.yaml.tmpl",
        include_str!("../../templates/infra/sqlc.yaml.tmpl"),
    ),
    (
        "k8s/deployment.yaml.tmpl",
        include_str!("../../templates/k8s/deployment.yaml.tmpl"),
    ),
    (
        "mermaid/architecture.mmd.tmpl",
        include_str!("../../templates/mermaid/architecture.mmd.tmpl"),
    ),
    (
        "mermaid/erd.mmd.tmpl",
        include_str!("../../templates/mermaid/erd.mmd.tmpl"),
    ),
    (
        "python/config.py.tmpl",
        include_str!("../../templates/python/config.py.tmpl"),
    ),
    (
        "python/main.py.tmpl",
        include_str!("../../templates/python/main.py.tmpl"),
    ),
    (
        "python/models.py.tmpl",
        include_str!("../../templates/python/models.py.tmpl"),
    ),
    (
        "python/rbac.py.tmpl",
        include_str!("../../templates/python/rbac.py.tmpl"),
    ),
    (
        "python/requirements.txt.tmpl",
        include_str!("../../templates/python/requirements.txt.tmpl"),
    ),
    (
        "python/router.py.tmpl",
        include_str!("../../templates/python/router.py.tmpl"),
    ),
    (
        "python/sdk_client.py.tmpl",
        include_str!("../../templates/python/sdk_client.py.tmpl"),
    ),
    (
        "python/sdk_init.py.tmpl",
        include_str!("../../templates/python/sdk_init.py.tmpl"),
    ),
    (
        "python/security.py.tmpl",
        include_str!("../../templates/python/security.py.tmpl"),
    ),
    (
        "sql/queries.sql.tmpl",
        include_str!("../../templates/sql/queries.sql.tmpl"),
    ),
    (
        "sql/schema.sql.tmpl",
        include_str!("../../templates/sql/schema.sql.tmpl"),
    ),
    (
        "ts/admin_index.tsx.tmpl",
        include_str!("../../templates/ts/admin_index.tsx.tmpl"),
    ),
    (
        "ts/admin_page.tsx.tmpl",
        include_str!("../../templates/ts/admin_page.tsx.tmpl"),
    ),
    (
        "ts/client.ts.tmpl",
        include_str!("../../templates/ts/client.ts.tmpl"),
    ),
    (
        "ts/env.example.tmpl",
        include_str!("../../templates/ts/env.example.tmpl"),
    ),
    (
        "ts/form.tsx.tmpl",
        include_str!("../../templates/ts/form.tsx.tmpl"),
    ),
    (
        "ts/index.ts.tmpl",
        include_str!("../../templates/ts/index.ts.tmpl"),
    ),
    (
        "ts/service.ts.tmpl",
        include_str!("../../templates/ts/service.ts.tmpl"),
    ),
    (
        "ts/test_stub.test.ts.tmpl",
        include_str!("../../templates/ts/test_stub.test.ts.tmpl"),
    ),
    (
        "ts/types.ts.tmpl",
        include_str!("../../templates/ts/types.ts.tmpl"),
    ),
];
