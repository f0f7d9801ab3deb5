//! Infrastructure configuration: migrations tooling, compose, container
//! image and Kubernetes manifests.

use serde_json::{json, Value};

use super::{Emitter, Root};
use crate::context::snake;
use crate::error::CodegenError;

impl Emitter<'_> {
    /// `atlas.hcl` and `sqlc.yaml` when the target has SQL, plus
    /// `docker-compose.yml` and `Dockerfile`.
    pub fn emit_infra_configs(&mut self) -> Result<(), CodegenError> {
        if self.main().has_sql {
            self.emit(Root::Backend, "atlas.hcl", "infra/atlas.hcl.tmpl", &Value::Null)?;
            self.emit(Root::Backend, "sqlc.yaml", "infra/sqlc.yaml.tmpl", &Value::Null)?;
        }
        self.emit(
            Root::Backend,
            "docker-compose.yml",
            "infra/docker-compose.yml.tmpl",
            &Value::Null,
        )?;
        self.emit(Root::Backend, "Dockerfile", "infra/Dockerfile.tmpl", &Value::Null)
    }

    /// One deployment per service under microservices, otherwise one for
    /// the whole project.
    pub fn emit_k8s(&mut self) -> Result<(), CodegenError> {
        let project = snake(&self.main().project).replace('_', "-");
        let names: Vec<String> = if self.main().microservices {
            self.schema()
                .services
                .iter()
                .map(|s| snake(&s.name).replace('_', "-"))
                .collect()
        } else {
            vec![project.clone()]
        };
        for name in names {
            let ctx = json!({
                "name": name,
                "image": format!("{}/{}:latest", project, name),
            });
            let rel = format!("deploy/k8s/{}.yaml", name);
            self.emit(Root::Backend, &rel, "k8s/deployment.yaml.tmpl", &ctx)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::super::test_support::*;
    use ang_ir::Schema;

    #[test]
    fn sql_targets_get_migration_tooling() {
        let dir = tempfile::tempdir().unwrap();
        let mut schema = Schema::default();
        schema.project.name = "My Shop".into();
        let mut em = emitter(&schema, dir.path());
        em.emit_infra_configs().unwrap();
        em.emit_k8s().unwrap();
        let backend = dir.path().join("backend");
        assert!(backend.join("atlas.hcl").exists());
        assert!(backend.join("sqlc.yaml").exists());
        let compose = std::fs::read_to_string(backend.join("docker-compose.yml")).unwrap();
        assert!(compose.contains("POSTGRES_DB: my_shop"));
        assert!(!compose.contains("redis"));
        let deploy = std::fs::read_to_string(backend.join("deploy/k8s/my-shop.yaml")).unwrap();
        assert!(deploy.contains("image: my-shop/my-shop:latest"));
    }
}
