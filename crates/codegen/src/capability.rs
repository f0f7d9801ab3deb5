//! Target capability resolution.
//!
//! A target tuple (lang, framework, db, cache, queue, storage) maps to a
//! closed set of capabilities plus one emitter profile. Steps declare the
//! capabilities they need; the step registry skips steps whose needs are not
//! met. Resolution is pure: same target, same set.

use std::collections::BTreeSet;
use std::fmt;

use ang_core::{ContractError, ErrorCode};
use ang_ir::Target;
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum Capability {
    Http,
    Ws,
    Events,
    Sql,
    Mongo,
    Cache,
    Queue,
    Storage,
    Scheduler,
    Auth,
    Rbac,
    Views,
    Email,
    PythonSdk,
    FrontendSdk,
    FrontendAdmin,
    Mermaid,
    K8s,
    Openapi,
    Asyncapi,
    Manifest,
}

impl Capability {
    pub const ALL: &'static [Capability] = &[
        Capability::Http,
        Capability::Ws,
        Capability::Events,
        Capability::Sql,
        Capability::Mongo,
        Capability::Cache,
        Capability::Queue,
        Capability::Storage,
        Capability::Scheduler,
        Capability::Auth,
        Capability::Rbac,
        Capability::Views,
        Capability::Email,
        Capability::PythonSdk,
        Capability::FrontendSdk,
        Capability::FrontendAdmin,
        Capability::Mermaid,
        Capability::K8s,
        Capability::Openapi,
        Capability::Asyncapi,
        Capability::Manifest,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Capability::Http => "http",
            Capability::Ws => "ws",
            Capability::Events => "events",
            Capability::Sql => "sql",
            Capability::Mongo => "mongo",
            Capability::Cache => "cache",
            Capability::Queue => "queue",
            Capability::Storage => "storage",
            Capability::Scheduler => "scheduler",
            Capability::Auth => "auth",
            Capability::Rbac => "rbac",
            Capability::Views => "views",
            Capability::Email => "email",
            Capability::PythonSdk => "python-sdk",
            Capability::FrontendSdk => "frontend-sdk",
            Capability::FrontendAdmin => "frontend-admin",
            Capability::Mermaid => "mermaid",
            Capability::K8s => "k8s",
            Capability::Openapi => "openapi",
            Capability::Asyncapi => "asyncapi",
            Capability::Manifest => "manifest",
        }
    }
}

impl fmt::Display for Capability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Emitter family selected for a target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Profile {
    GoLegacy,
    PythonFastapi,
}

impl Profile {
    pub fn as_str(&self) -> &'static str {
        match self {
            Profile::GoLegacy => "go_legacy",
            Profile::PythonFastapi => "python_fastapi",
        }
    }

    /// Prefix for language-scoped artifact keys (`go:server_main`).
    pub fn lang(&self) -> &'static str {
        match self {
            Profile::GoLegacy => "go",
            Profile::PythonFastapi => "python",
        }
    }
}

impl fmt::Display for Profile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CapabilitySet {
    pub profile: Profile,
    caps: BTreeSet<Capability>,
}

impl CapabilitySet {
    pub fn new(profile: Profile, caps: impl IntoIterator<Item = Capability>) -> Self {
        CapabilitySet {
            profile,
            caps: caps.into_iter().collect(),
        }
    }

    pub fn has(&self, cap: Capability) -> bool {
        self.caps.contains(&cap)
    }

    pub fn has_all(&self, caps: &[Capability]) -> bool {
        caps.iter().all(|c| self.has(*c))
    }

    /// Capabilities from `required` that this set lacks, in input order.
    pub fn missing(&self, required: &[Capability]) -> Vec<Capability> {
        required.iter().copied().filter(|c| !self.has(*c)).collect()
    }

    pub fn insert(&mut self, cap: Capability) {
        self.caps.insert(cap);
    }

    pub fn iter(&self) -> impl Iterator<Item = Capability> + '_ {
        self.caps.iter().copied()
    }

    pub fn len(&self) -> usize {
        self.caps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.caps.is_empty()
    }
}

const HTTP_FRAMEWORKS: &[&str] = &[
    "chi", "echo", "fiber", "gin", "fastapi", "axum", "actix", "express", "fastify",
];

fn norm(s: &str) -> String {
    s.trim().to_ascii_lowercase()
}

/// Resolve the capability set for `target`.
pub fn resolve_target_capabilities(target: &Target) -> Result<CapabilitySet, ContractError> {
    let lang = norm(&target.lang);
    let framework = norm(&target.framework);
    let db = norm(&target.db);
    let cache = norm(&target.cache);
    let queue = norm(&target.queue);
    let storage = norm(&target.storage);

    let profile = match (lang.as_str(), framework.as_str(), db.as_str()) {
        ("go", _, _) => Profile::GoLegacy,
        ("python", "fastapi", "postgres") => Profile::PythonFastapi,
        _ => {
            return Err(ContractError::new(
                ErrorCode::EmitterCapabilityResolve,
                format!("resolve capabilities for target {}", target.name),
                format!("unsupported target profile: {}/{}/{}", lang, framework, db),
            ))
        }
    };
    let is_go = profile == Profile::GoLegacy;

    let mut caps = BTreeSet::new();
    let http = HTTP_FRAMEWORKS.contains(&framework.as_str());
    if http {
        caps.extend([
            Capability::Http,
            Capability::Rbac,
            Capability::Views,
            Capability::PythonSdk,
            Capability::FrontendSdk,
            Capability::FrontendAdmin,
            Capability::Openapi,
        ]);
    }
    if is_go {
        caps.extend([Capability::Ws, Capability::Scheduler, Capability::Email]);
    }
    if !queue.is_empty() && queue != "none" {
        caps.extend([Capability::Events, Capability::Queue, Capability::Asyncapi]);
    }
    match db.as_str() {
        "postgres" | "mysql" | "sqlite" => {
            caps.insert(Capability::Sql);
        }
        "mongodb" | "mongo" => {
            caps.insert(Capability::Mongo);
        }
        _ => {}
    }
    if matches!(cache.as_str(), "redis" | "memcached") {
        caps.insert(Capability::Cache);
    }
    if matches!(storage.as_str(), "s3" | "gcs" | "minio") {
        caps.insert(Capability::Storage);
    }
    if is_go || (lang == "python" && framework == "fastapi") {
        caps.insert(Capability::Auth);
    }
    caps.extend([Capability::Mermaid, Capability::K8s, Capability::Manifest]);

    Ok(CapabilitySet { profile, caps })
}
