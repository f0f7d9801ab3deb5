//! Normalized definitions.
//!
//! Output of the normalizer and input of the IR builder. Type names are
//! still the declared strings here; the builder resolves them to
//! [`ang_ir::TypeRef`]. Definitions whose shape is already final are
//! re-exported from the IR crate under their `*Def` names.

use std::collections::BTreeMap;

use ang_ir::{CachePolicy, FlowStep, Fsm, Index, MethodImpl, Pagination, RateLimit, SourceLoc, TestHints};

pub use ang_ir::Auth as AuthDef;
pub use ang_ir::ErrorDef;
pub use ang_ir::Notifications as NotificationsDef;
pub use ang_ir::Project as ProjectDef;
pub use ang_ir::Rbac as RbacDef;
pub use ang_ir::Scenario as ScenarioDef;
pub use ang_ir::Schedule as ScheduleDef;
pub use ang_ir::Target as TargetDef;
pub use ang_ir::Template as TemplateDef;
pub use ang_ir::View as ViewDef;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct FieldDef {
    pub name: String,
    /// Declared type string, e.g. `[]Order`.
    pub ty: String,
    pub optional: bool,
    pub default: Option<serde_json::Value>,
    pub validate: Option<String>,
    pub unique: bool,
    pub index: bool,
    pub primary_key: bool,
    pub secret: bool,
    pub pii: bool,
    pub env: Option<String>,
    pub enum_values: Vec<String>,
    pub source: SourceLoc,
}

impl FieldDef {
    pub fn new(name: &str, ty: &str) -> Self {
        FieldDef {
            name: name.to_string(),
            ty: ty.to_string(),
            ..FieldDef::default()
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct EntityDef {
    pub name: String,
    pub description: String,
    pub owner: Option<String>,
    pub storage: Option<String>,
    pub dto_only: bool,
    pub fields: Vec<FieldDef>,
    pub fsm: Option<Fsm>,
    pub indexes: Vec<Index>,
    pub invariants: Vec<String>,
    pub source: SourceLoc,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct MethodDef {
    pub name: String,
    pub description: String,
    /// Name of the request entity.
    pub input: Option<String>,
    /// Name of the response entity.
    pub output: Option<String>,
    pub flow: Vec<FlowStep>,
    pub publishes: Vec<String>,
    pub throws: Vec<String>,
    pub cache: Option<CachePolicy>,
    pub idempotent: bool,
    pub implementation: Option<MethodImpl>,
    pub source: SourceLoc,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ServiceDef {
    pub name: String,
    pub description: String,
    pub methods: Vec<MethodDef>,
    pub publishes: Vec<String>,
    pub subscribes: BTreeMap<String, String>,
    pub uses: Vec<String>,
    pub source: SourceLoc,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct EndpointDef {
    pub method: String,
    pub path: String,
    pub service: String,
    pub rpc: String,
    pub description: String,
    /// `jwt`, `api_key` or `none`.
    pub auth_type: String,
    pub roles: Vec<String>,
    pub permission: Option<String>,
    pub check: Option<String>,
    pub inject: Vec<String>,
    pub middleware: Vec<String>,
    pub rate_limit: Option<RateLimit>,
    pub timeout: Option<String>,
    pub cache: Option<CachePolicy>,
    pub invalidate: Vec<String>,
    pub idempotent: bool,
    pub errors: Vec<String>,
    pub pagination: Option<Pagination>,
    pub test_hints: Option<TestHints>,
    pub messages: Vec<String>,
    pub room_param: Option<String>,
    pub source: SourceLoc,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct WhereDef {
    pub field: String,
    pub op: String,
    pub param: String,
    pub param_type: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct FinderDef {
    pub name: String,
    pub action: String,
    pub returns: Option<String>,
    pub select: Vec<String>,
    pub filters: Vec<WhereDef>,
    pub order_by: Option<String>,
    pub direction: Option<String>,
    pub limit: u32,
    pub for_update: bool,
    pub custom_sql: Option<String>,
    pub source: SourceLoc,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct RepositoryDef {
    pub entity: String,
    pub finders: Vec<FinderDef>,
    pub source: SourceLoc,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct EventDef {
    pub name: String,
    pub fields: Vec<FieldDef>,
    pub external: bool,
    pub source: SourceLoc,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ConfigDef {
    pub fields: Vec<FieldDef>,
}

/// Adjustments the infra sections impose on emission context.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ContextPatch {
    pub force_cache: bool,
    pub force_sql: bool,
    pub notification_muting: bool,
    /// Auth fields overridden by infra (`auth.service`, `auth.login_op`, ...).
    pub auth_overrides: BTreeMap<String, String>,
}

impl ContextPatch {
    pub fn merge(&mut self, other: ContextPatch) {
        self.force_cache |= other.force_cache;
        self.force_sql |= other.force_sql;
        self.notification_muting |= other.notification_muting;
        self.auth_overrides.extend(other.auth_overrides);
    }
}

/// Every definition the normalizer extracted in one run.
#[derive(Debug, Clone, Default)]
pub struct NormalizedSet {
    pub project: ProjectDef,
    pub targets: Vec<TargetDef>,
    pub entities: Vec<EntityDef>,
    pub services: Vec<ServiceDef>,
    pub endpoints: Vec<EndpointDef>,
    pub repos: Vec<RepositoryDef>,
    pub events: Vec<EventDef>,
    pub errors: Vec<ErrorDef>,
    pub schedules: Vec<ScheduleDef>,
    pub scenarios: Vec<ScenarioDef>,
    pub views: Vec<ViewDef>,
    pub rbac: Option<RbacDef>,
    /// `validation_errors` entries from the policies domain (`name: message`).
    pub policy_violations: Vec<String>,
    pub config: ConfigDef,
    pub auth: Option<AuthDef>,
    pub notifications: NotificationsDef,
    pub templates: Vec<TemplateDef>,
    pub context_patch: ContextPatch,
}

impl NormalizedSet {
    pub fn entity(&self, name: &str) -> Option<&EntityDef> {
        self.entities.iter().find(|e| e.name == name)
    }

    pub fn service(&self, name: &str) -> Option<&ServiceDef> {
        self.services.iter().find(|s| s.name == name)
    }
}
