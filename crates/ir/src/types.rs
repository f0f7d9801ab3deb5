//! IR schema types.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::flow::FlowStep;
use crate::type_ref::TypeRef;

/// Location of a declaration in the input tree.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SourceLoc {
    pub file: String,
    pub line: u32,
    pub column: u32,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub path: String,
}

impl SourceLoc {
    pub fn is_known(&self) -> bool {
        !self.file.is_empty() && self.line > 0
    }
}

impl std::fmt::Display for SourceLoc {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}:{}", self.file, self.line, self.column)
    }
}

// ── Project and targets ──────────────────────────────────────────────

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Strategy {
    #[default]
    Monolith,
    Microservices,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BuildMode {
    #[default]
    InPlace,
    Release,
}

impl BuildMode {
    pub fn parse(s: &str) -> Option<BuildMode> {
        match s.trim().to_ascii_lowercase().as_str() {
            "in_place" | "in-place" | "inplace" => Some(BuildMode::InPlace),
            "release" => Some(BuildMode::Release),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            BuildMode::InPlace => "in_place",
            BuildMode::Release => "release",
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Project {
    pub name: String,
    pub version: String,
    /// Go module path used in generated imports.
    pub module: String,
    pub strategy: Strategy,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub build_mode: Option<BuildMode>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub plugins: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ui_provider: Option<String>,
}

/// A build target: language x framework x storage stack.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Target {
    pub name: String,
    pub lang: String,
    pub framework: String,
    pub db: String,
    pub cache: String,
    pub queue: String,
    pub storage: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output_dir: Option<String>,
}

impl Target {
    /// `lang/framework/db` triple used by target selectors.
    pub fn triple(&self) -> String {
        format!("{}/{}/{}", self.lang, self.framework, self.db)
    }
}

// ── Entities ─────────────────────────────────────────────────────────

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FieldConstraints {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub validate: Option<String>,
    #[serde(default)]
    pub unique: bool,
    #[serde(default)]
    pub index: bool,
    #[serde(default)]
    pub primary_key: bool,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub enum_values: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Field {
    pub name: String,
    #[serde(rename = "type")]
    pub ty: TypeRef,
    #[serde(default)]
    pub optional: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<serde_json::Value>,
    #[serde(default)]
    pub constraints: FieldConstraints,
    #[serde(default)]
    pub secret: bool,
    #[serde(default)]
    pub pii: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub env: Option<String>,
    #[serde(default)]
    pub source: SourceLoc,
}

impl Field {
    pub fn new(name: impl Into<String>, ty: TypeRef) -> Self {
        Field {
            name: name.into(),
            ty,
            optional: false,
            default: None,
            constraints: FieldConstraints::default(),
            secret: false,
            pii: false,
            env: None,
            source: SourceLoc::default(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Fsm {
    pub field: String,
    pub states: Vec<String>,
    pub transitions: BTreeMap<String, Vec<String>>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Index {
    pub name: String,
    pub fields: Vec<String>,
    #[serde(default)]
    pub unique: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Entity {
    pub name: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub description: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub owner: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub storage: Option<String>,
    #[serde(default)]
    pub dto_only: bool,
    pub fields: Vec<Field>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fsm: Option<Fsm>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub indexes: Vec<Index>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub invariants: Vec<String>,
    #[serde(default)]
    pub source: SourceLoc,
}

impl Entity {
    pub fn field(&self, name: &str) -> Option<&Field> {
        self.fields.iter().find(|f| f.name == name)
    }

    /// Request/response shapes are transport messages, not persisted entities.
    pub fn is_message(&self) -> bool {
        self.name.ends_with("Request") || self.name.ends_with("Response")
    }

    pub fn has_id(&self) -> bool {
        self.fields.iter().any(|f| f.name == "id")
    }

    pub fn is_persisted(&self) -> bool {
        !self.is_message() && !self.dto_only && self.has_id()
    }
}

// ── Services ─────────────────────────────────────────────────────────

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CachePolicy {
    pub ttl: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MethodImpl {
    pub lang: String,
    pub code: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub imports: Vec<String>,
    #[serde(default)]
    pub requires_tx: bool,
    #[serde(default)]
    pub source: SourceLoc,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Method {
    pub name: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub description: String,
    /// Entity name of the request shape.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub input: Option<String>,
    /// Entity name of the response shape.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub flow: Vec<FlowStep>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub publishes: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub throws: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cache: Option<CachePolicy>,
    #[serde(default)]
    pub idempotent: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub implementation: Option<MethodImpl>,
    #[serde(default)]
    pub source: SourceLoc,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceRequirements {
    pub sql: bool,
    pub mongo: bool,
    pub redis: bool,
    pub nats: bool,
    pub s3: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Service {
    pub name: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub description: String,
    pub methods: Vec<Method>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub publishes: Vec<String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub subscribes: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub uses: Vec<String>,
    #[serde(default)]
    pub requires: ServiceRequirements,
    #[serde(default)]
    pub source: SourceLoc,
}

impl Service {
    pub fn method(&self, name: &str) -> Option<&Method> {
        self.methods.iter().find(|m| m.name == name)
    }
}

// ── Events, errors ───────────────────────────────────────────────────

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Event {
    pub name: String,
    pub fields: Vec<Field>,
    /// Published by a system outside this project.
    #[serde(default)]
    pub external: bool,
    #[serde(default)]
    pub source: SourceLoc,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ErrorDef {
    pub name: String,
    pub code: i64,
    pub http_status: u16,
    pub message: String,
    #[serde(default)]
    pub source: SourceLoc,
}

// ── Endpoints ────────────────────────────────────────────────────────

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EndpointAuth {
    /// `jwt`, `api_key` or `none`.
    pub kind: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub roles: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub permission: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub check: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub inject: Vec<String>,
}

impl EndpointAuth {
    pub fn none() -> Self {
        EndpointAuth {
            kind: "none".to_string(),
            ..EndpointAuth::default()
        }
    }

    pub fn is_protected(&self) -> bool {
        self.kind != "none" && !self.kind.is_empty()
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RateLimit {
    pub rps: u32,
    pub burst: u32,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Pagination {
    /// `offset` or `cursor`.
    pub kind: String,
    pub default_limit: u32,
    pub max_limit: u32,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TestHints {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub happy_path: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub error_cases: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Endpoint {
    /// Upper-case verb: GET, POST, PUT, PATCH, DELETE or WS.
    pub method: String,
    pub path: String,
    pub service: String,
    pub rpc: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub description: String,
    pub auth: EndpointAuth,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub middleware: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rate_limit: Option<RateLimit>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cache: Option<CachePolicy>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub invalidate: Vec<String>,
    #[serde(default)]
    pub idempotent: bool,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub errors: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pagination: Option<Pagination>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub test_hints: Option<TestHints>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub messages: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub room_param: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub path_params: Vec<String>,
    #[serde(default)]
    pub source: SourceLoc,
}

impl Endpoint {
    pub fn is_ws(&self) -> bool {
        self.method == "WS"
    }
}

// ── Repositories ─────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PredicateOp {
    #[serde(rename = "=")]
    Eq,
    #[serde(rename = "!=")]
    Ne,
    #[serde(rename = "<")]
    Lt,
    #[serde(rename = ">")]
    Gt,
    #[serde(rename = "<=")]
    Le,
    #[serde(rename = ">=")]
    Ge,
    #[serde(rename = "IN")]
    In,
}

impl PredicateOp {
    /// Accepts symbolic and mnemonic spellings (`=`, `eq`, `gte`, `in`, ...).
    pub fn parse(s: &str) -> Option<PredicateOp> {
        let op = match s.trim().to_ascii_lowercase().as_str() {
            "" | "=" | "==" | "eq" => PredicateOp::Eq,
            "!=" | "<>" | "ne" | "neq" => PredicateOp::Ne,
            "<" | "lt" => PredicateOp::Lt,
            ">" | "gt" => PredicateOp::Gt,
            "<=" | "le" | "lte" => PredicateOp::Le,
            ">=" | "ge" | "gte" => PredicateOp::Ge,
            "in" => PredicateOp::In,
            _ => return None,
        };
        Some(op)
    }

    pub fn as_sql(&self) -> &'static str {
        match self {
            PredicateOp::Eq => "=",
            PredicateOp::Ne => "!=",
            PredicateOp::Lt => "<",
            PredicateOp::Gt => ">",
            PredicateOp::Le => "<=",
            PredicateOp::Ge => ">=",
            PredicateOp::In => "IN",
        }
    }
}

/// Query semantics picked for a finder from its strongest operator.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PredicateKind {
    #[default]
    None,
    Equality,
    Comparison,
    In,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Predicate {
    pub field: String,
    pub op: PredicateOp,
    pub param: String,
    #[serde(rename = "param_type")]
    pub param_ty: TypeRef,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    #[default]
    Asc,
    Desc,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderBy {
    pub field: String,
    pub direction: Direction,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FinderAction {
    #[default]
    Find,
    FindOne,
    List,
    Count,
    Exists,
    Delete,
}

impl FinderAction {
    pub fn parse(s: &str) -> Option<FinderAction> {
        let action = match s.trim().to_ascii_lowercase().as_str() {
            "" | "find" => FinderAction::Find,
            "find_one" | "one" | "get" => FinderAction::FindOne,
            "list" => FinderAction::List,
            "count" => FinderAction::Count,
            "exists" => FinderAction::Exists,
            "delete" => FinderAction::Delete,
            _ => return None,
        };
        Some(action)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Finder {
    pub name: String,
    pub action: FinderAction,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub returns: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub select: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub predicates: Vec<Predicate>,
    pub predicate_kind: PredicateKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub order_by: Option<OrderBy>,
    #[serde(default)]
    pub limit: u32,
    #[serde(default)]
    pub for_update: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub custom_sql: Option<String>,
    #[serde(default)]
    pub source: SourceLoc,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Repository {
    pub entity: String,
    pub finders: Vec<Finder>,
    #[serde(default)]
    pub source: SourceLoc,
}

// ── Infrastructure and security ──────────────────────────────────────

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Config {
    pub fields: Vec<Field>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RefreshStore {
    #[default]
    Memory,
    Redis,
    Postgres,
    Hybrid,
}

impl RefreshStore {
    pub fn parse(s: &str) -> Option<RefreshStore> {
        match s.trim().to_ascii_lowercase().as_str() {
            "" | "memory" => Some(RefreshStore::Memory),
            "redis" => Some(RefreshStore::Redis),
            "postgres" | "sql" => Some(RefreshStore::Postgres),
            "hybrid" => Some(RefreshStore::Hybrid),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AuthClaims {
    pub user_id: String,
    pub roles: String,
    pub permissions: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Auth {
    pub algorithm: String,
    pub issuer: String,
    pub audience: String,
    pub access_ttl: String,
    pub refresh_ttl: String,
    pub rotation: bool,
    pub refresh_store: RefreshStore,
    pub claims: AuthClaims,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub service: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub login_op: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refresh_op: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub logout_op: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Rbac {
    /// role -> permissions (`service.method` pairs, lower-case).
    pub roles: BTreeMap<String, Vec<String>>,
    /// permission -> description.
    pub permissions: BTreeMap<String, String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Schedule {
    pub name: String,
    pub service: String,
    pub action: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cron: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub every: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub publish: Option<String>,
    #[serde(default)]
    pub source: SourceLoc,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct View {
    pub name: String,
    pub entity: String,
    /// role -> visible fields.
    pub roles: BTreeMap<String, Vec<String>>,
    #[serde(default)]
    pub source: SourceLoc,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ScenarioStep {
    pub name: String,
    /// `METHOD /path` or `Service.Method`.
    pub action: String,
    #[serde(default)]
    pub input: BTreeMap<String, serde_json::Value>,
    #[serde(default)]
    pub expect_status: u16,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub expect_body: BTreeMap<String, serde_json::Value>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub export: BTreeMap<String, String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Scenario {
    pub name: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub description: String,
    pub steps: Vec<ScenarioStep>,
    #[serde(default)]
    pub source: SourceLoc,
}

// ── Notifications and templates ──────────────────────────────────────

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Channel {
    pub name: String,
    /// `email`, `sms`, `push`, `webhook` or `in_app`.
    pub kind: String,
    pub enabled: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NotificationPolicy {
    pub name: String,
    pub event: String,
    pub channel: String,
    pub template: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Notifications {
    pub muted: bool,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub channels: Vec<Channel>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub policies: Vec<NotificationPolicy>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Template {
    pub name: String,
    pub channel: String,
    /// `go_template`, `plain` or `json`.
    pub engine: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub subject: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub body: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub html: String,
}

// ── Schema ───────────────────────────────────────────────────────────

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Schema {
    pub ir_version: String,
    pub project: Project,
    #[serde(default)]
    pub targets: Vec<Target>,
    pub entities: Vec<Entity>,
    /// Topologically ordered: dependencies come before dependents.
    pub services: Vec<Service>,
    pub events: Vec<Event>,
    pub errors: Vec<ErrorDef>,
    pub endpoints: Vec<Endpoint>,
    pub repos: Vec<Repository>,
    pub config: Config,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub auth: Option<Auth>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rbac: Option<Rbac>,
    pub schedules: Vec<Schedule>,
    pub views: Vec<View>,
    #[serde(default)]
    pub scenarios: Vec<Scenario>,
    pub notifications: Notifications,
    pub templates: Vec<Template>,
    #[serde(default)]
    pub metadata: BTreeMap<String, serde_json::Value>,
}

impl Schema {
    pub fn entity(&self, name: &str) -> Option<&Entity> {
        self.entities.iter().find(|e| e.name == name)
    }

    pub fn service(&self, name: &str) -> Option<&Service> {
        self.services.iter().find(|s| s.name == name)
    }

    pub fn event(&self, name: &str) -> Option<&Event> {
        self.events.iter().find(|e| e.name == name)
    }

    pub fn method(&self, service: &str, method: &str) -> Option<&Method> {
        self.service(service).and_then(|s| s.method(method))
    }

    pub fn repo_for(&self, entity: &str) -> Option<&Repository> {
        self.repos.iter().find(|r| r.entity == entity)
    }

    /// Endpoint bound to `service.rpc`, if any.
    pub fn endpoint_for(&self, service: &str, rpc: &str) -> Option<&Endpoint> {
        self.endpoints
            .iter()
            .find(|e| e.service == service && e.rpc == rpc)
    }

    /// Entities that are stored (have an `id`, are not messages or DTOs).
    pub fn persisted_entities(&self) -> impl Iterator<Item = &Entity> {
        self.entities.iter().filter(|e| e.is_persisted())
    }

    /// Stable, pretty JSON used for hashing and snapshots.
    pub fn to_canonical_json(&self) -> Result<String, serde_json::Error> {
        let value = serde_json::to_value(self)?;
        serde_json::to_string_pretty(&value)
    }
}
