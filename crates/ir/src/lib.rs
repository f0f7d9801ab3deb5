//! ang-ir: the intermediate representation consumed by every emitter.
//!
//! The IR is produced once per pipeline run by `ang-core` and is never
//! mutated afterwards. All emitters read from [`Schema`] only; they never
//! look back at normalized definitions.
//!
//! - [`TypeRef`] -- canonical type lattice
//! - [`FlowStep`] / [`FlowAction`] -- flow steps as a closed variant with an
//!   open fallback
//! - [`Schema`] and friends -- entities, services, endpoints, repositories

pub mod flow;
pub mod type_ref;
pub mod types;

pub use flow::{FlowAction, FlowStep};
pub use type_ref::{TypeParseError, TypeRef};
pub use types::*;

/// Current IR schema version. Bumped whenever the serialized shape changes.
pub const IR_VERSION: &str = "1";
