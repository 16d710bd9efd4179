//! Schema-driven typed containers.
//!
//! A [`Group`] is a string-keyed container whose behavior comes from a shared
//! [`Schema`]: default values, declared types that cast on write, custom
//! getters and setters, documentation, nested groups created automatically
//! with their parent, and a write policy.
//!
//! # Key Types
//!
//! - [`Group`] -- the container handle
//! - [`Schema`] / [`SchemaBuilder`] -- per-type metadata
//! - [`TypeSpec`] -- declared type of a key and its cast rules
//! - [`Value`] -- anything a group can hold
//! - [`WritePolicy`] / [`WriteGuard`] -- read-only and no-new-key restrictions
//!
//! ```rust
//! use skio_group::{Group, SchemaBuilder, Value};
//!
//! let schema = SchemaBuilder::new("Station")
//!     .default("elevation", 0.0)
//!     .child("calibration", "instrument calibration", || {
//!         SchemaBuilder::new("Calibration").default("gain", 1.0).build()
//!     })
//!     .build();
//!
//! let station = Group::new(schema);
//! assert_eq!(station.get("elevation").unwrap(), Value::Float(0.0));
//!
//! let calibration = station.child("calibration").unwrap();
//! assert!(calibration.parent().unwrap().ptr_eq(&station));
//! ```

pub mod error;
pub mod group;
pub mod policy;
pub mod schema;
pub mod typespec;
pub mod value;

pub use error::{GroupError, GroupResult};
pub use group::Group;
pub use policy::{WriteGuard, WritePolicy};
pub use schema::{Accessor, AccessorFn, ChildSpec, Schema, SchemaBuilder};
pub use typespec::{list_to_array, ArraySpec, CastFn, CopyPolicy, PrimitiveKind, TypeSpec};
pub use value::Value;
