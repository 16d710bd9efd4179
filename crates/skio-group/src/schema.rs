//! Per-type metadata shared by every group built from it.

use std::collections::BTreeMap;
use std::fmt;
use std::rc::Rc;

use tracing::warn;

use crate::error::GroupResult;
use crate::group::Group;
use crate::policy::WritePolicy;
use crate::typespec::TypeSpec;
use crate::value::Value;

/// Custom getter or setter. Receives the group and the caller's arguments.
pub type AccessorFn = Rc<dyn Fn(&Group, &[Value]) -> GroupResult<Value>>;

/// Produces the schema of a nested group.
pub type ChildFactory = Rc<dyn Fn() -> Rc<Schema>>;

/// Getter/setter pair registered under an accessor name.
#[derive(Clone, Default)]
pub struct Accessor {
    pub getter: Option<AccessorFn>,
    pub setter: Option<AccessorFn>,
}

/// A nested group instantiated with every group of the parent schema.
#[derive(Clone)]
pub struct ChildSpec {
    pub name: String,
    pub doc: String,
    pub factory: ChildFactory,
}

/// Declarative description of a group type.
///
/// Built once with [`SchemaBuilder`] and shared through `Rc` by every group
/// of that type. A schema never changes after [`SchemaBuilder::build`].
pub struct Schema {
    pub(crate) name: String,
    pub(crate) description: String,
    pub(crate) defaults: BTreeMap<String, Value>,
    pub(crate) types: BTreeMap<String, TypeSpec>,
    pub(crate) docs: BTreeMap<String, String>,
    pub(crate) aliases: BTreeMap<String, String>,
    pub(crate) accessors: BTreeMap<String, Accessor>,
    pub(crate) children: Vec<ChildSpec>,
    pub(crate) policy: WritePolicy,
}

impl Schema {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    /// Initial write policy of groups built from this schema.
    pub fn policy(&self) -> WritePolicy {
        self.policy
    }

    pub fn defaults(&self) -> &BTreeMap<String, Value> {
        &self.defaults
    }

    pub fn types(&self) -> &BTreeMap<String, TypeSpec> {
        &self.types
    }

    pub fn children(&self) -> &[ChildSpec] {
        &self.children
    }

    /// Accessor bound to `key`, following aliases.
    pub(crate) fn accessor(&self, key: &str) -> Option<&Accessor> {
        let name = self.aliases.get(key).map_or(key, String::as_str);
        self.accessors.get(name)
    }

    pub(crate) fn getter(&self, key: &str) -> Option<AccessorFn> {
        self.accessor(key).and_then(|a| a.getter.clone())
    }

    pub(crate) fn setter(&self, key: &str) -> Option<AccessorFn> {
        self.accessor(key).and_then(|a| a.setter.clone())
    }
}

impl fmt::Debug for Schema {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Schema")
            .field("name", &self.name)
            .field("defaults", &self.defaults.keys().collect::<Vec<_>>())
            .field("types", &self.types)
            .field("accessors", &self.accessors.keys().collect::<Vec<_>>())
            .field(
                "children",
                &self.children.iter().map(|c| &c.name).collect::<Vec<_>>(),
            )
            .field("policy", &self.policy)
            .finish()
    }
}

/// Builder for [`Schema`].
///
/// ```rust
/// use skio_group::{Group, SchemaBuilder, TypeSpec, Value};
///
/// let schema = SchemaBuilder::new("Settings")
///     .default("level", 1)
///     .typed("level", TypeSpec::int())
///     .doc("level", "verbosity level")
///     .no_new_key(true)
///     .build();
///
/// let group = Group::new(schema);
/// group.set("level", 2.7).unwrap();
/// assert_eq!(group.get("level").unwrap(), Value::Int(2));
/// assert!(group.set("other", 1).is_err());
/// ```
pub struct SchemaBuilder {
    schema: Schema,
}

impl SchemaBuilder {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            schema: Schema {
                name: name.into(),
                description: String::new(),
                defaults: BTreeMap::new(),
                types: BTreeMap::new(),
                docs: BTreeMap::new(),
                aliases: BTreeMap::new(),
                accessors: BTreeMap::new(),
                children: Vec::new(),
                policy: WritePolicy::default(),
            },
        }
    }

    /// Free-form description of the group type.
    pub fn describe(mut self, text: impl Into<String>) -> Self {
        self.schema.description = text.into();
        self
    }

    /// Value returned for `key` while nothing is registered under it.
    pub fn default(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.schema.defaults.insert(key.into(), value.into());
        self
    }

    /// Declared type of `key`; values set under it are cast to this type.
    pub fn typed(mut self, key: impl Into<String>, spec: TypeSpec) -> Self {
        self.schema.types.insert(key.into(), spec);
        self
    }

    pub fn doc(mut self, key: impl Into<String>, text: impl Into<String>) -> Self {
        self.schema.docs.insert(key.into(), text.into());
        self
    }

    /// Route the accessors of `key` to the ones registered as `accessor`.
    pub fn alias(mut self, key: impl Into<String>, accessor: impl Into<String>) -> Self {
        self.schema.aliases.insert(key.into(), accessor.into());
        self
    }

    /// Custom getter for the key (or alias) `name`.
    pub fn getter(
        mut self,
        name: impl Into<String>,
        f: impl Fn(&Group, &[Value]) -> GroupResult<Value> + 'static,
    ) -> Self {
        self.schema.accessors.entry(name.into()).or_default().getter = Some(Rc::new(f));
        self
    }

    /// Custom setter for the key (or alias) `name`. Its result is what gets
    /// stored, after the usual type cast.
    pub fn setter(
        mut self,
        name: impl Into<String>,
        f: impl Fn(&Group, &[Value]) -> GroupResult<Value> + 'static,
    ) -> Self {
        self.schema.accessors.entry(name.into()).or_default().setter = Some(Rc::new(f));
        self
    }

    /// Declare a nested group created with every instance of this schema.
    ///
    /// Children are typed [`TypeSpec::Group`] and documented with `doc`
    /// unless the key already has a type or doc. A child with an empty name
    /// is ignored.
    pub fn child(
        mut self,
        name: impl Into<String>,
        doc: impl Into<String>,
        factory: impl Fn() -> Rc<Schema> + 'static,
    ) -> Self {
        let name = name.into();
        if name.is_empty() {
            warn!(schema = %self.schema.name, "ignoring nested group without a name");
            return self;
        }
        let doc = doc.into();
        self.schema.types.entry(name.clone()).or_insert(TypeSpec::Group);
        self.schema.docs.entry(name.clone()).or_insert_with(|| doc.clone());
        self.schema.children.retain(|c| c.name != name);
        self.schema.children.push(ChildSpec {
            name,
            doc,
            factory: Rc::new(factory),
        });
        self
    }

    pub fn read_only(mut self, read_only: bool) -> Self {
        self.schema.policy.read_only = read_only;
        self
    }

    pub fn no_new_key(mut self, no_new_key: bool) -> Self {
        self.schema.policy.no_new_key = no_new_key;
        self
    }

    pub fn build(self) -> Rc<Schema> {
        Rc::new(self.schema)
    }
}
