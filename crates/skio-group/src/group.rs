//! The [`Group`] container.
//!
//! A group maps string keys to [`Value`]s under the rules of its [`Schema`]:
//! defaults fill unset keys, declared types cast values on `set`, custom
//! accessors replace plain reads and writes, and nested groups declared by
//! the schema exist for the whole life of their parent.

use std::cell::RefCell;
use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::fmt;
use std::mem;
use std::rc::{Rc, Weak};

use tracing::{debug, trace};

use crate::error::{GroupError, GroupResult};
use crate::policy::{WriteGuard, WritePolicy};
use crate::schema::Schema;
use crate::typespec::TypeSpec;
use crate::value::Value;

/// A schema-driven key/value container.
///
/// `Group` is a handle: clones refer to the same container. Use
/// [`Group::copy`] for an independent one. Groups are single-threaded.
#[derive(Clone)]
pub struct Group {
    inner: Rc<RefCell<GroupState>>,
}

struct GroupState {
    schema: Rc<Schema>,
    /// Registered values only. Defaults and children live elsewhere.
    values: BTreeMap<String, Value>,
    children: BTreeMap<String, Group>,
    parent: Weak<RefCell<GroupState>>,
    policy: WritePolicy,
}

impl GroupState {
    /// Nested groups are structural and can never be replaced or removed.
    fn is_group_slot(&self, key: &str) -> bool {
        self.children.contains_key(key) || matches!(self.values.get(key), Some(Value::Group(_)))
    }

    fn check_writable(&self, key: &str) -> GroupResult<()> {
        if self.is_group_slot(key) {
            return Err(GroupError::PermissionDenied(format!(
                "groups are not overwritable: '{key}'"
            )));
        }
        self.check_not_read_only()
    }

    fn check_not_read_only(&self) -> GroupResult<()> {
        if self.policy.read_only {
            return Err(GroupError::PermissionDenied(format!(
                "{} is read only",
                self.schema.name
            )));
        }
        Ok(())
    }

    /// Keys known to the schema or already present.
    fn is_known(&self, key: &str) -> bool {
        self.values.contains_key(key)
            || self.children.contains_key(key)
            || self.schema.defaults.contains_key(key)
            || self.schema.types.contains_key(key)
    }
}

impl Group {
    /// Create a group and instantiate the nested groups its schema declares.
    pub fn new(schema: Rc<Schema>) -> Self {
        Self::build(schema, Weak::new())
    }

    /// Create a group and `set` each entry, so casts and setters apply.
    pub fn with_values<K, V>(
        schema: Rc<Schema>,
        entries: impl IntoIterator<Item = (K, V)>,
    ) -> GroupResult<Self>
    where
        K: AsRef<str>,
        V: Into<Value>,
    {
        let group = Self::new(schema);
        for (key, value) in entries {
            group.set(key.as_ref(), value)?;
        }
        Ok(group)
    }

    fn build(schema: Rc<Schema>, parent: Weak<RefCell<GroupState>>) -> Self {
        let inner = Rc::new_cyclic(|this| {
            let children = schema
                .children
                .iter()
                .map(|spec| {
                    let child = Group::build((spec.factory)(), this.clone());
                    (spec.name.clone(), child)
                })
                .collect();
            RefCell::new(GroupState {
                policy: schema.policy,
                schema,
                values: BTreeMap::new(),
                children,
                parent,
            })
        });
        let group = Self { inner };
        trace!(group = %group.name(), "group created");
        group
    }

    pub fn schema(&self) -> Rc<Schema> {
        Rc::clone(&self.inner.borrow().schema)
    }

    /// Name of the group type.
    pub fn name(&self) -> String {
        self.inner.borrow().schema.name.clone()
    }

    /// The group this one is nested in, if any.
    pub fn parent(&self) -> Option<Group> {
        self.inner
            .borrow()
            .parent
            .upgrade()
            .map(|inner| Group { inner })
    }

    /// Nested group declared under `name`.
    pub fn child(&self, name: &str) -> Option<Group> {
        self.inner.borrow().children.get(name).cloned()
    }

    pub fn child_names(&self) -> Vec<String> {
        self.inner.borrow().children.keys().cloned().collect()
    }

    /// Returns `true` if both handles refer to the same group.
    pub fn ptr_eq(&self, other: &Group) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }

    // ---------------------------------------------------------------
    // Write policy
    // ---------------------------------------------------------------

    pub fn policy(&self) -> WritePolicy {
        self.inner.borrow().policy
    }

    pub fn set_policy(&self, policy: WritePolicy) {
        self.inner.borrow_mut().policy = policy;
    }

    pub fn set_read_only(&self, read_only: bool) {
        self.inner.borrow_mut().policy.read_only = read_only;
    }

    pub fn set_no_new_key(&self, no_new_key: bool) {
        self.inner.borrow_mut().policy.no_new_key = no_new_key;
    }

    /// Lift `read_only` until the returned guard is dropped.
    ///
    /// `no_new_key` keeps its current value inside the scope whatever
    /// `keep_no_new_key` says; the flag is accepted for callers that state
    /// their intent but does not change the policy.
    pub fn write_enabled(&self, keep_no_new_key: bool) -> WriteGuard {
        WriteGuard::new(self, keep_no_new_key)
    }

    // ---------------------------------------------------------------
    // Read
    // ---------------------------------------------------------------

    /// Value of `key` through its custom getter, else the registered value,
    /// else the default.
    pub fn get(&self, key: &str) -> GroupResult<Value> {
        self.get_with(key, &[])
    }

    /// Like [`Group::get`], passing `args` to the custom getter.
    pub fn get_with(&self, key: &str, args: &[Value]) -> GroupResult<Value> {
        let getter = self.inner.borrow().schema.getter(key);
        match getter {
            Some(getter) => getter(self, args),
            None if !args.is_empty() => Err(GroupError::InvalidArgument(format!(
                "'{key}' has no getter accepting arguments"
            ))),
            None => self.get_raw(key),
        }
    }

    /// Registered value or default of `key`, bypassing custom getters.
    pub fn get_raw(&self, key: &str) -> GroupResult<Value> {
        let state = self.inner.borrow();
        if let Some(value) = state.values.get(key) {
            return Ok(value.clone());
        }
        if let Some(child) = state.children.get(key) {
            return Ok(Value::Group(child.clone()));
        }
        state
            .schema
            .defaults
            .get(key)
            .cloned()
            .ok_or_else(|| GroupError::KeyNotFound(key.to_string()))
    }

    /// Schema default of `key`.
    pub fn default(&self, key: &str) -> Option<Value> {
        self.inner.borrow().schema.defaults.get(key).cloned()
    }

    /// Declared type of `key`.
    pub fn dtype(&self, key: &str) -> Option<TypeSpec> {
        self.inner.borrow().schema.types.get(key).cloned()
    }

    /// Documentation of `key`, empty if there is none.
    pub fn doc(&self, key: &str) -> String {
        self.inner
            .borrow()
            .schema
            .docs
            .get(key)
            .cloned()
            .unwrap_or_default()
    }

    /// Returns `true` if a value is registered under `key`.
    pub fn contains(&self, key: &str) -> bool {
        self.inner.borrow().values.contains_key(key)
    }

    /// Number of registered values.
    pub fn len(&self) -> usize {
        self.inner.borrow().values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.borrow().values.is_empty()
    }

    // ---------------------------------------------------------------
    // Write
    // ---------------------------------------------------------------

    /// Register `value` under `key`.
    pub fn set(&self, key: &str, value: impl Into<Value>) -> GroupResult<()> {
        self.set_with(key, &[value.into()])
    }

    /// Register a value computed from `args`.
    ///
    /// With a custom setter the stored value is the setter's result;
    /// otherwise `args` must hold exactly the value. The value is then cast
    /// to the declared type of `key`, if any.
    pub fn set_with(&self, key: &str, args: &[Value]) -> GroupResult<()> {
        let (setter, spec) = {
            let state = self.inner.borrow();
            state.check_writable(key)?;
            if state.policy.no_new_key && !state.is_known(key) {
                return Err(GroupError::PermissionDenied(format!(
                    "new key creation is forbidden: '{key}'"
                )));
            }
            (state.schema.setter(key), state.schema.types.get(key).cloned())
        };

        let value = match (setter, args) {
            (_, []) => {
                return Err(GroupError::InvalidArgument(format!(
                    "no value given for '{key}'"
                )))
            }
            (Some(setter), args) => setter(self, args)?,
            (None, [value]) => value.clone(),
            (None, args) => {
                return Err(GroupError::InvalidArgument(format!(
                    "'{key}' takes 1 value, {} given",
                    args.len()
                )))
            }
        };

        let value = match spec {
            Some(spec) => spec.cast(value)?,
            None => value,
        };

        debug!(group = %self.name(), key, kind = value.type_name(), "set");
        self.inner.borrow_mut().values.insert(key.to_string(), value);
        Ok(())
    }

    /// Remove the registered value of `key`, returning it. The default, if
    /// any, becomes visible again.
    pub fn delete(&self, key: &str) -> GroupResult<Value> {
        let mut state = self.inner.borrow_mut();
        state.check_writable(key)?;
        let removed = state
            .values
            .remove(key)
            .ok_or_else(|| GroupError::KeyNotFound(key.to_string()))?;
        debug!(group = %state.schema.name, key, "deleted");
        Ok(removed)
    }

    /// Remove every registered value. Nested groups, declared or stored,
    /// stay.
    pub fn clear(&self) -> GroupResult<()> {
        let mut state = self.inner.borrow_mut();
        state.check_not_read_only()?;
        state.values.retain(|_, value| matches!(value, Value::Group(_)));
        debug!(group = %state.schema.name, "cleared");
        Ok(())
    }

    /// `set` every entry, skipping those that are not writable.
    ///
    /// Fails without writing anything if the group is read-only.
    pub fn update<K, V>(
        &self,
        entries: impl IntoIterator<Item = (K, V)>,
        deep: bool,
    ) -> GroupResult<()>
    where
        K: AsRef<str>,
        V: Into<Value>,
    {
        self.inner.borrow().check_not_read_only()?;
        for (key, value) in entries {
            let key = key.as_ref();
            let value = value.into();
            let value = if deep { value.deep_copy() } else { value };
            match self.set(key, value) {
                Ok(()) => {}
                Err(GroupError::PermissionDenied(reason)) => {
                    trace!(key, %reason, "update skipped key");
                }
                Err(err) => return Err(err),
            }
        }
        Ok(())
    }

    /// [`Group::update`] from the registered items of another group.
    pub fn update_from(&self, source: &Group, deep: bool) -> GroupResult<()> {
        self.update(source.items()?, deep)
    }

    // ---------------------------------------------------------------
    // Enumeration
    // ---------------------------------------------------------------

    /// Registered keys.
    pub fn keys(&self) -> Vec<String> {
        self.inner.borrow().values.keys().cloned().collect()
    }

    /// Registered keys, keys with a default and nested groups, each once.
    pub fn keys_all(&self) -> Vec<String> {
        let state = self.inner.borrow();
        let keys: BTreeSet<&String> = state
            .values
            .keys()
            .chain(state.schema.defaults.keys())
            .chain(state.children.keys())
            .collect();
        keys.into_iter().cloned().collect()
    }

    pub fn values(&self) -> GroupResult<Vec<Value>> {
        self.keys().iter().map(|k| self.get(k)).collect()
    }

    pub fn values_all(&self) -> GroupResult<Vec<Value>> {
        self.keys_all().iter().map(|k| self.get(k)).collect()
    }

    /// Stored values without custom getters, defaults included on request.
    pub fn values_raw(&self, include_defaults: bool) -> Vec<Value> {
        self.items_raw(include_defaults)
            .into_iter()
            .map(|(_, v)| v)
            .collect()
    }

    pub fn items(&self) -> GroupResult<Vec<(String, Value)>> {
        self.keys()
            .into_iter()
            .map(|k| self.get(&k).map(|v| (k, v)))
            .collect()
    }

    pub fn items_all(&self) -> GroupResult<Vec<(String, Value)>> {
        self.keys_all()
            .into_iter()
            .map(|k| self.get(&k).map(|v| (k, v)))
            .collect()
    }

    /// Stored items without custom getters, defaults included on request.
    pub fn items_raw(&self, include_defaults: bool) -> Vec<(String, Value)> {
        if !include_defaults {
            let state = self.inner.borrow();
            return state
                .values
                .iter()
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect();
        }
        self.keys_all()
            .into_iter()
            .filter_map(|k| self.get_raw(&k).ok().map(|v| (k, v)))
            .collect()
    }

    /// Plain mapping of the group, nested groups converted recursively.
    pub fn as_dict(
        &self,
        include_defaults: bool,
        deep: bool,
    ) -> GroupResult<BTreeMap<String, Value>> {
        let items = if include_defaults {
            self.items_all()?
        } else {
            self.items()?
        };
        items
            .into_iter()
            .map(|(key, value)| {
                let value = match value {
                    Value::Group(g) => Value::Map(g.as_dict(include_defaults, deep)?),
                    other if deep => other.deep_copy(),
                    other => other,
                };
                Ok((key, value))
            })
            .collect()
    }

    // ---------------------------------------------------------------
    // Copy and size
    // ---------------------------------------------------------------

    /// An independent group with the same schema, policy, parent and
    /// registered values.
    ///
    /// A deep copy also duplicates arrays, nested values and nested groups
    /// (re-parented under the copy); a shallow copy shares them.
    pub fn copy(&self, deep: bool) -> Group {
        let parent = self.inner.borrow().parent.clone();
        self.copy_with_parent(deep, parent)
    }

    fn copy_with_parent(&self, deep: bool, parent: Weak<RefCell<GroupState>>) -> Group {
        let state = self.inner.borrow();
        let inner = Rc::new_cyclic(|this| {
            let children = state
                .children
                .iter()
                .map(|(name, child)| {
                    let child = if deep {
                        child.copy_with_parent(true, this.clone())
                    } else {
                        child.clone()
                    };
                    (name.clone(), child)
                })
                .collect();
            let values = state
                .values
                .iter()
                .map(|(k, v)| (k.clone(), if deep { v.deep_copy() } else { v.clone() }))
                .collect();
            RefCell::new(GroupState {
                schema: Rc::clone(&state.schema),
                values,
                children,
                parent,
                policy: state.policy,
            })
        });
        Group { inner }
    }

    /// Approximate memory held by the registered values, in bytes.
    ///
    /// Array buffers shared between values (including the data and mask of
    /// masked arrays) are counted once.
    pub fn size_of(&self) -> usize {
        let mut seen = HashSet::new();
        self.size_with(&mut seen)
    }

    fn size_with(&self, seen: &mut HashSet<usize>) -> usize {
        if !seen.insert(Rc::as_ptr(&self.inner) as usize) {
            return 0;
        }
        let state = self.inner.borrow();
        state.values.values().map(|v| value_size(v, seen)).sum()
    }
}

fn value_size(value: &Value, seen: &mut HashSet<usize>) -> usize {
    let base = mem::size_of::<Value>();
    match value {
        Value::Array(array) => {
            let mut size = 0;
            if seen.insert(array.data().buffer_id()) {
                size += array.data().nbytes();
            }
            if let Some(mask) = array.mask() {
                if seen.insert(mask.buffer_id()) {
                    size += mask.nbytes();
                }
            }
            size
        }
        Value::Str(s) => base + s.len(),
        Value::Bytes(b) => base + b.len(),
        Value::List(items) => base + items.iter().map(|v| value_size(v, seen)).sum::<usize>(),
        Value::Map(map) => {
            base + map
                .iter()
                .map(|(k, v)| k.len() + value_size(v, seen))
                .sum::<usize>()
        }
        Value::Group(group) => group.size_with(seen),
        _ => base,
    }
}

impl PartialEq for Group {
    /// Groups are equal when their registered values are.
    fn eq(&self, other: &Self) -> bool {
        self.ptr_eq(other) || self.inner.borrow().values == other.inner.borrow().values
    }
}

impl fmt::Debug for Group {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.inner.borrow();
        f.debug_struct("Group")
            .field("name", &state.schema.name)
            .field("values", &state.values)
            .field("children", &state.children.keys().collect::<Vec<_>>())
            .field("policy", &state.policy)
            .finish()
    }
}

/// One line per key: `'key' <type>: preview <default>`.
impl fmt::Display for Group {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}(\nKey <Value type>: Value preview <Default value flag>",
            self.name()
        )?;
        let registered: BTreeSet<String> = self.keys().into_iter().collect();
        for key in self.keys_all() {
            let spec = self.dtype(&key);
            let type_name = spec.as_ref().map_or_else(|| "any".to_string(), TypeSpec::type_name);
            let repr = match self.get(&key) {
                Ok(value) => value.to_string(),
                Err(err) => format!("<{err}>"),
            };
            let is_group = matches!(spec, Some(TypeSpec::Group));
            let flag = if !is_group && !registered.contains(&key) {
                " <default>"
            } else {
                ""
            };
            write!(f, "\n'{key}' <{type_name}>: {}{flag}", preview(&repr))?;
        }
        f.write_str(")")
    }
}

/// Shorten a value representation to one line of at most 61 characters.
fn preview(repr: &str) -> String {
    const WIDTH: usize = 61;
    const KEEP: usize = 27;

    let head = |s: &str| s.chars().take(KEEP).collect::<String>().trim().to_string();
    let tail = |s: &str| {
        let len = s.chars().count();
        s.chars()
            .skip(len.saturating_sub(KEEP))
            .collect::<String>()
            .trim()
            .to_string()
    };

    if repr.contains('\n') {
        let first = repr.lines().next().unwrap_or_default();
        let last = repr.lines().last().unwrap_or_default();
        format!("{}[...]{}", head(first), head(last))
    } else if repr.chars().count() > WIDTH {
        format!("{}[...]{}", head(repr), tail(repr))
    } else {
        repr.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::SchemaBuilder;
    use crate::typespec::{ArraySpec, CopyPolicy};
    use skio_types::{ArrayValue, DType, NdArray};

    fn times_ten(value: &Value) -> GroupResult<Value> {
        match value {
            Value::Int(v) => Ok(Value::Int(v * 10)),
            Value::Float(v) => Ok(Value::Float(v * 10.0)),
            other => Err(GroupError::InvalidArgument(format!(
                "expected a number, got {}",
                other.type_name()
            ))),
        }
    }

    fn square(value: Value) -> Value {
        match value {
            Value::Int(v) => Value::Int(v * v),
            Value::Float(v) => Value::Float(v * v),
            other => other,
        }
    }

    fn flag(args: &[Value], at: usize) -> GroupResult<bool> {
        match args.get(at) {
            None => Ok(false),
            Some(Value::Bool(b)) => Ok(*b),
            Some(other) => Err(GroupError::InvalidArgument(format!(
                "expected a bool flag, got {}",
                other.type_name()
            ))),
        }
    }

    fn example01() -> Rc<Schema> {
        SchemaBuilder::new("Example01")
            .describe("Test Group")
            .default("01", 1)
            .default("02", 2.1)
            .default("03", Value::None)
            .typed("01", TypeSpec::int())
            .typed(
                "03",
                TypeSpec::array(ArraySpec {
                    dtype: Some(DType::Float64),
                    ndim: Some(2),
                    ..Default::default()
                }),
            )
            .typed(
                "04",
                TypeSpec::array(ArraySpec {
                    copy: CopyPolicy::Copy,
                    masked: true,
                    ..Default::default()
                }),
            )
            .typed("35", TypeSpec::string().option("encoding", "utf-16"))
            .alias("02", "f02")
            .doc("01", "doc 1")
            .doc("02", "doc 2")
            .setter("f02", |_, args| {
                if args.len() > 2 {
                    return Err(GroupError::InvalidArgument("too many arguments".into()));
                }
                let value = times_ten(&args[0])?;
                Ok(if flag(args, 1)? { square(value) } else { value })
            })
            .getter("f02", |group, args| {
                if args.len() > 1 {
                    return Err(GroupError::InvalidArgument("too many arguments".into()));
                }
                let value = times_ten(&group.get_raw("02")?)?;
                Ok(if flag(args, 0)? { square(value) } else { value })
            })
            .setter("f12", |group, args| match args {
                [value] | [value, Value::Bool(false)] => Ok(value.clone()),
                [_, Value::Bool(true)] => group
                    .default("02")
                    .ok_or_else(|| GroupError::KeyNotFound("02".into())),
                _ => Err(GroupError::InvalidArgument("f12 takes (value, default)".into())),
            })
            .getter("f12", |_, args| match args {
                [] | [Value::Bool(false)] => Ok(Value::Int(10)),
                [Value::Bool(true)] => Ok(Value::Int(100)),
                _ => Err(GroupError::InvalidArgument("f12 takes (square)".into())),
            })
            .build()
    }

    fn example02() -> Rc<Schema> {
        SchemaBuilder::new("Example02")
            .describe("Test Group")
            .child("group", "Test inserting other group", || {
                SchemaBuilder::new("group").build()
            })
            .child("", "Test inserting other group with bad name", || {
                SchemaBuilder::new("Group").build()
            })
            .build()
    }

    fn example03() -> Group {
        Group::with_values(example01(), [("01", 2), ("10", 4)]).unwrap()
    }

    fn keys(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    // ---------------------------------------------------------------
    // Defaults
    // ---------------------------------------------------------------

    #[test]
    fn defaults_fill_unset_keys() {
        let g = Group::with_values(example01(), [("10", 1.5)]).unwrap();
        assert_eq!(g.get("01").unwrap(), Value::Int(1));
        assert_eq!(g.get("03").unwrap(), Value::None);
        assert_eq!(g.default("01"), Some(Value::Int(1)));
        assert_eq!(g.default("03"), Some(Value::None));

        g.set("01", 3).unwrap();
        assert_eq!(g.get("01").unwrap(), Value::Int(3));
        g.delete("01").unwrap();
        assert_eq!(g.get("01").unwrap(), Value::Int(1));
    }

    #[test]
    fn missing_default_and_value() {
        let g = Group::new(example01());
        assert_eq!(g.default("10"), None);
        let err = g.get("20").unwrap_err();
        assert_eq!(err, GroupError::KeyNotFound("20".into()));
        assert!(err.to_string().contains("no registered or default value for"));
    }

    #[test]
    fn delete_unregistered_key() {
        let g = Group::new(example01());
        assert_eq!(
            g.delete("01").unwrap_err(),
            GroupError::KeyNotFound("01".into())
        );
    }

    // ---------------------------------------------------------------
    // Types and documentation
    // ---------------------------------------------------------------

    #[test]
    fn declared_types() {
        let g = Group::new(example01());
        assert_eq!(g.dtype("01").unwrap().type_name(), "int");
        assert_eq!(
            g.dtype("03").unwrap().type_name(),
            "array, dtype: float64, dim: 2"
        );
        assert!(g.dtype("10").is_none());
    }

    #[test]
    fn key_documentation() {
        let g = Group::new(example01());
        assert_eq!(g.doc("01"), "doc 1");
        assert_eq!(g.doc("02"), "doc 2");
        assert_eq!(g.doc("10"), "");
        assert_eq!(g.schema().description(), "Test Group");
    }

    // ---------------------------------------------------------------
    // Set and get
    // ---------------------------------------------------------------

    #[test]
    fn set_casts_to_declared_type() {
        let g = Group::new(example01());
        g.set("01", 2.0).unwrap();
        assert_eq!(g.get("01").unwrap(), Value::Int(2));

        let err = g.set("01", Value::List(vec![])).unwrap_err();
        assert!(matches!(err, GroupError::InvalidArgument(_)));
        assert_eq!(g.get("01").unwrap(), Value::Int(2));
    }

    #[test]
    fn setter_and_getter_through_alias() {
        let g = Group::new(example01());
        g.set("02", 2).unwrap();
        assert_eq!(g.get_raw("02").unwrap(), Value::Int(20));
        assert_eq!(g.get("02").unwrap(), Value::Int(200));
        assert_eq!(
            g.get_with("02", &[Value::Bool(true)]).unwrap(),
            Value::Int(40000)
        );
    }

    #[test]
    fn none_skips_cast() {
        let g = Group::new(example01());
        g.set("03", Value::None).unwrap();
        assert_eq!(g.get("03").unwrap(), Value::None);
    }

    #[test]
    fn array_rank_and_dtype() {
        let g = Group::new(example01());
        let err = g
            .set("03", NdArray::from_vec(vec![1.0f64; 5]))
            .unwrap_err();
        assert!(err.to_string().contains("array of 2 dimensions needed"));

        g.set("03", NdArray::new(vec![2, 2], vec![1i16; 4]).unwrap())
            .unwrap();
        let stored = g.get("03").unwrap();
        assert_eq!(stored.as_array().unwrap().dtype(), DType::Float64);
    }

    #[test]
    fn masked_arrays() {
        let g = Group::new(example01());
        let data = NdArray::new(vec![2, 2], vec![1i64; 4]).unwrap();
        let mask = NdArray::new(vec![2, 2], vec![true, false, false, true]).unwrap();
        let masked = ArrayValue::masked(data, mask).unwrap();

        g.set("03", masked.clone()).unwrap();
        assert!(!g.get("03").unwrap().as_array().unwrap().is_masked());
        g.set("04", masked).unwrap();
        assert!(g.get("04").unwrap().as_array().unwrap().is_masked());
    }

    #[test]
    fn typed_option_decodes_bytes() {
        let g = Group::new(example01());
        g.set("35", Value::Bytes(b"\xff\xfe1\x002\x003\x004\x00".to_vec()))
            .unwrap();
        assert_eq!(g.get("35").unwrap(), Value::from("1234"));
    }

    #[test]
    fn accessors_with_several_arguments() {
        let g = Group::new(example01());
        g.set_with("f12", &[1.into(), false.into()]).unwrap();
        assert_eq!(g.get_raw("f12").unwrap(), Value::Int(1));
        g.set_with("f12", &[1.into(), true.into()]).unwrap();
        assert_eq!(g.get_raw("f12").unwrap(), Value::Float(2.1));
        assert_eq!(g.get_with("f12", &[false.into()]).unwrap(), Value::Int(10));

        assert!(g.get_with("f12", &[1.into(), 1.into()]).is_err());
        assert!(g.set_with("f12", &[1.into(), 1.into(), 1.into()]).is_err());
    }

    #[test]
    fn plain_keys_reject_extra_arguments() {
        let g = Group::new(example01());
        assert!(matches!(
            g.get_with("01", &[1.into()]),
            Err(GroupError::InvalidArgument(_))
        ));
        assert!(matches!(
            g.set_with("01", &[1.into(), 2.into()]),
            Err(GroupError::InvalidArgument(_))
        ));
        assert!(matches!(
            g.set_with("01", &[]),
            Err(GroupError::InvalidArgument(_))
        ));
    }

    // ---------------------------------------------------------------
    // Write policy
    // ---------------------------------------------------------------

    #[test]
    fn nested_groups_are_not_overwritable() {
        let g = Group::new(example02());
        assert!(matches!(
            g.set("group", 1),
            Err(GroupError::PermissionDenied(_))
        ));
        assert!(matches!(
            g.delete("group"),
            Err(GroupError::PermissionDenied(_))
        ));
    }

    #[test]
    fn stored_groups_are_not_overwritable() {
        let g = Group::new(example01());
        let other = Group::new(example01());
        g.set("sub", other).unwrap();
        assert!(g.set("sub", 1).is_err());
        assert!(g.delete("sub").is_err());
    }

    #[test]
    fn new_keys_and_no_new_key() {
        let g = Group::new(example01());
        g.set("20", 2).unwrap();
        assert!(g.contains("20"));

        g.set_no_new_key(true);
        g.set("01", 2).unwrap();
        assert_eq!(g.get("01").unwrap(), Value::Int(2));
        g.set("04", Value::None).unwrap();
        g.set("20", 3).unwrap();
        assert!(matches!(
            g.set("30", 2),
            Err(GroupError::PermissionDenied(_))
        ));
    }

    #[test]
    fn read_only_rejects_every_mutation() {
        let g = example03();
        g.set_read_only(true);
        let before = g.keys();
        assert!(g.set("01", 2).is_err());
        assert!(g.set("30", 2).is_err());
        assert!(g.delete("01").is_err());
        assert!(g.clear().is_err());
        assert!(g.update([("11", 0)], false).is_err());
        assert_eq!(g.keys(), before);
        assert_eq!(g.get("01").unwrap(), Value::Int(2));
    }

    #[test]
    fn write_enabled_restores_policy() {
        let g = Group::new(example01());
        g.set_read_only(true);
        {
            let _guard = g.write_enabled(false);
            g.set("01", 2).unwrap();
            assert_eq!(g.get("01").unwrap(), Value::Int(2));
        }
        assert!(g.policy().read_only);
        assert!(g.set("01", 3).is_err());
    }

    #[test]
    fn write_enabled_restores_after_failure() {
        fn failing(g: &Group) -> GroupResult<()> {
            let _guard = g.write_enabled(false);
            g.set("01", 5)?;
            g.set("01", Value::List(vec![]))?;
            Ok(())
        }

        let g = Group::new(example01());
        g.set_policy(WritePolicy {
            read_only: true,
            no_new_key: true,
        });
        assert!(failing(&g).is_err());
        assert_eq!(
            g.policy(),
            WritePolicy {
                read_only: true,
                no_new_key: true
            }
        );
        assert_eq!(g.get("01").unwrap(), Value::Int(5));
    }

    #[test]
    fn write_enabled_never_lifts_no_new_key() {
        let g = Group::new(example01());
        g.set_policy(WritePolicy {
            read_only: true,
            no_new_key: true,
        });
        for keep in [true, false] {
            let guard = g.write_enabled(keep);
            assert!(guard.saved().read_only);
            assert!(g.policy().no_new_key);
            g.set("01", 2).unwrap();
            assert!(matches!(
                g.set("new", 5),
                Err(GroupError::PermissionDenied(_))
            ));
        }
        assert!(!g.contains("new"));
        assert_eq!(
            g.policy(),
            WritePolicy {
                read_only: true,
                no_new_key: true
            }
        );
    }

    #[test]
    fn write_enabled_keeps_open_groups_open() {
        let g = Group::new(example01());
        g.set_read_only(true);
        {
            let _guard = g.write_enabled(true);
            assert!(!g.policy().no_new_key);
            g.set("new", 1).unwrap();
        }
        assert_eq!(g.get("new").unwrap(), Value::Int(1));
        assert!(g.policy().read_only);
    }

    // ---------------------------------------------------------------
    // Nested groups
    // ---------------------------------------------------------------

    #[test]
    fn children_are_instantiated_and_linked() {
        let g = Group::new(example02());
        let child = g.get("group").unwrap();
        let child = child.as_group().unwrap();
        assert_eq!(child.name(), "group");
        assert!(child.parent().unwrap().ptr_eq(&g));
        assert!(g.child("group").unwrap().ptr_eq(child));
        assert!(g.parent().is_none());
    }

    #[test]
    fn unnamed_children_are_ignored() {
        let g = Group::new(example02());
        assert_eq!(g.child_names(), keys(&["group"]));
        assert!(!g.contains("Group"));
        assert!(g.get("Group").is_err());
    }

    #[test]
    fn children_are_not_registered_values() {
        let g = Group::new(example02());
        assert!(g.keys().is_empty());
        assert_eq!(g.len(), 0);
        assert_eq!(g.keys_all(), keys(&["group"]));
        assert_eq!(g.dtype("group").unwrap().type_name(), "group");
        assert_eq!(g.doc("group"), "Test inserting other group");
    }

    #[test]
    fn clear_keeps_children() {
        let g = Group::new(example02());
        g.set("x", 1).unwrap();
        g.clear().unwrap();
        assert!(g.child("group").is_some());
        assert!(g.get("group").is_ok());
    }

    #[test]
    fn clear_keeps_stored_groups() {
        let g = Group::new(example01());
        g.set("inner", Group::new(example01())).unwrap();
        g.set("x", 1).unwrap();
        g.clear().unwrap();
        assert_eq!(g.keys(), keys(&["inner"]));
    }

    // ---------------------------------------------------------------
    // Mapping methods
    // ---------------------------------------------------------------

    #[test]
    fn enumeration_family() {
        let g = example03();
        assert_eq!(g.keys(), keys(&["01", "10"]));
        assert_eq!(g.keys_all(), keys(&["01", "02", "03", "10"]));
        assert_eq!(g.values().unwrap(), vec![Value::Int(2), Value::Int(4)]);
        assert_eq!(
            g.values_all().unwrap(),
            vec![Value::Int(2), Value::Float(21.0), Value::None, Value::Int(4)]
        );
        assert_eq!(
            g.values_raw(true),
            vec![Value::Int(2), Value::Float(2.1), Value::None, Value::Int(4)]
        );
        assert_eq!(g.values_raw(false), vec![Value::Int(2), Value::Int(4)]);
        assert_eq!(
            g.items().unwrap(),
            vec![("01".to_string(), Value::Int(2)), ("10".to_string(), Value::Int(4))]
        );
        assert_eq!(
            g.items_all().unwrap(),
            vec![
                ("01".to_string(), Value::Int(2)),
                ("02".to_string(), Value::Float(21.0)),
                ("03".to_string(), Value::None),
                ("10".to_string(), Value::Int(4)),
            ]
        );
        assert_eq!(g.items_raw(true)[1], ("02".to_string(), Value::Float(2.1)));
        assert_eq!(g.items_raw(false).len(), 2);
        assert!(g.contains("01"));
        assert!(!g.contains("20"));
        assert_eq!(g.len(), 2);
    }

    #[test]
    fn update_merges() {
        for deep in [false, true] {
            let g = example03();
            g.update([("11", 0), ("01", 5)], deep).unwrap();
            assert!(g.contains("11"));
            assert_eq!(g.get("01").unwrap(), Value::Int(5));
        }
    }

    #[test]
    fn update_skips_new_keys_under_no_new_key() {
        let g = example03();
        g.set_no_new_key(true);
        g.update([("11", 0), ("01", 5)], false).unwrap();
        assert!(!g.contains("11"));
        assert_eq!(g.get("01").unwrap(), Value::Int(5));
    }

    #[test]
    fn update_skips_nested_groups_but_not_cast_errors() {
        let g = Group::new(example02());
        g.update([("group", 1), ("x", 2)], false).unwrap();
        assert_eq!(g.get("x").unwrap(), Value::Int(2));

        let typed = Group::new(example01());
        let err = typed
            .update([("01", Value::List(vec![]))], false)
            .unwrap_err();
        assert!(matches!(err, GroupError::InvalidArgument(_)));
    }

    #[test]
    fn update_from_other_group() {
        let g = Group::new(example01());
        g.update_from(&example03(), false).unwrap();
        assert_eq!(g.keys(), keys(&["01", "10"]));
    }

    #[test]
    fn clear_removes_registered_values() {
        let g = example03();
        g.clear().unwrap();
        assert_eq!(g.len(), 0);
        assert_eq!(g.get("01").unwrap(), Value::Int(1));
    }

    #[test]
    fn copies_compare_equal() {
        let g = example03();
        assert_eq!(g, g.copy(true));
        assert_eq!(g, g.copy(false));
        let copy = g.copy(true);
        copy.set("01", 9).unwrap();
        assert_eq!(g.get("01").unwrap(), Value::Int(2));
        assert_ne!(g, copy);
    }

    #[test]
    fn deep_copy_duplicates_arrays_and_children() {
        let g = Group::new(example02());
        g.set("a", NdArray::from_vec(vec![1.0f64, 2.0])).unwrap();
        let buffer = |g: &Group| g.get("a").unwrap().as_array().unwrap().data().buffer_id();

        let shallow = g.copy(false);
        assert_eq!(buffer(&shallow), buffer(&g));
        assert!(shallow.child("group").unwrap().ptr_eq(&g.child("group").unwrap()));

        let deep = g.copy(true);
        assert_ne!(buffer(&deep), buffer(&g));
        let child = deep.child("group").unwrap();
        assert!(!child.ptr_eq(&g.child("group").unwrap()));
        assert!(child.parent().unwrap().ptr_eq(&deep));
    }

    #[test]
    fn as_dict_converts_nested_groups() {
        let g = example03();
        let dict = g.as_dict(false, true).unwrap();
        let expected: BTreeMap<String, Value> = [("01".to_string(), Value::Int(2)), ("10".to_string(), Value::Int(4))]
            .into_iter()
            .collect();
        assert_eq!(dict, expected);

        let nested = Group::new(example02()).as_dict(true, false).unwrap();
        assert!(matches!(nested["group"], Value::Map(_)));
    }

    // ---------------------------------------------------------------
    // Display and size
    // ---------------------------------------------------------------

    #[test]
    fn display_lists_every_key() {
        let g = Group::with_values(
            example01(),
            [
                ("01", Value::Int(2)),
                ("10", Value::Int(4)),
                ("23", Value::from("z".repeat(80))),
                ("24", Value::from(NdArray::new(vec![2, 2], vec![1.0f64; 4]).unwrap())),
            ],
        )
        .unwrap();
        let text = g.to_string();
        assert!(text.starts_with("Example01(\n"));
        assert!(text.ends_with(')'));
        assert!(text.contains("'01' <int>: 2\n"));
        assert!(text.contains("'02' <any>: 21.0 <default>"));
        assert!(text.contains("[...]"));
        assert!(text.contains("'24' <any>: array([[1.0, 1.0], [1.0, 1.0]], dtype=float64)"));
    }

    #[test]
    fn preview_shortens_long_values() {
        let long = "a".repeat(30) + &"b".repeat(40);
        assert_eq!(preview(&long), format!("{}[...]{}", "a".repeat(27), "b".repeat(27)));
        assert_eq!(preview("first line\nsecond\nlast"), "first line[...]last");
        assert_eq!(preview("short"), "short");
    }

    #[test]
    fn size_counts_shared_buffers_once() {
        let g = Group::new(example01());
        let data = NdArray::from_vec(vec![1.0f64; 4]);
        g.set("a", data.clone()).unwrap();
        g.set("b", data).unwrap();
        assert_eq!(g.size_of(), 32);

        let masked = ArrayValue::masked(
            NdArray::from_vec(vec![1i16; 4]),
            NdArray::from_vec(vec![false; 4]),
        )
        .unwrap();
        g.set("c", masked).unwrap();
        assert_eq!(g.size_of(), 32 + 8 + 4);
    }

    #[test]
    fn size_is_positive_for_scalars() {
        assert!(example03().size_of() > 0);
        assert_eq!(Group::new(example02()).size_of(), 0);
    }
}
