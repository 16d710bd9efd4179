//! File groups: a [`Group`] with file information and format drivers.

use std::collections::BTreeMap;
use std::fs;
use std::ops::Deref;
use std::path::Path;
use std::rc::Rc;

use chrono::{DateTime, Utc};
use skio_group::{Group, Schema, SchemaBuilder, TypeSpec, Value};
use tracing::{debug, trace};

use crate::driver::FileDriver;
use crate::error::{FileError, FileResult};
use crate::json::JsonDriver;

/// Key of the nested group holding file information.
pub const INFOS: &str = "infos";
/// Key of the list of files stored inside the same physical file.
pub const SUBFILES: &str = "subfiles";

/// Format specific entries added to the `infos` group.
#[derive(Clone, Default)]
pub struct InfoFields {
    defaults: BTreeMap<String, Value>,
    types: BTreeMap<String, TypeSpec>,
    docs: BTreeMap<String, String>,
}

impl InfoFields {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn default_value(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.defaults.insert(key.into(), value.into());
        self
    }

    pub fn typed(mut self, key: impl Into<String>, spec: TypeSpec) -> Self {
        self.types.insert(key.into(), spec);
        self
    }

    pub fn doc(mut self, key: impl Into<String>, text: impl Into<String>) -> Self {
        self.docs.insert(key.into(), text.into());
        self
    }
}

/// Schema builder for a file type named `name`.
///
/// The schema forbids new keys, declares a [`SUBFILES`] list and a
/// read-only [`INFOS`] group with `filename`, `datemodification`,
/// `datecreation`, `bytesize` and the entries of `extra`. Callers add their
/// own keys before building.
pub fn file_schema(name: impl Into<String>, extra: InfoFields) -> SchemaBuilder {
    let extra = Rc::new(extra);
    SchemaBuilder::new(name)
        .default(SUBFILES, Value::List(Vec::new()))
        .doc(
            SUBFILES,
            "Files related to this one, stored in the same physical file",
        )
        .child(INFOS, "File related information", move || {
            infos_schema(&extra)
        })
        .no_new_key(true)
}

fn infos_schema(extra: &InfoFields) -> Rc<Schema> {
    let mut builder = SchemaBuilder::new(INFOS)
        .describe("File related information, taken from the OS for files on disk")
        .default("filename", "")
        .typed("filename", TypeSpec::string())
        .typed("datemodification", TypeSpec::datetime())
        .typed("datecreation", TypeSpec::datetime())
        .typed("bytesize", TypeSpec::int())
        .doc("filename", "Path to the file")
        .doc(
            "datemodification",
            "Date of the last file modification. Current date and time when not loaded from a path.",
        )
        .doc(
            "datecreation",
            "Date of the file creation. Current date and time when not loaded from a path.",
        )
        .doc("bytesize", "Size of the file on disk in bytes")
        .read_only(true)
        .no_new_key(true);
    for (key, value) in &extra.defaults {
        builder = builder.default(key.clone(), value.clone());
    }
    for (key, spec) in &extra.types {
        builder = builder.typed(key.clone(), spec.clone());
    }
    for (key, text) in &extra.docs {
        builder = builder.doc(key.clone(), text.clone());
    }
    builder.build()
}

/// A group backed by files on disk.
///
/// Dereferences to its [`Group`]. The JSON driver is registered by default;
/// [`File::register`] adds more, tried in registration order by
/// [`File::load`].
pub struct File {
    group: Group,
    drivers: Vec<Box<dyn FileDriver>>,
}

impl File {
    /// A new, empty file with up to date `infos`.
    pub fn new(schema: Rc<Schema>) -> FileResult<Self> {
        let file = Self {
            group: Group::new(schema),
            drivers: vec![Box::new(JsonDriver::default())],
        };
        file.refresh_infos(None)?;
        Ok(file)
    }

    /// A new file loaded from `path`.
    pub fn open(schema: Rc<Schema>, path: impl AsRef<Path>) -> FileResult<Self> {
        let file = Self::new(schema)?;
        file.load(path)?;
        Ok(file)
    }

    pub fn register(&mut self, driver: impl FileDriver + 'static) {
        self.drivers.push(Box::new(driver));
    }

    pub fn driver_names(&self) -> Vec<&str> {
        self.drivers.iter().map(|d| d.name()).collect()
    }

    pub fn group(&self) -> &Group {
        &self.group
    }

    /// The `infos` group, if the schema declares one.
    pub fn infos(&self) -> Option<Group> {
        self.group.child(INFOS)
    }

    /// Load `path` with the first driver that accepts it and return that
    /// driver's name.
    pub fn load(&self, path: impl AsRef<Path>) -> FileResult<String> {
        let path = path.as_ref();
        for driver in &self.drivers {
            trace!(driver = driver.name(), path = %path.display(), "trying driver");
            match driver.load(path, &self.group) {
                Ok(()) => {
                    self.refresh_infos(Some(path))?;
                    debug!(driver = driver.name(), path = %path.display(), "file loaded");
                    return Ok(driver.name().to_string());
                }
                Err(FileError::FormatMismatch(reason)) => {
                    trace!(driver = driver.name(), %reason, "format mismatch");
                }
                Err(err) => return Err(err),
            }
        }
        Err(FileError::UnsupportedFormat {
            path: path.to_path_buf(),
        })
    }

    /// Load `path` with the driver named `driver` only.
    pub fn load_with(&self, driver: &str, path: impl AsRef<Path>) -> FileResult<()> {
        let path = path.as_ref();
        self.driver(driver)?.load(path, &self.group)?;
        self.refresh_infos(Some(path))
    }

    /// Save to `path` with the driver named `driver`.
    pub fn save(&self, driver: &str, path: impl AsRef<Path>) -> FileResult<()> {
        let path = path.as_ref();
        self.driver(driver)?.save(path, &self.group)?;
        debug!(driver, path = %path.display(), "file saved");
        self.refresh_infos(Some(path))
    }

    fn driver(&self, name: &str) -> FileResult<&dyn FileDriver> {
        self.drivers
            .iter()
            .find(|d| d.name() == name)
            .map(|d| d.as_ref())
            .ok_or_else(|| FileError::UnknownDriver(name.to_string()))
    }

    fn refresh_infos(&self, path: Option<&Path>) -> FileResult<()> {
        self.update_infos(path, std::iter::empty::<(String, Value)>())
    }

    /// Refresh the `infos` group.
    ///
    /// With a `path`, `filename` is set to it; the dates and size then come
    /// from the metadata of `filename`, or from the current time (size 0)
    /// when no filename is known. `extra` entries are merged last; keys the
    /// group does not declare are skipped.
    pub fn update_infos<K, V>(
        &self,
        path: Option<&Path>,
        extra: impl IntoIterator<Item = (K, V)>,
    ) -> FileResult<()>
    where
        K: AsRef<str>,
        V: Into<Value>,
    {
        let Some(infos) = self.infos() else {
            return Ok(());
        };
        let _guard = infos.write_enabled(true);

        if let Some(path) = path {
            infos.set("filename", path.to_string_lossy().into_owned())?;
        }
        let filename = match infos.get("filename")? {
            Value::Str(name) if !name.is_empty() => Some(name),
            _ => None,
        };

        match filename {
            Some(filename) => {
                let meta = fs::metadata(&filename)?;
                let modified: DateTime<Utc> = meta.modified()?.into();
                let created: DateTime<Utc> = meta.created().map(Into::into).unwrap_or(modified);
                infos.set("datemodification", modified)?;
                infos.set("datecreation", created)?;
                infos.set("bytesize", i64::try_from(meta.len()).unwrap_or(i64::MAX))?;
            }
            None => {
                let now = Utc::now();
                infos.set("datemodification", now)?;
                infos.set("datecreation", now)?;
                infos.set("bytesize", 0)?;
            }
        }

        infos.update(extra, false)?;
        trace!(file = %self.group.name(), "infos updated");
        Ok(())
    }
}

impl Deref for File {
    type Target = Group;

    fn deref(&self) -> &Group {
        &self.group
    }
}
