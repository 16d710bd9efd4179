//! Files for skio: groups that know where they come from.
//!
//! # Key Types
//!
//! - [`File`] -- a [`Group`](skio_group::Group) with an `infos` group and
//!   format drivers
//! - [`file_schema`] / [`InfoFields`] -- schema of a file type
//! - [`FileDriver`] -- a loadable/savable format
//! - [`JsonDriver`] -- the built-in tagged JSON format, with optional packing
//!   of float arrays as scaled integers
//! - [`valid_filename`] -- portable file name sanitizer

pub mod driver;
pub mod error;
pub mod file;
pub mod json;
pub mod names;

pub use driver::FileDriver;
pub use error::{FileError, FileResult};
pub use file::{file_schema, File, InfoFields, INFOS, SUBFILES};
pub use json::{JsonDriver, JsonDriverConfig};
pub use names::{valid_filename, FilenameOptions};
