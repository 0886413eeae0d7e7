#![cfg(feature = "resources")]
//! Files under `resources/`, embedded at compile time.

use include_dir::{include_dir, Dir, File};

use crate::imports::*;

pub static RESOURCES_DIR: Dir<'static> = include_dir!("$CARGO_MANIFEST_DIR/resources");

/// Embedded file at `filepath`, relative to the top of `resources/`
pub fn resource_file<P: AsRef<Path>>(filepath: P) -> anyhow::Result<&'static File<'static>> {
    let filepath = filepath.as_ref();
    RESOURCES_DIR
        .get_file(filepath)
        .with_context(|| format!("File not found in resources: {filepath:?}"))
}

/// Measured capacity points shipped for `stage_id`, if any
pub fn stage_reference(stage_id: &str) -> Option<&'static File<'static>> {
    RESOURCES_DIR.get_file(format!("reference/{stage_id}.csv"))
}
