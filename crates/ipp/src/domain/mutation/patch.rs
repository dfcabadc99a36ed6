//! JSON Patch (RFC 6902) construction.
//!
//! Only `add` operations are produced. Operations are applied by path in the
//! order they were added, so callers control ordering through the builder.

use std::borrow::Cow;
use std::collections::BTreeMap;

use json_patch::AddOperation;
use json_patch::Patch;
use json_patch::PatchOperation;
use serde::Serialize;
use serde_json::Value;

use crate::domain::labels::LabelKeyValue;

const LABELS_PATH: &str = "/metadata/labels";

/// Escapes a single JSON Pointer path segment as described in RFC 6901.
///
/// `~` must be replaced before `/` so that the `~` introduced by `~1` is not
/// escaped a second time.
pub fn escape_rfc6901(segment: &str) -> Cow<'_, str> {
    if !segment.contains(['~', '/']) {
        return Cow::Borrowed(segment);
    }
    Cow::Owned(segment.replace('~', "~0").replace('/', "~1"))
}

/// Path of a single label below `metadata.labels`
pub fn label_path(key: &str) -> String {
    format!("{LABELS_PATH}/{}", escape_rfc6901(key))
}

/// Ordered list of `add` operations
#[derive(Debug, Default, Clone)]
pub struct PatchBuilder {
    operations: Vec<PatchOperation>,
}

impl PatchBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends an `add` of `value` at `path`.
    pub fn add(mut self, path: impl Into<String>, value: Value) -> Self {
        self.operations.push(PatchOperation::Add(AddOperation {
            path: path.into(),
            value,
        }));
        self
    }

    /// Appends an `add` of the JSON form of `value` at `path`.
    pub fn add_serialized<T: Serialize>(
        self,
        path: impl Into<String>,
        value: &T,
    ) -> Result<Self, serde_json::Error> {
        let value = serde_json::to_value(value)?;
        Ok(self.add(path, value))
    }

    /// Adds `label` to the object's labels.
    ///
    /// An `add` below a missing parent is rejected by JSON Patch, so when the
    /// object has no label map yet the whole map is added instead.
    pub fn add_label(self, has_labels: bool, label: &LabelKeyValue) -> Self {
        if has_labels {
            return self.add(label_path(&label.key), Value::String(label.value.clone()));
        }
        let labels = BTreeMap::from([(label.key.clone(), label.value.clone())]);
        self.add(LABELS_PATH, serde_json::json!(labels))
    }

    pub fn build(self) -> Patch {
        Patch(self.operations)
    }
}

/// Patch adding `label` to an object that already has a label map, used for
/// nodes, which always carry labels.
pub fn label_patch(label: &LabelKeyValue) -> Patch {
    PatchBuilder::new().add_label(true, label).build()
}
