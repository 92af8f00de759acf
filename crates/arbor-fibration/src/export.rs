//! JSON export of the fibration registry.
//!
//! The core has no wire format of its own; this surface serializes the
//! whole registry to a generic structured value for inspection or
//! visualization by a collaborator. Trees nest as
//! `{id, label, children}`, maps are a parallel list of
//! `{source, target, nodes}`, annotations keep their stored payloads.

use crate::fibration::Fibration;
use arbor_kernel::ArborError;
use serde_json::{Value, json};

/// Serialize the registry to a schema-tagged JSON value.
pub fn export_json(fibration: &Fibration) -> Result<Value, ArborError> {
    let trees = serde_json::to_value(fibration.trees())?;
    let maps = fibration
        .maps()
        .values()
        .map(serde_json::to_value)
        .collect::<Result<Vec<Value>, _>>()?;
    let annotations = serde_json::to_value(fibration.annotations())?;

    Ok(json!({
        "schema": 1,
        "exportKind": "arbor.fibration_registry.v1",
        "trees": trees,
        "maps": maps,
        "annotations": annotations,
    }))
}
