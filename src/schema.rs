//! Descriptor shape validation against the bundled JSON Schema.
//!
//! Runs before serde decoding so a wrong-shaped descriptor produces a single
//! `CatalogMalformed` carrying every violation, instead of a serde error at
//! the first mismatched field.

use jsonschema::JSONSchema;
use serde_json::Value;
use std::path::Path;

use crate::catalog::CatalogError;

const FIRMWARE_LIST_SCHEMA: &str = include_str!("../schema/firmware_list.schema.json");

pub(crate) fn validate_descriptor(raw: &Value, descriptor: &Path) -> Result<(), CatalogError> {
    let schema: Value = match serde_json::from_str(FIRMWARE_LIST_SCHEMA) {
        Ok(value) => value,
        Err(err) => {
            return Err(CatalogError::Malformed {
                path: descriptor.to_path_buf(),
                details: format!("bundled descriptor schema is not valid JSON: {err}"),
            });
        }
    };

    let compiled = match JSONSchema::compile(&schema) {
        Ok(compiled) => compiled,
        Err(err) => {
            return Err(CatalogError::Malformed {
                path: descriptor.to_path_buf(),
                details: format!("bundled descriptor schema does not compile: {err}"),
            });
        }
    };

    if let Err(errors) = compiled.validate(raw) {
        let details = errors
            .map(|err| err.to_string())
            .collect::<Vec<_>>()
            .join("\n");
        return Err(CatalogError::Malformed {
            path: descriptor.to_path_buf(),
            details,
        });
    }
    Ok(())
}
