// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! Structural overlay of JSON documents.

use serde_json::Value;

/// Overlay `patch` onto `base` field by field.
///
/// Objects are merged recursively, every other value in `patch` replaces the one in
/// `base`. Null values in `patch` are skipped so that unset fields never erase what
/// is already recorded.
pub fn overlay(base: &mut Value, patch: &Value) {
    match (base, patch) {
        (_, Value::Null) => {}
        (Value::Object(base_map), Value::Object(patch_map)) => {
            for (key, patch_value) in patch_map {
                if patch_value.is_null() {
                    continue;
                }
                match base_map.get_mut(key) {
                    Some(base_value) => overlay(base_value, patch_value),
                    None => {
                        base_map.insert(key.clone(), patch_value.clone());
                    }
                }
            }
        }
        (base, patch) => *base = patch.clone(),
    }
}

/// Whether `base` already holds everything `patch` sets.
///
/// Objects only need the non-null keys of `patch`. Arrays must have the same length
/// and cover element by element, so fields a server defaults inside list items (a
/// service port's `targetPort` or `nodePort`) do not count as a difference.
pub fn covers(base: &Value, patch: &Value) -> bool {
    match (base, patch) {
        (_, Value::Null) => true,
        (Value::Object(base_map), Value::Object(patch_map)) => {
            patch_map.iter().all(|(key, value)| {
                value.is_null() || base_map.get(key).is_some_and(|b| covers(b, value))
            })
        }
        (Value::Array(base_items), Value::Array(patch_items)) => {
            base_items.len() == patch_items.len()
                && base_items.iter().zip(patch_items).all(|(b, p)| covers(b, p))
        }
        (base, patch) => base == patch,
    }
}
