//! Eligibility check for inbound image references.

use std::path::{Component, Path};

use crate::types::{ImageReference, ValidationResult};

/// Extensions accepted for processing, lowercase.
pub const ALLOWED_EXTENSIONS: [&str; 3] = ["jpg", "jpeg", "png"];

/// Decides whether a reference is eligible for processing.
///
/// Pure: looks only at the reference, never touches storage, never fails.
#[derive(Debug, Clone, Copy, Default)]
pub struct Validator;

impl Validator {
    pub fn new() -> Self {
        Self
    }

    pub fn validate(&self, reference: &ImageReference) -> ValidationResult {
        let container = reference.container();
        if container.trim().is_empty() {
            return ValidationResult::invalid(reference, "Missing source bucket");
        }
        if !is_single_segment(container) {
            return ValidationResult::invalid(reference, "Malformed source bucket");
        }

        let key = reference.key();
        if key.trim().is_empty() {
            return ValidationResult::invalid(reference, "Missing object key");
        }
        if key.ends_with('/') {
            return ValidationResult::invalid(reference, "Object key has no file name");
        }
        if !is_relative_path(key) {
            return ValidationResult::invalid(reference, "Malformed object key");
        }

        if Self::has_allowed_extension(key) {
            ValidationResult::valid(reference)
        } else {
            ValidationResult::invalid(reference, "Invalid file type")
        }
    }

    fn has_allowed_extension(key: &str) -> bool {
        let lower = key.to_ascii_lowercase();
        ALLOWED_EXTENSIONS
            .iter()
            .any(|ext| lower.strip_suffix(ext).is_some_and(|rest| rest.ends_with('.')))
    }
}

/// Only plain names: no root, no `.` or `..` segments.
fn is_relative_path(key: &str) -> bool {
    !key.starts_with(['/', '\\'])
        && Path::new(key)
            .components()
            .all(|c| matches!(c, Component::Normal(_)))
}

fn is_single_segment(name: &str) -> bool {
    let mut components = Path::new(name).components();
    matches!(components.next(), Some(Component::Normal(_))) && components.next().is_none()
}
