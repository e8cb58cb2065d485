//! Write-time validation of zone drafts and updates.
//!
//! Geometry checks are limited to ring length, closure, coordinate range,
//! and repeated vertices; full self-intersection detection is not
//! attempted.

use response_map_geometry::validate_ring;
use response_map_zone_models::{ZoneDraft, ZoneUpdate};

use crate::ValidationError;

/// Validates a draft before it is persisted.
///
/// # Errors
///
/// Returns the first [`ValidationError`] found.
pub fn validate_draft(draft: &ZoneDraft) -> Result<(), ValidationError> {
    validate_name(&draft.name)?;
    if draft.created_by.trim().is_empty() {
        return Err(ValidationError::EmptyCreator);
    }
    validate_color(&draft.color)?;
    validate_opacity(draft.opacity)?;
    validate_ring(&draft.geometry)?;
    Ok(())
}

/// Validates a partial update.
///
/// # Errors
///
/// Returns [`ValidationError::EmptyUpdate`] if nothing would change, or the
/// first invalid field.
pub fn validate_update(update: &ZoneUpdate) -> Result<(), ValidationError> {
    if update.is_empty() {
        return Err(ValidationError::EmptyUpdate);
    }
    if let Some(name) = &update.name {
        validate_name(name)?;
    }
    if let Some(color) = &update.color {
        validate_color(color)?;
    }
    if let Some(opacity) = update.opacity {
        validate_opacity(opacity)?;
    }
    Ok(())
}

fn validate_name(name: &str) -> Result<(), ValidationError> {
    if name.trim().is_empty() {
        return Err(ValidationError::EmptyName);
    }
    Ok(())
}

fn validate_opacity(value: f64) -> Result<(), ValidationError> {
    if !(0.0..=1.0).contains(&value) {
        return Err(ValidationError::Opacity { value });
    }
    Ok(())
}

fn validate_color(value: &str) -> Result<(), ValidationError> {
    let valid = value.strip_prefix('#').is_some_and(|hex| {
        matches!(hex.len(), 3 | 6) && hex.chars().all(|c| c.is_ascii_hexdigit())
    });
    if valid {
        Ok(())
    } else {
        Err(ValidationError::Color {
            value: value.to_string(),
        })
    }
}
