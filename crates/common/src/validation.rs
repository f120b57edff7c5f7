//! Configuration input validation
//!
//! Checks applied once while the configuration file is resolved, so that
//! scheduled jobs never see:
//! - Empty camera names or snapshot URLs
//! - Unbounded strings
//! - Camera segments that escape the output directory
//! - Non-positive frame durations

use anyhow::{anyhow, Result};
use std::path::{Component, Path};

// ============================================================================
// CONSTANTS: Input Size Limits
// ============================================================================

/// Maximum length for camera names
pub const MAX_NAME_LENGTH: usize = 512;

/// Maximum length for snapshot URLs
pub const MAX_URI_LENGTH: usize = 4096;

/// Maximum length for encoder command templates
pub const MAX_TEMPLATE_LENGTH: usize = 8192;

// ============================================================================
// String Validation
// ============================================================================

/// Validate string length against a maximum
pub fn validate_length(value: &str, max_length: usize, field_name: &str) -> Result<()> {
    if value.len() > max_length {
        return Err(anyhow!(
            "{} exceeds maximum length of {} bytes (got {})",
            field_name,
            max_length,
            value.len()
        ));
    }
    Ok(())
}

/// Validate non-empty string
pub fn validate_non_empty(value: &str, field_name: &str) -> Result<()> {
    if value.trim().is_empty() {
        return Err(anyhow!("{} cannot be empty", field_name));
    }
    Ok(())
}

/// Validate camera name
pub fn validate_name(name: &str, field_name: &str) -> Result<()> {
    validate_non_empty(name, field_name)?;
    validate_length(name, MAX_NAME_LENGTH, field_name)?;
    Ok(())
}

/// Validate snapshot URL: non-empty, bounded, http(s)
pub fn validate_snapshot_url(uri: &str, field_name: &str) -> Result<()> {
    validate_non_empty(uri, field_name)?;
    validate_length(uri, MAX_URI_LENGTH, field_name)?;

    let parsed = url::Url::parse(uri).map_err(|e| anyhow!("{} is not a valid URL: {}", field_name, e))?;
    match parsed.scheme() {
        "http" | "https" => Ok(()),
        other => Err(anyhow!(
            "{} must use http or https (got '{}')",
            field_name,
            other
        )),
    }
}

/// Validate encoder command template length and presence
pub fn validate_template(template: &str, field_name: &str) -> Result<()> {
    validate_non_empty(template, field_name)?;
    validate_length(template, MAX_TEMPLATE_LENGTH, field_name)?;
    Ok(())
}

// ============================================================================
// Path Validation (Prevent Path Traversal)
// ============================================================================

/// Validate that a camera segment names exactly one normal directory under
/// the output root
pub fn validate_segment(segment: &str, field_name: &str) -> Result<()> {
    validate_non_empty(segment, field_name)?;

    let mut components = Path::new(segment).components();
    match (components.next(), components.next()) {
        (Some(Component::Normal(_)), None) if !segment.contains(['/', '\\']) => Ok(()),
        _ => Err(anyhow!(
            "{} '{}' must be a single directory name (no path separators or '..')",
            field_name,
            segment
        )),
    }
}

// ============================================================================
// Numeric Validation
// ============================================================================

/// Validate a frame duration in seconds
pub fn validate_frame_duration(seconds: f64, field_name: &str) -> Result<()> {
    if !seconds.is_finite() || seconds <= 0.0 {
        return Err(anyhow!(
            "{} must be a positive number of seconds (got {})",
            field_name,
            seconds
        ));
    }
    Ok(())
}
