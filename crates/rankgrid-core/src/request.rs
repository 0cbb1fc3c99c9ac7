//! Ranking-check requests and the form validation that produces them.
//!
//! A [`RankForm`] holds exactly what the user typed. [`RankForm::compose`]
//! validates it and builds a [`RankRequest`] in one of two shapes: a quick
//! check (implicit 3x3 grid, 5 km radius) or an advanced check with explicit
//! grid parameters. Validation here is a convenience for the user; the remote
//! service validates again.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::grid::DEFAULT_ZOOM;

/// Grid side length the service uses for quick checks.
pub const QUICK_GRID_SIZE: u8 = 3;
/// Radius the service uses for quick checks.
pub const QUICK_RADIUS_KM: f64 = 5.0;

const MIN_GRID_SIZE: u8 = 2;
const MAX_GRID_SIZE: u8 = 5;
const MIN_RADIUS_KM: f64 = 0.1;
const MAX_RADIUS_KM: f64 = 50.0;
const MIN_ZOOM: u8 = 1;
const MAX_ZOOM: u8 = 20;
const MIN_NAME_CHARS: usize = 2;
const MAX_NAME_CHARS: usize = 200;
const DEFAULT_LANGUAGE: &str = "en";

/// Language codes accepted by the upstream ranking provider.
const LANGUAGE_CODES: &[&str] = &[
    "en", "es", "fr", "de", "it", "pt", "ru", "zh", "ja", "ko", "ar", "hi", "th", "vi", "id", "ms",
    "tr", "pl", "nl", "sv", "da", "no", "fi", "cs", "sk", "hu", "ro", "bg", "hr", "sl", "et", "lv",
    "lt", "el", "he", "fa", "ur", "bn", "ta", "te",
];

/// A form field failed validation. Raised before any network call.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ValidationError {
    #[error("{field} is required")]
    Missing { field: &'static str },

    #[error("{field} must be a number, got \"{value}\"")]
    Malformed { field: &'static str, value: String },

    #[error("{field} {reason}")]
    OutOfRange { field: &'static str, reason: String },
}

impl ValidationError {
    /// The form field the error refers to, for inline display next to it.
    #[must_use]
    pub fn field(&self) -> &'static str {
        match self {
            Self::Missing { field } | Self::Malformed { field, .. } | Self::OutOfRange { field, .. } => {
                field
            }
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Device {
    #[default]
    Desktop,
    Mobile,
    Tablet,
}

impl std::fmt::Display for Device {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Device::Desktop => write!(f, "desktop"),
            Device::Mobile => write!(f, "mobile"),
            Device::Tablet => write!(f, "tablet"),
        }
    }
}

impl std::str::FromStr for Device {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "desktop" => Ok(Device::Desktop),
            "mobile" => Ok(Device::Mobile),
            "tablet" => Ok(Device::Tablet),
            other => Err(ValidationError::OutOfRange {
                field: "device",
                reason: format!("must be one of desktop, mobile, tablet, got \"{other}\""),
            }),
        }
    }
}

/// Which endpoint a request is bound for.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum CheckKind {
    #[default]
    Quick,
    Advanced,
}

impl std::fmt::Display for CheckKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CheckKind::Quick => write!(f, "quick"),
            CheckKind::Advanced => write!(f, "advanced"),
        }
    }
}

/// Body of a quick-check or grid-check submission.
///
/// Fields that are `None` are left out of the JSON body entirely. A quick
/// check therefore serialises to just the business name, the coordinates and
/// (when given) the target domain.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RankRequest {
    #[serde(skip)]
    pub kind: CheckKind,
    pub business_name: String,
    pub business_lat: f64,
    pub business_lng: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub grid_size: Option<u8>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub radius_km: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub language_code: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub device: Option<Device>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub zoom: Option<u8>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub target_domain: Option<String>,
}

impl RankRequest {
    /// Grid side length the service will use for this request.
    #[must_use]
    pub fn effective_grid_size(&self) -> u8 {
        self.grid_size.unwrap_or(QUICK_GRID_SIZE)
    }

    /// Radius the service will use for this request.
    #[must_use]
    pub fn effective_radius_km(&self) -> f64 {
        self.radius_km.unwrap_or(QUICK_RADIUS_KM)
    }
}

/// Raw form state as entered by the user. Every field is text; blank means unset.
#[derive(Debug, Clone, Default)]
pub struct RankForm {
    pub business_name: String,
    pub business_lat: String,
    pub business_lng: String,
    pub target_domain: String,
    pub grid_size: String,
    pub radius_km: String,
    pub language_code: String,
    pub device: String,
    pub zoom: String,
}

impl RankForm {
    /// Validate the form and build the request body for `kind`.
    ///
    /// Quick checks ignore the grid, radius, language, device and zoom fields.
    ///
    /// # Errors
    ///
    /// Returns the first [`ValidationError`] encountered, in field order.
    pub fn compose(&self, kind: CheckKind) -> Result<RankRequest, ValidationError> {
        let business_name = required(&self.business_name, "business name")?;
        let lat_raw = required(&self.business_lat, "latitude")?;
        let lng_raw = required(&self.business_lng, "longitude")?;

        let char_count = business_name.chars().count();
        if char_count < MIN_NAME_CHARS {
            return Err(ValidationError::OutOfRange {
                field: "business name",
                reason: format!("must be at least {MIN_NAME_CHARS} characters long"),
            });
        }
        if char_count > MAX_NAME_CHARS {
            return Err(ValidationError::OutOfRange {
                field: "business name",
                reason: format!("cannot exceed {MAX_NAME_CHARS} characters"),
            });
        }

        let business_lat = parse_f64(lat_raw, "latitude")?;
        let business_lng = parse_f64(lng_raw, "longitude")?;
        if !(-90.0..=90.0).contains(&business_lat) {
            return Err(ValidationError::OutOfRange {
                field: "latitude",
                reason: format!("must be between -90 and 90, got {business_lat}"),
            });
        }
        if !(-180.0..=180.0).contains(&business_lng) {
            return Err(ValidationError::OutOfRange {
                field: "longitude",
                reason: format!("must be between -180 and 180, got {business_lng}"),
            });
        }

        let target_domain = normalize_target_domain(&self.target_domain)?;

        let mut request = RankRequest {
            kind,
            business_name: sanitize_business_name(business_name),
            business_lat,
            business_lng,
            grid_size: None,
            radius_km: None,
            language_code: None,
            device: None,
            zoom: None,
            target_domain,
        };

        if kind == CheckKind::Advanced {
            request.grid_size = Some(self.parse_grid_size()?);
            request.radius_km = Some(self.parse_radius()?);
            request.language_code = Some(self.parse_language()?);
            request.device = Some(if self.device.trim().is_empty() {
                Device::default()
            } else {
                self.device.parse()?
            });
            request.zoom = Some(self.parse_zoom()?);
        }

        Ok(request)
    }

    fn parse_grid_size(&self) -> Result<u8, ValidationError> {
        let raw = self.grid_size.trim();
        if raw.is_empty() {
            return Ok(QUICK_GRID_SIZE);
        }
        let size = raw.parse::<u8>().map_err(|_| ValidationError::Malformed {
            field: "grid size",
            value: raw.to_string(),
        })?;
        if !(MIN_GRID_SIZE..=MAX_GRID_SIZE).contains(&size) {
            return Err(ValidationError::OutOfRange {
                field: "grid size",
                reason: format!("must be between {MIN_GRID_SIZE} and {MAX_GRID_SIZE}, got {size}"),
            });
        }
        Ok(size)
    }

    fn parse_radius(&self) -> Result<f64, ValidationError> {
        let raw = self.radius_km.trim();
        if raw.is_empty() {
            return Ok(QUICK_RADIUS_KM);
        }
        let radius = parse_f64(raw, "radius")?;
        if !(MIN_RADIUS_KM..=MAX_RADIUS_KM).contains(&radius) {
            return Err(ValidationError::OutOfRange {
                field: "radius",
                reason: format!("must be between {MIN_RADIUS_KM} and {MAX_RADIUS_KM} km, got {radius}"),
            });
        }
        Ok(radius)
    }

    fn parse_zoom(&self) -> Result<u8, ValidationError> {
        let raw = self.zoom.trim();
        if raw.is_empty() {
            return Ok(DEFAULT_ZOOM);
        }
        let zoom = raw.parse::<u8>().map_err(|_| ValidationError::Malformed {
            field: "zoom",
            value: raw.to_string(),
        })?;
        if !(MIN_ZOOM..=MAX_ZOOM).contains(&zoom) {
            return Err(ValidationError::OutOfRange {
                field: "zoom",
                reason: format!("must be between {MIN_ZOOM} and {MAX_ZOOM}, got {zoom}"),
            });
        }
        Ok(zoom)
    }

    fn parse_language(&self) -> Result<String, ValidationError> {
        let raw = self.language_code.trim().to_ascii_lowercase();
        if raw.is_empty() {
            return Ok(DEFAULT_LANGUAGE.to_string());
        }
        if !LANGUAGE_CODES.contains(&raw.as_str()) {
            return Err(ValidationError::OutOfRange {
                field: "language code",
                reason: format!("\"{raw}\" is not a supported language"),
            });
        }
        Ok(raw)
    }
}

fn required<'a>(value: &'a str, field: &'static str) -> Result<&'a str, ValidationError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(ValidationError::Missing { field });
    }
    Ok(trimmed)
}

fn parse_f64(raw: &str, field: &'static str) -> Result<f64, ValidationError> {
    raw.parse::<f64>()
        .ok()
        .filter(|v| v.is_finite())
        .ok_or_else(|| ValidationError::Malformed {
            field,
            value: raw.to_string(),
        })
}

/// Collapse whitespace, drop quote characters, and cap the length.
fn sanitize_business_name(name: &str) -> String {
    name.split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .chars()
        .filter(|c| *c != '"' && *c != '\'')
        .take(MAX_NAME_CHARS)
        .collect()
}

/// Reduce a user-entered domain or URL to its lowercase host.
///
/// Blank input yields `None`.
fn normalize_target_domain(raw: &str) -> Result<Option<String>, ValidationError> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Ok(None);
    }
    let candidate = if trimmed.contains("://") {
        trimmed.to_string()
    } else {
        format!("http://{trimmed}")
    };
    reqwest::Url::parse(&candidate)
        .ok()
        .and_then(|url| url.host_str().map(str::to_ascii_lowercase))
        .filter(|host| !host.is_empty())
        .map(Some)
        .ok_or_else(|| ValidationError::OutOfRange {
            field: "target domain",
            reason: format!("\"{trimmed}\" is not a valid domain"),
        })
}

#[cfg(test)]
#[path = "request_test.rs"]
mod tests;
