//! Grid conventions and how they are resolved per extracted file.
//!
//! The source data comes in two physical-grid layouts. WRF output lives on a
//! 210-row native grid and gets the real land mask as an extra channel, while
//! reanalysis files use a 67x215 regular grid and get an all-zero mask plane.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::LoaderError;

/// Named physical-grid convention of an extracted file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GridConvention {
    /// Native WRF grid; the loaded static mask is stacked in.
    Wrf,
    /// Reanalysis grid; a zero mask of [`ERA_MASK_SHAPE`] is stacked in.
    Era,
}

/// Leading spatial extent that identifies the WRF grid.
pub const WRF_GRID_ROWS: usize = 210;

/// Shape `(rows, cols)` of the zero mask used for the reanalysis grid.
pub const ERA_MASK_SHAPE: (usize, usize) = (67, 215);

impl GridConvention {
    /// Classify a grid from its spatial extent `(rows, cols)`.
    pub fn infer(rows: usize, _cols: usize) -> Self {
        if rows == WRF_GRID_ROWS {
            Self::Wrf
        } else {
            Self::Era
        }
    }

    /// Whether the convention uses the real loaded mask.
    pub fn uses_static_mask(&self) -> bool {
        matches!(self, Self::Wrf)
    }

    /// Fixed mask shape for conventions that substitute a zero plane.
    pub fn zero_mask_shape(&self) -> Option<(usize, usize)> {
        match self {
            Self::Wrf => None,
            Self::Era => Some(ERA_MASK_SHAPE),
        }
    }

    /// Look up a convention by name (case-insensitive).
    pub fn from_name(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "wrf" => Some(Self::Wrf),
            "era" | "era5" => Some(Self::Era),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Wrf => "wrf",
            Self::Era => "era",
        }
    }
}

impl fmt::Display for GridConvention {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How the convention of each extracted file is decided.
///
/// Serialized as `"infer"` or a convention name (`"wrf"`, `"era"`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum ConventionPolicy {
    /// Classify every file from its own grid extent.
    #[default]
    InferFromExtent,
    /// Every file of the source follows the given convention.
    Declared(GridConvention),
}

impl ConventionPolicy {
    /// Resolve the convention for one extracted `(time, channel, rows, cols)` array.
    pub fn resolve(&self, shape: (usize, usize, usize, usize)) -> GridConvention {
        match self {
            Self::InferFromExtent => GridConvention::infer(shape.2, shape.3),
            Self::Declared(convention) => *convention,
        }
    }
}

/// Parses `infer` (or `auto`) or a convention name, case-insensitively.
///
/// Unknown names are rejected rather than falling back to inference.
impl FromStr for ConventionPolicy {
    type Err = LoaderError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "infer" | "auto" => Ok(Self::InferFromExtent),
            other => GridConvention::from_name(other)
                .map(Self::Declared)
                .ok_or_else(|| {
                    LoaderError::config(format!(
                        "unknown grid convention '{}' (expected infer, wrf or era)",
                        s
                    ))
                }),
        }
    }
}

impl TryFrom<String> for ConventionPolicy {
    type Error = LoaderError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<ConventionPolicy> for String {
    fn from(policy: ConventionPolicy) -> Self {
        match policy {
            ConventionPolicy::InferFromExtent => "infer".to_string(),
            ConventionPolicy::Declared(convention) => convention.as_str().to_string(),
        }
    }
}
