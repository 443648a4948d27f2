//! Shadow configuration record.

use std::path::PathBuf;

use glam::DVec2;
use serde::{Deserialize, Serialize};

use crate::error::{CoreError, CoreResult};

/// Denominator of the light distance fraction, also its upper bound.
pub const LIGHT_DISTANCE_FRACTION_DENOMINATOR: i64 = 100_000;

/// Default numerator of the light distance fraction.
pub const DEFAULT_LIGHT_DISTANCE_FRACTION: i64 = 10;

/// Default shadow map edge length in texels.
pub const DEFAULT_DEPTH_TEXTURE_SIZE: u32 = 1024;

/// Largest accepted shadow map edge length.
pub const MAX_DEPTH_TEXTURE_SIZE: u32 = 16384;

/// Scene graph node used as the light source unless configured otherwise.
pub const DEFAULT_LIGHT_SOURCE: &str = "Sun";

/// Configuration of a shadow pass.
///
/// Every field is optional in the serialized form; absent fields take the
/// values of [`ShadowConfig::default`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ShadowConfig {
    /// Path to the one-dimensional ring texture. Carried, not loaded.
    pub texture: Option<String>,
    /// Radius of the shadow casting rings in meters.
    pub size: f64,
    /// Inner and outer extent of the rings as fractions of `size`.
    pub offset: DVec2,
    /// Multiplicative darkening of the side facing away from the light.
    pub night_factor: f64,
    /// Color length threshold used for ring transparency.
    pub transparency: f64,
    /// Whether shadows are computed at all.
    pub enabled: bool,
    /// Numerator over [`LIGHT_DISTANCE_FRACTION_DENOMINATOR`] of the true light
    /// distance at which the light camera is placed.
    pub light_distance_fraction: i64,
    /// One-shot request to dump the depth buffer after the next pass.
    pub save_depth_texture: bool,
    /// Scene graph node providing the light position.
    pub light_source: String,
    /// Shadow map resolution as `[width, height]`.
    pub depth_texture_size: [u32; 2],
    /// Whether to attach the auxiliary position-in-light-space target.
    pub position_texture: bool,
    /// Directory receiving depth buffer dumps.
    pub dump_directory: PathBuf,
}

impl Default for ShadowConfig {
    fn default() -> Self {
        Self {
            texture: None,
            size: 1.0,
            offset: DVec2::new(0.0, 1.0),
            night_factor: 0.33,
            transparency: 0.15,
            enabled: true,
            light_distance_fraction: DEFAULT_LIGHT_DISTANCE_FRACTION,
            save_depth_texture: false,
            light_source: DEFAULT_LIGHT_SOURCE.to_owned(),
            depth_texture_size: [DEFAULT_DEPTH_TEXTURE_SIZE; 2],
            position_texture: true,
            dump_directory: PathBuf::from("."),
        }
    }
}

impl ShadowConfig {
    /// Parses and validates a JSON configuration record.
    pub fn from_json(source: &str) -> CoreResult<Self> {
        let config: Self = serde_json::from_str(source)?;
        config.validate()?;
        Ok(config)
    }

    /// Checks every field against its documented range.
    pub fn validate(&self) -> CoreResult<()> {
        if !self.size.is_finite() || self.size < 0.0 {
            return Err(CoreError::validation(
                "size",
                format!("must be a finite non-negative number, got {}", self.size),
            ));
        }
        for value in [self.offset.x, self.offset.y] {
            if !(0.0..=1.0).contains(&value) {
                return Err(CoreError::validation(
                    "offset",
                    format!("components must be within [0, 1], got {value}"),
                ));
            }
        }
        if self.offset.x > self.offset.y {
            return Err(CoreError::validation(
                "offset",
                format!(
                    "inner extent {} exceeds outer extent {}",
                    self.offset.x, self.offset.y
                ),
            ));
        }
        if !(0.0..=1.0).contains(&self.night_factor) {
            return Err(CoreError::validation(
                "night_factor",
                format!("must be within [0, 1], got {}", self.night_factor),
            ));
        }
        if !self.transparency.is_finite() || self.transparency < 0.0 {
            return Err(CoreError::validation(
                "transparency",
                format!(
                    "must be a finite non-negative number, got {}",
                    self.transparency
                ),
            ));
        }
        validate_light_distance_fraction(self.light_distance_fraction)?;
        if self.light_source.trim().is_empty() {
            return Err(CoreError::validation(
                "light_source",
                "must name a scene graph node",
            ));
        }
        let [width, height] = self.depth_texture_size;
        if width == 0
            || height == 0
            || width > MAX_DEPTH_TEXTURE_SIZE
            || height > MAX_DEPTH_TEXTURE_SIZE
        {
            return Err(CoreError::validation(
                "depth_texture_size",
                format!(
                    "dimensions must be within [1, {MAX_DEPTH_TEXTURE_SIZE}], got {width}x{height}"
                ),
            ));
        }
        Ok(())
    }

    /// Documentation for every recognized field, in declaration order.
    pub fn documentation() -> &'static [FieldDoc] {
        FIELD_DOCS
    }
}

/// Rejects fractions outside `[1, LIGHT_DISTANCE_FRACTION_DENOMINATOR]`.
pub fn validate_light_distance_fraction(fraction: i64) -> CoreResult<()> {
    if (1..=LIGHT_DISTANCE_FRACTION_DENOMINATOR).contains(&fraction) {
        Ok(())
    } else {
        Err(CoreError::validation(
            "light_distance_fraction",
            format!(
                "must be within [1, {LIGHT_DISTANCE_FRACTION_DENOMINATOR}], got {fraction}"
            ),
        ))
    }
}

/// Describes one configuration field for property editors and docs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldDoc {
    /// Serialized field name.
    pub identifier: &'static str,
    /// Display name.
    pub gui_name: &'static str,
    /// Long description.
    pub description: &'static str,
    /// Whether the field may be omitted.
    pub optional: bool,
}

const FIELD_DOCS: &[FieldDoc] = &[
    FieldDoc {
        identifier: "texture",
        gui_name: "Texture",
        description: "Path to a texture on disk containing a one-dimensional texture used \
                      for the rings.",
        optional: true,
    },
    FieldDoc {
        identifier: "size",
        gui_name: "Size",
        description: "Radius of the rings in meters.",
        optional: true,
    },
    FieldDoc {
        identifier: "offset",
        gui_name: "Offset",
        description: "Limits the width of the rings. Both values lie in [0, 1], where 0 is \
                      the center of the ring and 1 the maximum extent at the radius. \
                      {0.5, 1.0} shows the ring between radius/2 and radius.",
        optional: true,
    },
    FieldDoc {
        identifier: "night_factor",
        gui_name: "Night Factor",
        description: "Multiplicative factor applied to the side of the rings facing away \
                      from the light. A value of 1 disables darkening.",
        optional: true,
    },
    FieldDoc {
        identifier: "transparency",
        gui_name: "Transparency",
        description: "For this value v, ring transparency equals length(color) / v.",
        optional: true,
    },
    FieldDoc {
        identifier: "enabled",
        gui_name: "Enabled",
        description: "Enable or disable shadows.",
        optional: true,
    },
    FieldDoc {
        identifier: "light_distance_fraction",
        gui_name: "Light Distance Fraction",
        description: "Fraction, out of 100000, of the true light distance at which the \
                      shadow camera is placed.",
        optional: true,
    },
    FieldDoc {
        identifier: "save_depth_texture",
        gui_name: "Save Depth Texture",
        description: "Writes the depth buffer to disk after the next shadow pass.",
        optional: true,
    },
    FieldDoc {
        identifier: "light_source",
        gui_name: "Light Source",
        description: "Scene graph node whose world position is the light position.",
        optional: true,
    },
    FieldDoc {
        identifier: "depth_texture_size",
        gui_name: "Depth Texture Size",
        description: "Shadow map resolution as [width, height].",
        optional: true,
    },
    FieldDoc {
        identifier: "position_texture",
        gui_name: "Position Texture",
        description: "Attach an auxiliary target storing positions in light space.",
        optional: true,
    },
    FieldDoc {
        identifier: "dump_directory",
        gui_name: "Dump Directory",
        description: "Directory receiving depth buffer dumps.",
        optional: true,
    },
];
