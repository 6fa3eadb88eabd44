use serde::{Deserialize, Serialize};

/// Bounds type used when a placement carries no bounding box.
pub const BOUNDS_NONE: &str = "OBS_BOUNDS_NONE";

/// Live geometry of a placement, in the compositor's wire representation.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Transform {
    pub position_x: f64,
    pub position_y: f64,
    /// Degrees, clockwise.
    pub rotation: f64,
    pub scale_x: f64,
    pub scale_y: f64,
    pub crop_top: i64,
    pub crop_bottom: i64,
    pub crop_left: i64,
    pub crop_right: i64,
    pub alignment: i64,
    pub bounds_alignment: i64,
    pub bounds_type: String,
    pub bounds_width: f64,
    pub bounds_height: f64,
    /// Unscaled size of the placed source.
    pub source_width: f64,
    pub source_height: f64,
    /// Rendered size, always `scale * source` size.
    pub width: f64,
    pub height: f64,
}

impl Default for Transform {
    fn default() -> Self {
        Self {
            position_x: 0.0,
            position_y: 0.0,
            rotation: 0.0,
            scale_x: 1.0,
            scale_y: 1.0,
            crop_top: 0,
            crop_bottom: 0,
            crop_left: 0,
            crop_right: 0,
            alignment: 0,
            bounds_alignment: 0,
            bounds_type: BOUNDS_NONE.to_string(),
            bounds_width: 0.0,
            bounds_height: 0.0,
            source_width: 0.0,
            source_height: 0.0,
            width: 0.0,
            height: 0.0,
        }
    }
}

impl Transform {
    /// Merge every field present in `patch`, then refresh the derived size.
    pub fn apply(&mut self, patch: &TransformPatch) {
        fn set<T: Clone>(dst: &mut T, src: &Option<T>) {
            if let Some(v) = src {
                *dst = v.clone();
            }
        }

        set(&mut self.position_x, &patch.position_x);
        set(&mut self.position_y, &patch.position_y);
        set(&mut self.rotation, &patch.rotation);
        set(&mut self.scale_x, &patch.scale_x);
        set(&mut self.scale_y, &patch.scale_y);
        set(&mut self.crop_top, &patch.crop_top);
        set(&mut self.crop_bottom, &patch.crop_bottom);
        set(&mut self.crop_left, &patch.crop_left);
        set(&mut self.crop_right, &patch.crop_right);
        set(&mut self.alignment, &patch.alignment);
        set(&mut self.bounds_alignment, &patch.bounds_alignment);
        set(&mut self.bounds_type, &patch.bounds_type);
        set(&mut self.bounds_width, &patch.bounds_width);
        set(&mut self.bounds_height, &patch.bounds_height);

        self.update_size_from_source(None, None);
    }

    /// Replace the source dimensions that are provided and recompute `width`/`height`.
    pub fn update_size_from_source(&mut self, source_width: Option<f64>, source_height: Option<f64>) {
        if let Some(w) = source_width {
            self.source_width = w;
        }
        if let Some(h) = source_height {
            self.source_height = h;
        }
        self.width = self.scale_x * self.source_width;
        self.height = self.scale_y * self.source_height;
    }
}

/// Partial transform: only the fields that are `Some` are sent and merged.
///
/// Source and rendered dimensions are owned by the compositor and therefore not part of the
/// patch.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransformPatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub position_x: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub position_y: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rotation: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scale_x: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scale_y: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub crop_top: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub crop_bottom: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub crop_left: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub crop_right: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub alignment: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bounds_alignment: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bounds_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bounds_width: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bounds_height: Option<f64>,
}

impl TransformPatch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn position(mut self, x: f64, y: f64) -> Self {
        self.position_x = Some(x);
        self.position_y = Some(y);
        self
    }

    pub fn scale(mut self, x: f64, y: f64) -> Self {
        self.scale_x = Some(x);
        self.scale_y = Some(y);
        self
    }

    pub fn rotation(mut self, degrees: f64) -> Self {
        self.rotation = Some(degrees);
        self
    }

    /// Crop in pixels, `[top, right, bottom, left]`.
    pub fn crop(mut self, top: i64, right: i64, bottom: i64, left: i64) -> Self {
        self.crop_top = Some(top);
        self.crop_right = Some(right);
        self.crop_bottom = Some(bottom);
        self.crop_left = Some(left);
        self
    }

    pub fn alignment(mut self, alignment: i64) -> Self {
        self.alignment = Some(alignment);
        self
    }

    pub fn bounds(mut self, kind: impl Into<String>, width: f64, height: f64) -> Self {
        self.bounds_type = Some(kind.into());
        self.bounds_width = Some(width);
        self.bounds_height = Some(height);
        self
    }

    /// `true` when no field is set.
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

#[cfg(test)]
#[path = "../../tests/unit/foundation/geometry.rs"]
mod tests;
