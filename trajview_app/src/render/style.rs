//! Per-source trajectory styles.

use crate::error::RenderError;
use image::Rgba;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use trajview_env::{GROUND_TRUTH, PDM_CLOSED, PREDICTION};

/// Line pattern. Accepts matplotlib-style `"-"` / `"--"` in config files.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LineStyle {
    #[serde(alias = "-")]
    Solid,
    #[serde(alias = "--")]
    Dashed,
}

/// Marker shape. Accepts `"o"`, `"s"`, `"^"`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MarkerShape {
    #[serde(alias = "o")]
    Circle,
    #[serde(alias = "s")]
    Square,
    #[serde(alias = "^")]
    Triangle,
}

/// How one trajectory source is drawn.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrajectoryStyle {
    /// `#RRGGBB`
    pub color: String,
    pub style: LineStyle,
    /// Line width in pixels
    pub width: f32,
    pub alpha: f64,
    pub label: String,
    pub marker: MarkerShape,
    /// Marker radius in pixels
    pub marker_size: f32,
}

impl TrajectoryStyle {
    /// Colour with the given opacity (0..1).
    pub fn rgba(&self, alpha: f64) -> Result<Rgba<u8>, RenderError> {
        let [r, g, b] = parse_hex_color(&self.color)?;
        Ok(Rgba([r, g, b, (alpha.clamp(0.0, 1.0) * 255.0).round() as u8]))
    }

    fn apply(&mut self, o: &StyleOverride) {
        if let Some(color) = &o.color {
            self.color = color.clone();
        }
        if let Some(style) = o.style {
            self.style = style;
        }
        if let Some(width) = o.width {
            self.width = width;
        }
        if let Some(alpha) = o.alpha {
            self.alpha = alpha;
        }
        if let Some(label) = &o.label {
            self.label = label.clone();
        }
        if let Some(marker) = o.marker {
            self.marker = marker;
        }
        if let Some(size) = o.marker_size {
            self.marker_size = size;
        }
    }
}

/// Partial style from the configuration file.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StyleOverride {
    pub color: Option<String>,
    pub style: Option<LineStyle>,
    pub width: Option<f32>,
    pub alpha: Option<f64>,
    pub label: Option<String>,
    pub marker: Option<MarkerShape>,
    pub marker_size: Option<f32>,
}

/// Parses `#RRGGBB` (leading `#` optional).
pub fn parse_hex_color(s: &str) -> Result<[u8; 3], RenderError> {
    let hex = s.trim().trim_start_matches('#');
    if hex.len() != 6 || !hex.is_ascii() {
        return Err(RenderError::InvalidColor(s.to_string()));
    }
    let channel = |i: usize| {
        u8::from_str_radix(&hex[i..i + 2], 16).map_err(|_| RenderError::InvalidColor(s.to_string()))
    };
    Ok([channel(0)?, channel(2)?, channel(4)?])
}

/// Styles keyed by source name, in drawing order.
#[derive(Debug, Clone, PartialEq)]
pub struct StyleSet {
    styles: BTreeMap<String, TrajectoryStyle>,
}

impl Default for StyleSet {
    fn default() -> Self {
        let styles = BTreeMap::from([
            (
                PREDICTION.to_string(),
                TrajectoryStyle {
                    color: "#DC143C".to_string(),
                    style: LineStyle::Solid,
                    width: 3.0,
                    alpha: 0.8,
                    label: "Model Prediction".to_string(),
                    marker: MarkerShape::Circle,
                    marker_size: 4.0,
                },
            ),
            (
                GROUND_TRUTH.to_string(),
                TrajectoryStyle {
                    color: "#2E8B57".to_string(),
                    style: LineStyle::Solid,
                    width: 3.0,
                    alpha: 0.9,
                    label: "Ground Truth".to_string(),
                    marker: MarkerShape::Square,
                    marker_size: 4.0,
                },
            ),
            (
                PDM_CLOSED.to_string(),
                TrajectoryStyle {
                    color: "#4169E1".to_string(),
                    style: LineStyle::Dashed,
                    width: 2.0,
                    alpha: 0.7,
                    label: "PDM-Closed".to_string(),
                    marker: MarkerShape::Triangle,
                    marker_size: 3.0,
                },
            ),
        ]);
        Self { styles }
    }
}

impl StyleSet {
    /// Defaults with config overrides applied. Unknown source names are
    /// ignored; colours are validated up front.
    pub fn with_overrides(overrides: &BTreeMap<String, StyleOverride>) -> Result<Self, RenderError> {
        let mut set = Self::default();
        for (name, o) in overrides {
            match set.styles.get_mut(name) {
                Some(style) => style.apply(o),
                None => tracing::warn!("Ignoring style for unknown trajectory source '{}'", name),
            }
        }
        for style in set.styles.values() {
            parse_hex_color(&style.color)?;
        }
        Ok(set)
    }

    pub fn get(&self, name: &str) -> Option<&TrajectoryStyle> {
        self.styles.get(name)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &TrajectoryStyle)> {
        self.styles.iter().map(|(k, v)| (k.as_str(), v))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_hex_color() {
        assert_eq!(parse_hex_color("#DC143C").unwrap(), [220, 20, 60]);
        assert_eq!(parse_hex_color("2e8b57").unwrap(), [46, 139, 87]);
        assert!(parse_hex_color("#12345").is_err());
        assert!(parse_hex_color("#GG0000").is_err());
    }

    #[test]
    fn test_defaults() {
        let set = StyleSet::default();
        let pdm = set.get(PDM_CLOSED).unwrap();
        assert_eq!(pdm.style, LineStyle::Dashed);
        assert_eq!(pdm.marker, MarkerShape::Triangle);
        assert_eq!(set.get(PREDICTION).unwrap().rgba(1.0).unwrap(), Rgba([220, 20, 60, 255]));
    }

    #[test]
    fn test_overrides_from_yaml() {
        let yaml = r##"
prediction:
  color: "#FF8800"
  style: "--"
  marker: "^"
unknown_source:
  width: 9
"##;
        let overrides: BTreeMap<String, StyleOverride> = serde_yaml::from_str(yaml).unwrap();
        let set = StyleSet::with_overrides(&overrides).unwrap();
        let pred = set.get(PREDICTION).unwrap();
        assert_eq!(pred.color, "#FF8800");
        assert_eq!(pred.style, LineStyle::Dashed);
        assert_eq!(pred.marker, MarkerShape::Triangle);
        // untouched fields keep their defaults
        assert_eq!(pred.label, "Model Prediction");
        assert!(set.get("unknown_source").is_none());
    }

    #[test]
    fn test_invalid_override_color() {
        let overrides = BTreeMap::from([(
            GROUND_TRUTH.to_string(),
            StyleOverride {
                color: Some("green".to_string()),
                ..Default::default()
            },
        )]);
        assert!(matches!(
            StyleSet::with_overrides(&overrides),
            Err(RenderError::InvalidColor(_))
        ));
    }
}
