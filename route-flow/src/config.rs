use serde::{Deserialize, Serialize};

use crate::map::{Inset, LatLng};

/// Seoul City Hall; where the map opens before any place is known.
pub const DEFAULT_CENTER: LatLng = LatLng::new(37.5665, 126.9780);
pub const DEFAULT_ZOOM: u8 = 14;
pub const DEFAULT_FIT_INSET_PX: u32 = 40;
pub const DEFAULT_MAX_FIT_ZOOM: u8 = 17;

/// Viewport behaviour of the overlay engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MapConfig {
    pub default_center: LatLng,
    pub default_zoom: u8,
    /// Margin kept clear around a route when fitting the viewport.
    pub fit_inset: Inset,
    /// Upper bound for fits, so a one-place route does not zoom to street level.
    pub max_fit_zoom: u8,
}

impl Default for MapConfig {
    fn default() -> Self {
        Self {
            default_center: DEFAULT_CENTER,
            default_zoom: DEFAULT_ZOOM,
            fit_inset: Inset::uniform(DEFAULT_FIT_INSET_PX),
            max_fit_zoom: DEFAULT_MAX_FIT_ZOOM,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_config_falls_back_to_defaults() {
        let config: MapConfig = serde_json::from_str(r#"{ "default_zoom": 12 }"#).unwrap();
        assert_eq!(config.default_zoom, 12);
        assert_eq!(config.default_center, DEFAULT_CENTER);
        assert_eq!(config.fit_inset, Inset::uniform(DEFAULT_FIT_INSET_PX));
    }
}
