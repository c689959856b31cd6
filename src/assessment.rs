//! Assessment results and the derived Fish Health Index.
//!
//! An `AssessmentResult` is either received verbatim from the analysis
//! server, synthesized by the location simulator, or regenerated from a
//! prior result plus a sparse set of overrides. The Fish Health Index is
//! never set directly: it is recomputed whenever density or cover change.

use serde::{Deserialize, Serialize};

/// Density that maps to a full score in the FHI.
pub const FHI_DENSITY_SCALE: f64 = 300.0;
pub const FHI_DENSITY_WEIGHT: f64 = 0.6;
pub const FHI_COVER_WEIGHT: f64 = 0.4;

/// Weighted composite of normalized fish density and invertebrate cover.
///
/// No clamping is applied; callers own the input ranges. NaN propagates.
pub fn compute_fish_health_index(fish_density: f64, invertebrate_cover: f64) -> f64 {
    (fish_density / FHI_DENSITY_SCALE) * FHI_DENSITY_WEIGHT
        + (invertebrate_cover / 100.0) * FHI_COVER_WEIGHT
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinates {
    pub lat: f64,
    pub lng: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AlgalBloomLevel {
    Low,
    High,
}

impl AlgalBloomLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            AlgalBloomLevel::Low => "Low",
            AlgalBloomLevel::High => "High",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssessmentResult {
    pub location: String,
    pub coordinates: Coordinates,
    pub fish_density: i64,
    pub invertebrate_cover: i64,
    pub coral_bleaching: i64,
    pub invasive_species: u32,
    pub algal_bloom_score: f64,
    pub algal_bloom_level: AlgalBloomLevel,
    pub fish_health_index: f64,
    pub date: String,
    pub diver: String,
    pub depth_range: String,
    pub video_filename: String,
    pub session_id: String,
    #[serde(default, rename = "isRegenerated", skip_serializing_if = "std::ops::Not::not")]
    pub is_regenerated: bool,
}

impl AssessmentResult {
    /// Recompute the FHI from the current density and cover.
    pub fn refresh_fish_health_index(&mut self) {
        self.fish_health_index =
            compute_fish_health_index(self.fish_density as f64, self.invertebrate_cover as f64);
    }
}

/// Sparse set of field overrides for a regeneration.
///
/// Only `Some` fields are applied. `fish_health_index` is deliberately
/// absent; deserializing from a JSON map drops any key that is not a field
/// here, including that one.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ResultOverrides {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fish_density: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub invertebrate_cover: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub coral_bleaching: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub invasive_species: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub algal_bloom_score: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub algal_bloom_level: Option<AlgalBloomLevel>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub date: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub diver: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub depth_range: Option<String>,
}

impl ResultOverrides {
    pub fn is_empty(&self) -> bool {
        self == &ResultOverrides::default()
    }

    /// Names of the fields that will change, in wire naming.
    pub fn keys(&self) -> Vec<&'static str> {
        let mut keys = Vec::new();
        if self.fish_density.is_some() {
            keys.push("fish_density");
        }
        if self.invertebrate_cover.is_some() {
            keys.push("invertebrate_cover");
        }
        if self.coral_bleaching.is_some() {
            keys.push("coral_bleaching");
        }
        if self.invasive_species.is_some() {
            keys.push("invasive_species");
        }
        if self.algal_bloom_score.is_some() {
            keys.push("algal_bloom_score");
        }
        if self.algal_bloom_level.is_some() {
            keys.push("algal_bloom_level");
        }
        if self.location.is_some() {
            keys.push("location");
        }
        if self.date.is_some() {
            keys.push("date");
        }
        if self.diver.is_some() {
            keys.push("diver");
        }
        if self.depth_range.is_some() {
            keys.push("depth_range");
        }
        keys
    }
}

/// Build a new result from `current` with `overrides` applied.
///
/// The input is never mutated. The FHI is recomputed after density or
/// cover is applied, so the invariant holds regardless of which subset is
/// present.
pub fn regenerate(current: &AssessmentResult, overrides: &ResultOverrides) -> AssessmentResult {
    let mut next = current.clone();

    if let Some(d) = overrides.fish_density {
        next.fish_density = d;
        next.refresh_fish_health_index();
    }
    if let Some(c) = overrides.invertebrate_cover {
        next.invertebrate_cover = c;
        next.refresh_fish_health_index();
    }
    if let Some(b) = overrides.coral_bleaching {
        next.coral_bleaching = b;
    }
    if let Some(n) = overrides.invasive_species {
        next.invasive_species = n;
    }
    if let Some(s) = overrides.algal_bloom_score {
        next.algal_bloom_score = s;
    }
    if let Some(level) = overrides.algal_bloom_level {
        next.algal_bloom_level = level;
    }
    if let Some(location) = &overrides.location {
        next.location = location.clone();
    }
    if let Some(date) = &overrides.date {
        next.date = date.clone();
    }
    if let Some(diver) = &overrides.diver {
        next.diver = diver.clone();
    }
    if let Some(depth) = &overrides.depth_range {
        next.depth_range = depth.clone();
    }

    next.is_regenerated = true;
    next
}

#[cfg(test)]
pub(crate) fn sample_result() -> AssessmentResult {
    let mut r = AssessmentResult {
        location: "La Paz".to_string(),
        coordinates: Coordinates { lat: 24.1426, lng: -110.3128 },
        fish_density: 200,
        invertebrate_cover: 40,
        coral_bleaching: 20,
        invasive_species: 0,
        algal_bloom_score: 0.15,
        algal_bloom_level: AlgalBloomLevel::Low,
        fish_health_index: 0.0,
        date: "2025-06-26".to_string(),
        diver: "Simulated Divemaster".to_string(),
        depth_range: "8-15 m".to_string(),
        video_filename: "dive.mp4".to_string(),
        session_id: "abc12345".to_string(),
        is_regenerated: false,
    };
    r.refresh_fish_health_index();
    r
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fhi_formula_grid() {
        for d in 0..=300 {
            for c in (0..=100).step_by(5) {
                let expected = d as f64 / 300.0 * 0.6 + c as f64 / 100.0 * 0.4;
                let got = compute_fish_health_index(d as f64, c as f64);
                assert!((got - expected).abs() < 1e-9, "d={} c={}", d, c);
            }
        }
    }

    #[test]
    fn test_fhi_extremes() {
        assert_eq!(compute_fish_health_index(0.0, 0.0), 0.0);
        assert!((compute_fish_health_index(300.0, 100.0) - 1.0).abs() < 1e-12);
        assert!(compute_fish_health_index(f64::NAN, 50.0).is_nan());
        // No clamping: out-of-range density scores above 1.
        assert!(compute_fish_health_index(600.0, 100.0) > 1.0);
    }

    #[test]
    fn test_regenerate_density_recomputes_fhi() {
        let mut r = sample_result();
        r.fish_density = 100;
        r.refresh_fish_health_index();
        let out = regenerate(
            &r,
            &ResultOverrides { fish_density: Some(200), ..Default::default() },
        );
        assert_eq!(out.fish_density, 200);
        assert_eq!(out.invertebrate_cover, 40);
        let expected = compute_fish_health_index(200.0, 40.0);
        assert!((out.fish_health_index - expected).abs() < 1e-9);
        assert!(out.is_regenerated);
        // source untouched
        assert_eq!(r.fish_density, 100);
        assert!(!r.is_regenerated);
    }

    #[test]
    fn test_regenerate_both_inputs_uses_latest_values() {
        let r = sample_result();
        let out = regenerate(
            &r,
            &ResultOverrides {
                fish_density: Some(90),
                invertebrate_cover: Some(65),
                ..Default::default()
            },
        );
        let expected = compute_fish_health_index(90.0, 65.0);
        assert!((out.fish_health_index - expected).abs() < 1e-9);
    }

    #[test]
    fn test_regenerate_non_fhi_field_keeps_index() {
        let r = sample_result();
        let out = regenerate(
            &r,
            &ResultOverrides {
                coral_bleaching: Some(30),
                algal_bloom_score: Some(0.85),
                algal_bloom_level: Some(AlgalBloomLevel::High),
                ..Default::default()
            },
        );
        assert_eq!(out.coral_bleaching, 30);
        assert_eq!(out.algal_bloom_level, AlgalBloomLevel::High);
        assert_eq!(out.fish_health_index, r.fish_health_index);
    }

    #[test]
    fn test_overrides_from_json_ignore_unknown_keys() {
        let raw = r#"{"fish_density": 120, "fish_health_index": 0.99, "mood": "happy"}"#;
        let o: ResultOverrides = serde_json::from_str(raw).unwrap();
        assert_eq!(o.fish_density, Some(120));
        assert_eq!(o.keys(), vec!["fish_density"]);

        let out = regenerate(&sample_result(), &o);
        let expected = compute_fish_health_index(120.0, 40.0);
        assert!((out.fish_health_index - expected).abs() < 1e-9);
    }

    #[test]
    fn test_result_wire_format() {
        let raw = r#"{
            "location": "Loreto",
            "coordinates": {"lat": 26.0115, "lng": -111.3486},
            "fish_density": 410,
            "invertebrate_cover": 33,
            "coral_bleaching": 20,
            "invasive_species": 0,
            "algal_bloom_score": 0.85,
            "algal_bloom_level": "High",
            "fish_health_index": 0.952,
            "date": "2025-06-26",
            "diver": "Simulated Divemaster",
            "depth_range": "7-14 m",
            "video_filename": "algal_bloom_dive.mp4",
            "session_id": "1f2e3d4c"
        }"#;
        let r: AssessmentResult = serde_json::from_str(raw).unwrap();
        assert_eq!(r.fish_density, 410);
        assert_eq!(r.algal_bloom_level, AlgalBloomLevel::High);
        assert!(!r.is_regenerated);

        let regen = regenerate(&r, &ResultOverrides::default());
        let v = serde_json::to_value(&regen).unwrap();
        assert_eq!(v["isRegenerated"], true);
    }
}
