//! Free-text chat interpretation: regeneration intent and parameter overrides.
//!
//! Matching is deliberately literal. The trigger phrases, patterns and
//! numeric bounds are part of the user-facing contract.

use std::sync::LazyLock;

use rand::Rng;
use regex::Regex;

use crate::assessment::{AlgalBloomLevel, AssessmentResult, ResultOverrides};

pub const REGENERATION_TRIGGERS: &[&str] = &[
    "regenerate report",
    "update report",
    "recreate report",
    "adjust report",
    "change parameters",
    "modify values",
    "update values",
    "update assessment",
    "what if",
    "simulate different",
    "adjust parameters",
    "new scenario",
    "recalculate with",
];

pub const HIGH_ALGAL_BLOOM: (f64, AlgalBloomLevel) = (0.85, AlgalBloomLevel::High);
pub const LOW_ALGAL_BLOOM: (f64, AlgalBloomLevel) = (0.15, AlgalBloomLevel::Low);

const FALLBACK_DENSITY_RANGE: (i64, i64) = (50, 300);
const FALLBACK_COVER_RANGE: (i64, i64) = (10, 70);

macro_rules! phrase_pattern {
    ($name:ident, $regex_str:expr) => {
        static $name: LazyLock<Option<Regex>> = LazyLock::new(|| Regex::new($regex_str).ok());
    };
}

phrase_pattern!(RE_DENSITY_PHRASE, r"fish density (?:of|to|at) ([0-9]+)");
phrase_pattern!(RE_DENSITY_UNIT, r"([0-9]+) fish(?:es)?(?: per hectare| per ha)");
phrase_pattern!(RE_COVER_PHRASE, r"invertebrate cover (?:of|to|at) ([0-9]+)%");
phrase_pattern!(RE_COVER_PERCENT, r"([0-9]+)% invertebrate cover");
phrase_pattern!(RE_BLEACHING_PHRASE, r"coral bleaching (?:of|to|at) ([0-9]+)%");
phrase_pattern!(RE_BLEACHING_PERCENT, r"([0-9]+)% coral bleaching");

/// True when the text asks for the report to be regenerated.
pub fn is_regeneration_request(text: &str) -> bool {
    let lower = text.to_lowercase();
    REGENERATION_TRIGGERS.iter().any(|t| lower.contains(t))
}

/// First capture of the first pattern that matches at all.
///
/// The second phrasing is only consulted when the first one finds nothing,
/// so an out-of-range value in the first phrasing is not rescued by the
/// second.
fn capture_number(
    text: &str,
    primary: &LazyLock<Option<Regex>>,
    secondary: &LazyLock<Option<Regex>>,
) -> Option<i64> {
    let caps = [primary, secondary]
        .into_iter()
        .filter_map(|re| re.as_ref())
        .find_map(|re| re.captures(text))?;
    caps.get(1)?.as_str().parse().ok()
}

fn bounded(value: Option<i64>, max: i64) -> Option<i64> {
    value.filter(|v| (0..=max).contains(v))
}

/// Scan `text` for explicit parameter changes.
///
/// When nothing explicit is found and a current result exists, a random
/// "what-if" perturbation of density and cover is produced instead.
pub fn extract_adjustments<R: Rng + ?Sized>(
    text: &str,
    current: Option<&AssessmentResult>,
    rng: &mut R,
) -> ResultOverrides {
    let lower = text.to_lowercase();
    let mut out = ResultOverrides {
        fish_density: bounded(capture_number(&lower, &RE_DENSITY_PHRASE, &RE_DENSITY_UNIT), 500),
        invertebrate_cover: bounded(capture_number(&lower, &RE_COVER_PHRASE, &RE_COVER_PERCENT), 100),
        coral_bleaching: bounded(
            capture_number(&lower, &RE_BLEACHING_PHRASE, &RE_BLEACHING_PERCENT),
            100,
        ),
        ..Default::default()
    };

    let bloom = if lower.contains("high algal bloom") || lower.contains("increase algal bloom") {
        Some(HIGH_ALGAL_BLOOM)
    } else if lower.contains("low algal bloom") || lower.contains("reduce algal bloom") {
        Some(LOW_ALGAL_BLOOM)
    } else {
        None
    };
    if let Some((score, level)) = bloom {
        out.algal_bloom_score = Some(score);
        out.algal_bloom_level = Some(level);
    }

    if out.is_empty() {
        if let Some(current) = current {
            out = random_adjustments(current, rng);
        }
    }
    out
}

/// Perturb a value by up to 20% either way, then clamp.
///
/// A zero value is left out entirely; it has nothing to scale from.
fn perturb<R: Rng + ?Sized>(current: i64, (lo, hi): (i64, i64), rng: &mut R) -> Option<i64> {
    if current == 0 {
        return None;
    }
    let max_change = (current as f64 * 0.2).floor() as i64;
    let delta = if max_change > 0 {
        rng.gen_range(0..max_change * 2) - max_change
    } else {
        0
    };
    Some(current.saturating_add(delta).clamp(lo, hi))
}

fn random_adjustments<R: Rng + ?Sized>(current: &AssessmentResult, rng: &mut R) -> ResultOverrides {
    ResultOverrides {
        fish_density: perturb(current.fish_density, FALLBACK_DENSITY_RANGE, rng),
        invertebrate_cover: perturb(current.invertebrate_cover, FALLBACK_COVER_RANGE, rng),
        ..Default::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assessment::sample_result;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn rng() -> StdRng {
        StdRng::seed_from_u64(7)
    }

    #[test]
    fn test_regeneration_triggers() {
        assert!(is_regeneration_request("What if fish density were higher?"));
        assert!(is_regeneration_request("please RECALCULATE WITH more fish"));
        assert!(is_regeneration_request("try a new scenario"));
        assert!(!is_regeneration_request("hello"));
        assert!(!is_regeneration_request("regenerate the report"));
    }

    #[test]
    fn test_extract_density_and_bleaching() {
        let r = sample_result();
        let o = extract_adjustments("set fish density to 220 and 30% coral bleaching", Some(&r), &mut rng());
        assert_eq!(
            o,
            ResultOverrides {
                fish_density: Some(220),
                coral_bleaching: Some(30),
                ..Default::default()
            }
        );
    }

    #[test]
    fn test_extract_second_phrasings() {
        let o = extract_adjustments(
            "What if we saw 150 fishes per ha and 55% invertebrate cover?",
            None,
            &mut rng(),
        );
        assert_eq!(o.fish_density, Some(150));
        assert_eq!(o.invertebrate_cover, Some(55));
        assert_eq!(o.coral_bleaching, None);
    }

    #[test]
    fn test_extract_case_insensitive() {
        let o = extract_adjustments("Fish Density Of 75 and Coral Bleaching At 12%", None, &mut rng());
        assert_eq!(o.fish_density, Some(75));
        assert_eq!(o.coral_bleaching, Some(12));
    }

    #[test]
    fn test_extract_out_of_bounds_skipped() {
        let o = extract_adjustments(
            "fish density of 501 with invertebrate cover at 101% and coral bleaching of 100%",
            None,
            &mut rng(),
        );
        assert_eq!(o.fish_density, None);
        assert_eq!(o.invertebrate_cover, None);
        assert_eq!(o.coral_bleaching, Some(100));
    }

    #[test]
    fn test_first_phrasing_wins_even_when_out_of_range() {
        let o = extract_adjustments("fish density of 900, or 120 fish per hectare", None, &mut rng());
        assert_eq!(o.fish_density, None);
    }

    #[test]
    fn test_overflowing_number_skipped() {
        let o = extract_adjustments("fish density to 99999999999999999999999", None, &mut rng());
        assert!(o.is_empty());
    }

    #[test]
    fn test_algal_bloom_levels() {
        let r = sample_result();
        let high = extract_adjustments("make it high algal bloom", Some(&r), &mut rng());
        assert_eq!(
            high,
            ResultOverrides {
                algal_bloom_score: Some(0.85),
                algal_bloom_level: Some(AlgalBloomLevel::High),
                ..Default::default()
            }
        );

        let low = extract_adjustments("reduce algal bloom please", Some(&r), &mut rng());
        assert_eq!(low.algal_bloom_level, Some(AlgalBloomLevel::Low));
        assert_eq!(low.algal_bloom_score, Some(0.15));

        let both = extract_adjustments("low algal bloom or high algal bloom", Some(&r), &mut rng());
        assert_eq!(both.algal_bloom_level, Some(AlgalBloomLevel::High));
    }

    #[test]
    fn test_fallback_bounds() {
        let r = sample_result();
        for seed in 0..200 {
            let mut rng = StdRng::seed_from_u64(seed);
            let o = extract_adjustments("what if", Some(&r), &mut rng);
            let d = o.fish_density.unwrap();
            let c = o.invertebrate_cover.unwrap();
            assert!((160..=240).contains(&d), "density {}", d);
            assert!((32..=48).contains(&c), "cover {}", c);
            assert_eq!(o.coral_bleaching, None);
        }
    }

    #[test]
    fn test_fallback_clamps_to_simulation_range() {
        let mut r = sample_result();
        r.fish_density = 450;
        r.invertebrate_cover = 5;
        for seed in 0..50 {
            let mut rng = StdRng::seed_from_u64(seed);
            let o = extract_adjustments("new scenario", Some(&r), &mut rng);
            assert!(o.fish_density.unwrap() <= 300);
            assert_eq!(o.invertebrate_cover, Some(10));
        }
    }

    #[test]
    fn test_fallback_on_extreme_values_saturates() {
        let mut r = sample_result();
        r.fish_density = i64::MAX;
        r.invertebrate_cover = i64::MIN;
        let o = extract_adjustments("what if", Some(&r), &mut rng());
        assert_eq!(o.fish_density, Some(300));
        assert_eq!(o.invertebrate_cover, Some(10));
    }

    #[test]
    fn test_no_fallback_without_result() {
        let o = extract_adjustments("what if", None, &mut rng());
        assert!(o.is_empty());
    }
}
