/// Weighted scoring of free-text vendor analyses.
///
/// The completion provider is asked to report one score per configured metric, but its
/// output format is not trusted. For each metric the human-readable label is located
/// anywhere in the text (case-insensitive), and the first run of digits or `N/A` after it
/// is taken as that metric's score. Missing or `N/A` metrics contribute nothing to the
/// weighted sum while their weight still counts towards the normalizing total.
use std::collections::BTreeMap;
use std::path::Path;

use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, warn};

use crate::error::CoreError;
use crate::model::ScoreResult;
use crate::sanitize::sanitize;

/// Metric weights and grade bands.
///
/// Grade bands are kept as raw JSON values so that a malformed band can be skipped at
/// grading time instead of rejecting the whole configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoringConfiguration {
    #[serde(default = "default_weighting")]
    pub weighting: BTreeMap<String, f64>,
    #[serde(default = "default_grading_scale")]
    pub grading_scale: BTreeMap<String, Value>,
}

impl Default for ScoringConfiguration {
    fn default() -> Self {
        Self {
            weighting: default_weighting(),
            grading_scale: default_grading_scale(),
        }
    }
}

fn default_weighting() -> BTreeMap<String, f64> {
    [
        ("requirement_match", 0.4),
        ("compliance", 0.25),
        ("quality", 0.2),
        ("alignment", 0.15),
        ("risk", 0.1),
    ]
    .into_iter()
    .map(|(k, v)| (k.to_string(), v))
    .collect()
}

fn default_grading_scale() -> BTreeMap<String, Value> {
    [
        ("excellent", [90, 100]),
        ("good", [70, 89]),
        ("fair", [50, 69]),
        ("poor", [0, 49]),
    ]
    .into_iter()
    .map(|(k, [lo, hi])| (k.to_string(), Value::from(vec![lo, hi])))
    .collect()
}

impl ScoringConfiguration {
    /// Load a configuration from a JSON file.
    ///
    /// The object may sit at the top level or under a `scoring_system` key; either field
    /// may be omitted and falls back to the built-in default.
    pub fn from_json_file(path: &Path) -> Result<Self, CoreError> {
        let raw = std::fs::read_to_string(path).map_err(|source| CoreError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let config = Self::from_json_str(&raw)?;
        debug!(
            path = %path.display(),
            metrics = config.weighting.len(),
            grades = config.grading_scale.len(),
            "scoring configuration loaded"
        );
        Ok(config)
    }

    pub fn from_json_str(raw: &str) -> Result<Self, CoreError> {
        let mut value: Value = serde_json::from_str(raw)
            .map_err(|e| CoreError::ScoringConfig(format!("invalid JSON: {e}")))?;
        if let Some(nested) = value.get_mut("scoring_system") {
            value = nested.take();
        }
        let config: Self = serde_json::from_value(value)
            .map_err(|e| CoreError::ScoringConfig(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Weights must be finite and non-negative.
    pub fn validate(&self) -> Result<(), CoreError> {
        for (metric, weight) in &self.weighting {
            if !weight.is_finite() || *weight < 0.0 {
                return Err(CoreError::ScoringConfig(format!(
                    "weight for '{metric}' must be a non-negative number, got {weight}"
                )));
            }
        }
        Ok(())
    }

    /// Well-formed grade bands as `(label, lower, upper)`, highest lower bound first.
    ///
    /// A band that is not a two-element numeric array is skipped with a warning. Bands
    /// sharing a lower bound keep label order.
    pub fn grade_bounds(&self) -> Vec<(&str, f64, f64)> {
        let mut bounds: Vec<(&str, f64, f64)> = self
            .grading_scale
            .iter()
            .filter_map(|(label, range)| match parse_band(range) {
                Some((lo, hi)) => Some((label.as_str(), lo, hi)),
                None => {
                    warn!(grade = %label, range = %range, "invalid grading scale entry, skipping");
                    None
                }
            })
            .collect();
        bounds.sort_by(|a, b| b.1.total_cmp(&a.1));
        bounds
    }

    /// The label of the first band (by descending lower bound) containing `score`.
    pub fn grade_for(&self, score: f64) -> Option<String> {
        self.grade_bounds()
            .into_iter()
            .find(|(_, lo, hi)| *lo <= score && score <= *hi)
            .map(|(label, _, _)| sanitize(label))
    }
}

fn parse_band(range: &Value) -> Option<(f64, f64)> {
    match range.as_array()?.as_slice() {
        [lo, hi] => Some((lo.as_f64()?, hi.as_f64()?)),
        _ => None,
    }
}

/// `requirement_match` -> `Requirement Match`.
///
/// Underscores become spaces; a letter is upper-cased when it follows a non-letter and
/// lower-cased otherwise.
pub fn format_metric_label(metric: &str) -> String {
    let mut label = String::with_capacity(metric.len());
    let mut prev_alpha = false;
    for c in metric.chars() {
        let c = if c == '_' { ' ' } else { c };
        if c.is_alphabetic() {
            if prev_alpha {
                label.extend(c.to_lowercase());
            } else {
                label.extend(c.to_uppercase());
            }
            prev_alpha = true;
        } else {
            label.push(c);
            prev_alpha = false;
        }
    }
    label
}

/// Score of `metric` in `text`: `None` when the label is absent or reported as N/A.
fn extract_metric(text: &str, metric: &str) -> Option<u32> {
    let label = format_metric_label(metric);
    let pattern = format!(r"(?is){}.*?(\d+|N/A)", regex::escape(&label));
    let re = match Regex::new(&pattern) {
        Ok(re) => re,
        Err(e) => {
            warn!(metric, error = %e, "cannot build metric pattern");
            return None;
        }
    };

    let captured = re.captures(text)?.get(1)?.as_str();
    if captured.eq_ignore_ascii_case("N/A") {
        return None;
    }
    // A digit run too long for u32 is still "more than 100".
    Some(captured.parse::<u32>().map_or(100, |n| n.min(100)))
}

/// Extract per-metric scores from `analysis_text` and grade the weighted composite.
pub fn parse_and_score(analysis_text: &str, config: &ScoringConfiguration) -> ScoreResult {
    let text = sanitize(analysis_text);

    let mut individual_scores = BTreeMap::new();
    let mut weighted_sum = 0.0;
    for (metric, weight) in &config.weighting {
        let score = extract_metric(&text, metric);
        debug!(metric = %metric, ?score, weight, "metric score extracted");
        if let Some(score) = score {
            weighted_sum += f64::from(score) * weight;
        }
        individual_scores.insert(metric.clone(), score);
    }

    let total_weight: f64 = config.weighting.values().sum();
    let normalized = if total_weight > 0.0 {
        weighted_sum / total_weight
    } else {
        0.0
    };
    let weighted_score = normalized.clamp(0.0, 100.0);
    let grade = config.grade_for(weighted_score);

    debug!(weighted_score, total_weight, ?grade, "analysis scored");
    ScoreResult {
        weighted_score,
        individual_scores,
        grade,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn config(weights: &[(&str, f64)], scale: Value) -> ScoringConfiguration {
        ScoringConfiguration {
            weighting: weights.iter().map(|(k, v)| (k.to_string(), *v)).collect(),
            grading_scale: serde_json::from_value(scale).unwrap(),
        }
    }

    #[test]
    fn test_equal_weights_average_and_grade() {
        let cfg = config(
            &[("a", 0.5), ("b", 0.5)],
            json!({"good": [70, 100], "poor": [0, 69]}),
        );
        let result = parse_and_score("A Score: 80/100\nB Score: 60/100", &cfg);
        assert_eq!(result.individual_scores["a"], Some(80));
        assert_eq!(result.individual_scores["b"], Some(60));
        assert!((result.weighted_score - 70.0).abs() < 1e-9);
        assert_eq!(result.grade.as_deref(), Some("good"));
    }

    #[test]
    fn test_missing_metric_still_counts_weight() {
        let cfg = config(&[("a", 1.0), ("b", 1.0)], json!({}));
        let result = parse_and_score("A Score: 100/100", &cfg);
        assert_eq!(result.individual_scores["a"], Some(100));
        assert_eq!(result.individual_scores["b"], None);
        assert!((result.weighted_score - 50.0).abs() < 1e-9);
        assert_eq!(result.grade, None);
    }

    #[test]
    fn test_zero_total_weight_scores_zero() {
        let cfg = config(
            &[("a", 0.0), ("b", 0.0)],
            json!({"floor": [0, 10]}),
        );
        let result = parse_and_score("A: 90\nB: 95", &cfg);
        assert_eq!(result.weighted_score, 0.0);
        assert_eq!(result.grade.as_deref(), Some("floor"));
    }

    #[test]
    fn test_na_and_clamping() {
        let cfg = config(&[("requirement_match", 1.0), ("risk", 1.0)], json!({}));
        let result = parse_and_score(
            "Requirement match: 250 points\nRISK: n/a",
            &cfg,
        );
        assert_eq!(result.individual_scores["requirement_match"], Some(100));
        assert_eq!(result.individual_scores["risk"], None);
        assert!((result.weighted_score - 50.0).abs() < 1e-9);
    }

    #[test]
    fn test_overlong_digit_run_clamps() {
        let cfg = config(&[("quality", 1.0)], json!({}));
        let result = parse_and_score("Quality: 99999999999999999999", &cfg);
        assert_eq!(result.individual_scores["quality"], Some(100));
    }

    #[test]
    fn test_score_may_sit_on_a_later_line() {
        let cfg = config(&[("compliance", 1.0)], json!({}));
        let result = parse_and_score("Compliance\n- assessed below\n- 65/100", &cfg);
        assert_eq!(result.individual_scores["compliance"], Some(65));
    }

    #[test]
    fn test_malformed_grade_band_is_skipped() {
        let cfg = config(
            &[("a", 1.0)],
            json!({"broken": [95], "weird": "high", "good": [50, 100]}),
        );
        let result = parse_and_score("A: 99", &cfg);
        assert_eq!(result.grade.as_deref(), Some("good"));
        assert_eq!(cfg.grade_bounds().len(), 1);
    }

    #[test]
    fn test_bands_checked_by_descending_lower_bound() {
        let cfg = config(
            &[("a", 1.0)],
            json!({"wide": [0, 100], "top": [80, 100]}),
        );
        assert_eq!(parse_and_score("A: 85", &cfg).grade.as_deref(), Some("top"));
        assert_eq!(parse_and_score("A: 40", &cfg).grade.as_deref(), Some("wide"));
    }

    #[test]
    fn test_format_metric_label() {
        assert_eq!(format_metric_label("requirement_match"), "Requirement Match");
        assert_eq!(format_metric_label("COST_value"), "Cost Value");
        assert_eq!(format_metric_label("phase2b"), "Phase2B");
    }

    #[test]
    fn test_default_configuration() {
        let cfg = ScoringConfiguration::default();
        assert_eq!(cfg.weighting.len(), 5);
        assert_eq!(cfg.grade_for(95.0).as_deref(), Some("excellent"));
        assert_eq!(cfg.grade_for(89.5), None);
        assert_eq!(cfg.grade_for(0.0).as_deref(), Some("poor"));
    }

    #[test]
    fn test_config_from_nested_json() {
        let cfg = ScoringConfiguration::from_json_str(
            r#"{"scoring_system": {"weighting": {"quality": 2.0}}}"#,
        )
        .unwrap();
        assert_eq!(cfg.weighting.len(), 1);
        assert_eq!(cfg.grading_scale, default_grading_scale());

        let flat = ScoringConfiguration::from_json_str(r#"{"grading_scale": {"ok": [0, 100]}}"#)
            .unwrap();
        assert_eq!(flat.weighting, default_weighting());
    }

    #[test]
    fn test_config_rejects_negative_weight() {
        let err = ScoringConfiguration::from_json_str(r#"{"weighting": {"risk": -1}}"#);
        assert!(matches!(err, Err(CoreError::ScoringConfig(_))));
    }

    #[test]
    fn test_config_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("scoring.json");
        std::fs::write(&path, r#"{"weighting": {"a": 1}, "grading_scale": {"pass": [50, 100]}}"#)
            .unwrap();
        let cfg = ScoringConfiguration::from_json_file(&path).unwrap();
        assert_eq!(cfg.weighting["a"], 1.0);
        assert!(ScoringConfiguration::from_json_file(&dir.path().join("missing.json")).is_err());
    }
}
