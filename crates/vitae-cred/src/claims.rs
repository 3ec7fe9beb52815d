//! Typed claim shapes.
//!
//! Each shape is a plain serde struct with camelCase field names. Embedding
//! into a credential flattens it to a JSON object map; parsing back goes
//! through the same derive, so there is one canonical numeric form per field:
//! `f64` for measurements, `u32` for counts and durations. Counts accept both
//! `6` and `6.0` on the way in since JSON has a single number type.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use vitae_core::ClaimType;

use crate::error::{CredError, CredErrorDetail, CredResult, ValidationErrors};

/// Generic claim map as embedded in a credential.
pub type ClaimMap = serde_json::Map<String, serde_json::Value>;

/// A validated, typed claim payload.
pub trait Claim: Serialize + DeserializeOwned {
    fn claim_type() -> ClaimType;

    /// Report every field violation at once.
    fn validate(&self) -> Result<(), ValidationErrors>;

    fn to_map(&self) -> CredResult<ClaimMap> {
        match serde_json::to_value(self) {
            Ok(serde_json::Value::Object(map)) => Ok(map),
            _ => Err(CredErrorDetail::new(
                CredError::EncodingFailed,
                format!("{} did not serialize to an object", Self::claim_type()),
            )),
        }
    }

    /// Rebuild the typed claim from a generic map. Does not validate.
    fn parse(map: &ClaimMap) -> CredResult<Self> {
        serde_json::from_value(serde_json::Value::Object(map.clone())).map_err(|e| {
            CredErrorDetail::new(
                CredError::ClaimParse(Self::claim_type().to_string()),
                e.to_string(),
            )
        })
    }
}

mod whole_number {
    use serde::{Deserialize, Deserializer};

    /// A non-negative whole number given as a JSON integer or integral float.
    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<u32, D::Error> {
        let n = serde_json::Number::deserialize(deserializer)?;
        if let Some(u) = n.as_u64() {
            return u32::try_from(u)
                .map_err(|_| serde::de::Error::custom("whole number out of range"));
        }
        match n.as_f64() {
            Some(f) if f.fract() == 0.0 && f >= 0.0 && f <= u32::MAX as f64 => Ok(f as u32),
            _ => Err(serde::de::Error::custom(
                "expected a non-negative whole number",
            )),
        }
    }
}

fn check_percent(errors: &mut ValidationErrors, field: &str, value: f64) {
    if !(0.0..=100.0).contains(&value) {
        errors.push(field, "must be between 0 and 100 inclusive");
    }
}

fn check_non_empty(errors: &mut ValidationErrors, field: &str, value: &str) {
    if value.trim().is_empty() {
        errors.push(field, "must not be empty");
    }
}

fn check_positive(errors: &mut ValidationErrors, field: &str, value: u32) {
    if value == 0 {
        errors.push(field, "must be greater than 0");
    }
}

// ---------------------------------------------------------------------------
// BloodworkRange
// ---------------------------------------------------------------------------

/// A lab marker stayed within `[rangeMin, rangeMax]` over a window.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BloodworkRange {
    /// LOINC code, e.g. "718-7" for hemoglobin.
    pub marker: String,
    pub range_min: f64,
    pub range_max: f64,
    #[serde(deserialize_with = "whole_number::deserialize")]
    pub window_months: u32,
    pub all_in_range: bool,
    #[serde(deserialize_with = "whole_number::deserialize")]
    pub sample_count: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unit: Option<String>,
}

impl Claim for BloodworkRange {
    fn claim_type() -> ClaimType {
        ClaimType::bloodwork_range()
    }

    fn validate(&self) -> Result<(), ValidationErrors> {
        let mut errors = ValidationErrors::new();
        check_non_empty(&mut errors, "marker", &self.marker);
        if !self.range_min.is_finite() {
            errors.push("rangeMin", "must be a finite number");
        }
        if !self.range_max.is_finite() {
            errors.push("rangeMax", "must be a finite number");
        }
        // Equal bounds are a point constraint and allowed.
        if self.range_max < self.range_min {
            errors.push("rangeMax", "must be greater than or equal to rangeMin");
        }
        check_positive(&mut errors, "windowMonths", self.window_months);
        check_positive(&mut errors, "sampleCount", self.sample_count);
        errors.into_result()
    }
}

pub fn parse_bloodwork_range(map: &ClaimMap) -> CredResult<BloodworkRange> {
    BloodworkRange::parse(map)
}

// ---------------------------------------------------------------------------
// ProtocolAdherence
// ---------------------------------------------------------------------------

/// Adherence to a named protocol over a number of days.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProtocolAdherence {
    pub protocol_id: String,
    #[serde(deserialize_with = "whole_number::deserialize")]
    pub duration_days: u32,
    pub adherence_percent: f64,
    pub threshold_percent: f64,
    pub meets_threshold: bool,
}

impl Claim for ProtocolAdherence {
    fn claim_type() -> ClaimType {
        ClaimType::protocol_adherence()
    }

    fn validate(&self) -> Result<(), ValidationErrors> {
        let mut errors = ValidationErrors::new();
        check_non_empty(&mut errors, "protocolId", &self.protocol_id);
        check_positive(&mut errors, "durationDays", self.duration_days);
        check_percent(&mut errors, "adherencePercent", self.adherence_percent);
        if !(self.threshold_percent > 0.0 && self.threshold_percent <= 100.0) {
            errors.push("thresholdPercent", "must be greater than 0 and at most 100");
        }
        let meets = self.adherence_percent >= self.threshold_percent;
        if self.meets_threshold != meets {
            errors.push(
                "meetsThreshold",
                "does not agree with adherencePercent and thresholdPercent",
            );
        }
        errors.into_result()
    }
}

pub fn parse_protocol_adherence(map: &ClaimMap) -> CredResult<ProtocolAdherence> {
    ProtocolAdherence::parse(map)
}

// ---------------------------------------------------------------------------
// BiometricPercentile
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BiometricPercentile {
    /// e.g. "vo2max", "hrv_rmssd"
    pub metric: String,
    pub percentile: f64,
    pub cohort: String,
    #[serde(deserialize_with = "whole_number::deserialize")]
    pub window_months: u32,
}

impl Claim for BiometricPercentile {
    fn claim_type() -> ClaimType {
        ClaimType::biometric_percentile()
    }

    fn validate(&self) -> Result<(), ValidationErrors> {
        let mut errors = ValidationErrors::new();
        check_non_empty(&mut errors, "metric", &self.metric);
        check_percent(&mut errors, "percentile", self.percentile);
        check_non_empty(&mut errors, "cohort", &self.cohort);
        check_positive(&mut errors, "windowMonths", self.window_months);
        errors.into_result()
    }
}

pub fn parse_biometric_percentile(map: &ClaimMap) -> CredResult<BiometricPercentile> {
    BiometricPercentile::parse(map)
}

// ---------------------------------------------------------------------------
// AgeOver
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AgeOver {
    #[serde(deserialize_with = "whole_number::deserialize")]
    pub age_threshold: u32,
    pub is_over: bool,
}

impl Claim for AgeOver {
    fn claim_type() -> ClaimType {
        ClaimType::age_over()
    }

    fn validate(&self) -> Result<(), ValidationErrors> {
        let mut errors = ValidationErrors::new();
        check_positive(&mut errors, "ageThreshold", self.age_threshold);
        errors.into_result()
    }
}

pub fn parse_age_over(map: &ClaimMap) -> CredResult<AgeOver> {
    AgeOver::parse(map)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn hemoglobin() -> BloodworkRange {
        BloodworkRange {
            marker: "718-7".into(),
            range_min: 13.5,
            range_max: 17.5,
            window_months: 6,
            all_in_range: true,
            sample_count: 4,
            unit: Some("g/dL".into()),
        }
    }

    fn as_map(v: serde_json::Value) -> ClaimMap {
        v.as_object().unwrap().clone()
    }

    #[test]
    fn test_bloodwork_valid() {
        assert!(hemoglobin().validate().is_ok());
    }

    #[test]
    fn test_bloodwork_point_constraint_allowed() {
        let mut claim = hemoglobin();
        claim.range_min = 15.0;
        claim.range_max = 15.0;
        assert!(claim.validate().is_ok());
    }

    #[test]
    fn test_bloodwork_reports_every_violation() {
        let claim = BloodworkRange {
            marker: "".into(),
            range_min: 17.5,
            range_max: 13.5,
            window_months: 0,
            all_in_range: false,
            sample_count: 0,
            unit: None,
        };
        let errors = claim.validate().unwrap_err();
        assert_eq!(errors.len(), 4);
        assert_eq!(
            errors.fields(),
            vec!["marker", "rangeMax", "windowMonths", "sampleCount"]
        );
    }

    #[test]
    fn test_bloodwork_rejects_nan() {
        let mut claim = hemoglobin();
        claim.range_min = f64::NAN;
        assert!(claim.validate().unwrap_err().contains_field("rangeMin"));
    }

    #[test]
    fn test_bloodwork_to_map_uses_camel_case() {
        let map = hemoglobin().to_map().unwrap();
        assert_eq!(map["marker"], json!("718-7"));
        assert_eq!(map["rangeMin"], json!(13.5));
        assert_eq!(map["rangeMax"], json!(17.5));
        assert_eq!(map["windowMonths"], json!(6));
        assert_eq!(map["allInRange"], json!(true));
        assert_eq!(map["sampleCount"], json!(4));
    }

    #[test]
    fn test_bloodwork_omits_absent_unit() {
        let mut claim = hemoglobin();
        claim.unit = None;
        assert!(!claim.to_map().unwrap().contains_key("unit"));
    }

    #[test]
    fn test_parse_accepts_int_and_float_encodings() {
        let map = as_map(json!({
            "marker": "718-7",
            "rangeMin": 13,
            "rangeMax": 17.5,
            "windowMonths": 6.0,
            "allInRange": true,
            "sampleCount": 4
        }));
        let claim = parse_bloodwork_range(&map).unwrap();
        assert_eq!(claim.range_min, 13.0);
        assert_eq!(claim.window_months, 6);
        assert_eq!(claim.unit, None);
    }

    #[test]
    fn test_parse_rejects_fractional_count() {
        let mut map = hemoglobin().to_map().unwrap();
        map.insert("windowMonths".into(), json!(6.5));
        let err = parse_bloodwork_range(&map).unwrap_err();
        assert_eq!(err.kind, CredError::ClaimParse("bloodwork_range".into()));
    }

    #[test]
    fn test_parse_rejects_negative_count() {
        let mut map = hemoglobin().to_map().unwrap();
        map.insert("sampleCount".into(), json!(-1));
        assert!(parse_bloodwork_range(&map).is_err());
    }

    #[test]
    fn test_parse_rejects_missing_field() {
        let mut map = hemoglobin().to_map().unwrap();
        map.remove("marker");
        let err = parse_bloodwork_range(&map).unwrap_err();
        assert!(err.message.contains("marker"));
    }

    #[test]
    fn test_parse_rejects_wrong_type() {
        let mut map = hemoglobin().to_map().unwrap();
        map.insert("allInRange".into(), json!("yes"));
        let err = parse_bloodwork_range(&map).unwrap_err();
        // Display never carries the offending value.
        assert!(!err.to_string().contains("yes"));
    }

    #[test]
    fn test_bloodwork_map_roundtrip() {
        let claim = hemoglobin();
        assert_eq!(parse_bloodwork_range(&claim.to_map().unwrap()).unwrap(), claim);
    }

    #[test]
    fn test_protocol_adherence_valid() {
        let claim = ProtocolAdherence {
            protocol_id: "zone2-cardio".into(),
            duration_days: 90,
            adherence_percent: 87.5,
            threshold_percent: 80.0,
            meets_threshold: true,
        };
        assert!(claim.validate().is_ok());
        let parsed = parse_protocol_adherence(&claim.to_map().unwrap()).unwrap();
        assert_eq!(parsed, claim);
    }

    #[test]
    fn test_protocol_adherence_inconsistent_flag() {
        let claim = ProtocolAdherence {
            protocol_id: "zone2-cardio".into(),
            duration_days: 90,
            adherence_percent: 50.0,
            threshold_percent: 80.0,
            meets_threshold: true,
        };
        assert!(claim
            .validate()
            .unwrap_err()
            .contains_field("meetsThreshold"));
    }

    #[test]
    fn test_protocol_adherence_bounds() {
        let claim = ProtocolAdherence {
            protocol_id: " ".into(),
            duration_days: 0,
            adherence_percent: 101.0,
            threshold_percent: 0.0,
            meets_threshold: true,
        };
        let errors = claim.validate().unwrap_err();
        assert!(errors.contains_field("protocolId"));
        assert!(errors.contains_field("durationDays"));
        assert!(errors.contains_field("adherencePercent"));
        assert!(errors.contains_field("thresholdPercent"));
    }

    #[test]
    fn test_percentile_inclusive_bounds() {
        for p in [0.0, 100.0, 42.0] {
            let claim = BiometricPercentile {
                metric: "vo2max".into(),
                percentile: p,
                cohort: "male-40-49".into(),
                window_months: 12,
            };
            assert!(claim.validate().is_ok(), "percentile {}", p);
        }
        for p in [-0.1, 100.1] {
            let claim = BiometricPercentile {
                metric: "vo2max".into(),
                percentile: p,
                cohort: "male-40-49".into(),
                window_months: 12,
            };
            assert!(claim.validate().unwrap_err().contains_field("percentile"));
        }
    }

    #[test]
    fn test_parse_biometric_percentile_int_percentile() {
        let map = as_map(json!({
            "metric": "hrv_rmssd",
            "percentile": 90,
            "cohort": "female-30-39",
            "windowMonths": 3
        }));
        let claim = parse_biometric_percentile(&map).unwrap();
        assert_eq!(claim.percentile, 90.0);
    }

    #[test]
    fn test_age_over_zero_threshold_rejected() {
        let claim = AgeOver {
            age_threshold: 0,
            is_over: true,
        };
        let errors = claim.validate().unwrap_err();
        assert_eq!(errors.fields(), vec!["ageThreshold"]);
    }

    #[test]
    fn test_age_over_parse() {
        let map = as_map(json!({ "ageThreshold": 21.0, "isOver": true }));
        let claim = parse_age_over(&map).unwrap();
        assert_eq!(claim.age_threshold, 21);
        assert!(claim.validate().is_ok());
    }

    #[test]
    fn test_claim_types() {
        assert_eq!(BloodworkRange::claim_type(), ClaimType::bloodwork_range());
        assert_eq!(ProtocolAdherence::claim_type(), ClaimType::protocol_adherence());
        assert_eq!(BiometricPercentile::claim_type(), ClaimType::biometric_percentile());
        assert_eq!(AgeOver::claim_type(), ClaimType::age_over());
    }
}
