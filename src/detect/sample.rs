//! Replay records as delivered by a data source, and their checked form.

use super::DetectError;
use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

/// One record from a scenario replay, exactly as the data source sent it.
///
/// Every field the evaluator needs is optional here so that a missing one
/// can be reported with its position instead of failing the whole decode.
/// Any other keys (raw `xmeas_*` / `xmv_*` sensor channels) are kept in
/// `sensors` untouched.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SampleRecord {
    #[serde(
        default,
        alias = "sample",
        deserialize_with = "integral_index",
        skip_serializing_if = "Option::is_none"
    )]
    pub sequence_index: Option<u64>,
    #[serde(default, alias = "faultNumber", skip_serializing_if = "Option::is_none")]
    pub fault_number: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detector_score: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub diagnosis_code: Option<f64>,
    #[serde(flatten)]
    pub sensors: Map<String, Value>,
}

impl SampleRecord {
    pub fn new(sequence_index: u64, detector_score: f64, diagnosis_code: f64) -> Self {
        Self {
            sequence_index: Some(sequence_index),
            detector_score: Some(detector_score),
            diagnosis_code: Some(diagnosis_code),
            ..Default::default()
        }
    }
}

/// Exported replays often carry the sample counter as a float (`21.0`).
fn integral_index<'de, D>(deserializer: D) -> Result<Option<u64>, D::Error>
where
    D: Deserializer<'de>,
{
    let Some(n) = Option::<serde_json::Number>::deserialize(deserializer)? else {
        return Ok(None);
    };
    if let Some(i) = n.as_u64() {
        return Ok(Some(i));
    }
    match n.as_f64() {
        Some(f) if f >= 0.0 && f.fract() == 0.0 && f <= u64::MAX as f64 => Ok(Some(f as u64)),
        _ => Err(D::Error::custom(format!(
            "sample index must be a non-negative integer, got {}",
            n
        ))),
    }
}

/// A validated reading positioned on the replay clock.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Sample {
    pub sequence_index: u64,
    pub elapsed_minutes: f64,
    pub detector_score: f64,
    pub diagnosis_code: f64,
    #[serde(skip_serializing_if = "Map::is_empty")]
    pub sensors: Map<String, Value>,
}

impl Sample {
    /// Check a raw record and place it on the replay clock.
    ///
    /// `position` is the record's offset in the replay; it doubles as the
    /// sequence index when the source did not send one.
    pub fn from_record(
        record: SampleRecord,
        position: usize,
        sample_period_minutes: f64,
    ) -> Result<Self, DetectError> {
        let detector_score = require(record.detector_score, position, "detector_score")?;
        let diagnosis_code = require(record.diagnosis_code, position, "diagnosis_code")?;
        let sequence_index = record.sequence_index.unwrap_or(position as u64);

        Ok(Self {
            sequence_index,
            elapsed_minutes: sequence_index as f64 * sample_period_minutes,
            detector_score,
            diagnosis_code,
            sensors: record.sensors,
        })
    }
}

fn require(value: Option<f64>, index: usize, field: &'static str) -> Result<f64, DetectError> {
    match value {
        Some(v) if v.is_finite() => Ok(v),
        _ => Err(DetectError::MissingField { index, field }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_tep_record() {
        let json = r#"{
            "faultNumber": 4,
            "sample": 21,
            "detector_score": 0.93,
            "diagnosis_code": 4.0,
            "xmeas_1": 0.25,
            "xmv_10": 41.1
        }"#;
        let record: SampleRecord = serde_json::from_str(json).unwrap();
        assert_eq!(record.sequence_index, Some(21));
        assert_eq!(record.fault_number, Some(4.0));
        assert_eq!(record.sensors.len(), 2);
        assert!(record.sensors.contains_key("xmeas_1"));

        let sample = Sample::from_record(record, 0, 3.0).unwrap();
        assert_eq!(sample.elapsed_minutes, 63.0);
        assert_eq!(sample.sensors["xmv_10"], serde_json::json!(41.1));
    }

    #[test]
    fn test_float_sample_index() {
        let record: SampleRecord = serde_json::from_str(
            r#"{"faultNumber": 4.0, "sample": 21.0, "detector_score": 0.9, "diagnosis_code": 4}"#,
        )
        .unwrap();
        assert_eq!(record.sequence_index, Some(21));
        assert!(record.sensors.is_empty());

        let record: SampleRecord =
            serde_json::from_str(r#"{"sample": null, "detector_score": 0.9}"#).unwrap();
        assert_eq!(record.sequence_index, None);

        assert!(serde_json::from_str::<SampleRecord>(r#"{"sample": 21.5}"#).is_err());
        assert!(serde_json::from_str::<SampleRecord>(r#"{"sample": -3}"#).is_err());
    }

    #[test]
    fn test_positional_index_fallback() {
        let record = SampleRecord {
            detector_score: Some(0.1),
            diagnosis_code: Some(0.0),
            ..Default::default()
        };
        let sample = Sample::from_record(record, 5, 3.0).unwrap();
        assert_eq!(sample.sequence_index, 5);
        assert_eq!(sample.elapsed_minutes, 15.0);
    }

    #[test]
    fn test_missing_field_names_index() {
        let record: SampleRecord =
            serde_json::from_str(r#"{"sample": 3, "detector_score": 0.2}"#).unwrap();
        let err = Sample::from_record(record, 7, 3.0).unwrap_err();
        assert_eq!(
            err,
            DetectError::MissingField {
                index: 7,
                field: "diagnosis_code"
            }
        );
        assert!(err.to_string().contains("sample 7"));
    }

    #[test]
    fn test_null_score_is_missing() {
        let record: SampleRecord =
            serde_json::from_str(r#"{"detector_score": null, "diagnosis_code": 1}"#).unwrap();
        assert!(matches!(
            Sample::from_record(record, 0, 3.0),
            Err(DetectError::MissingField { field: "detector_score", .. })
        ));
    }
}
