//! Detection and diagnosis timing for a single scenario replay.
//!
//! An [`Evaluation`] walks the replay sample by sample and yields a
//! [`TraceStep`] for each one, so a caller can chart the running values
//! without re-running anything. Samples at or before the injection instant
//! never move the state: that window is the process warm-up.
//!
//! - Detection fires once, on the first post-injection sample whose
//!   detector score is strictly above the threshold.
//! - Diagnosis fires once, when `persistence_limit` consecutive
//!   post-injection samples round to the scenario class. A mismatch resets
//!   the streak to zero.

use super::sample::{Sample, SampleRecord};
use super::{round_diagnosis, DetectError, ScenarioClass};
use serde::Serialize;
use std::iter::{Enumerate, FusedIterator};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

/// Minutes between two consecutive samples of the simulator.
pub const DEFAULT_SAMPLE_PERIOD_MINUTES: f64 = 3.0;
/// Replay minute at which the fault is introduced.
pub const DEFAULT_INJECTION_TIME_MINUTES: f64 = 60.0;
/// Detector score above which a sample counts as anomalous.
pub const DEFAULT_DETECTION_THRESHOLD: f64 = 0.5;
/// Consecutive matching samples needed to confirm a diagnosis.
pub const DEFAULT_PERSISTENCE_LIMIT: u32 = 2;

/// Fixed parameters of an evaluation, validated on construction.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EvaluatorParams {
    sample_period_minutes: f64,
    injection_time_minutes: f64,
    detection_threshold: f64,
    persistence_limit: u32,
}

impl Default for EvaluatorParams {
    fn default() -> Self {
        Self {
            sample_period_minutes: DEFAULT_SAMPLE_PERIOD_MINUTES,
            injection_time_minutes: DEFAULT_INJECTION_TIME_MINUTES,
            detection_threshold: DEFAULT_DETECTION_THRESHOLD,
            persistence_limit: DEFAULT_PERSISTENCE_LIMIT,
        }
    }
}

impl EvaluatorParams {
    pub fn new(
        sample_period_minutes: f64,
        injection_time_minutes: f64,
        detection_threshold: f64,
        persistence_limit: u32,
    ) -> Result<Self, DetectError> {
        if !(sample_period_minutes.is_finite() && sample_period_minutes > 0.0) {
            return Err(DetectError::InvalidParameter {
                name: "sample_period_minutes",
                reason: format!("must be a positive number, got {}", sample_period_minutes),
            });
        }
        if !injection_time_minutes.is_finite() {
            return Err(DetectError::InvalidParameter {
                name: "injection_time_minutes",
                reason: format!("must be a finite number, got {}", injection_time_minutes),
            });
        }
        if !(0.0..=1.0).contains(&detection_threshold) {
            return Err(DetectError::InvalidParameter {
                name: "detection_threshold",
                reason: format!("must lie in [0, 1], got {}", detection_threshold),
            });
        }
        if persistence_limit == 0 {
            return Err(DetectError::InvalidParameter {
                name: "persistence_limit",
                reason: "must be at least 1".to_string(),
            });
        }

        Ok(Self {
            sample_period_minutes,
            injection_time_minutes,
            detection_threshold,
            persistence_limit,
        })
    }

    pub fn sample_period_minutes(&self) -> f64 {
        self.sample_period_minutes
    }

    pub fn injection_time_minutes(&self) -> f64 {
        self.injection_time_minutes
    }

    pub fn detection_threshold(&self) -> f64 {
        self.detection_threshold
    }

    pub fn persistence_limit(&self) -> u32 {
        self.persistence_limit
    }
}

/// Delays from fault injection to detection and to confirmed diagnosis.
///
/// `None` means the event was never reached within the replay.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct TimingReport {
    pub detection_delay_minutes: Option<f64>,
    pub diagnosis_delay_minutes: Option<f64>,
}

/// Accumulator owned by exactly one evaluation run.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct EvaluationState {
    anomaly_detected: bool,
    anomaly_time_minutes: Option<f64>,
    diagnosis_confirmed: bool,
    diagnosis_time_minutes: Option<f64>,
    consecutive_match_count: u32,
}

impl EvaluationState {
    pub fn anomaly_detected(&self) -> bool {
        self.anomaly_detected
    }

    pub fn anomaly_time_minutes(&self) -> Option<f64> {
        self.anomaly_time_minutes
    }

    pub fn diagnosis_confirmed(&self) -> bool {
        self.diagnosis_confirmed
    }

    pub fn diagnosis_time_minutes(&self) -> Option<f64> {
        self.diagnosis_time_minutes
    }

    pub fn consecutive_match_count(&self) -> u32 {
        self.consecutive_match_count
    }

    /// Delays relative to `injection_time_minutes`, floored at zero.
    pub fn report(&self, injection_time_minutes: f64) -> TimingReport {
        let delay = |t: f64| (t - injection_time_minutes).max(0.0);
        TimingReport {
            detection_delay_minutes: self.anomaly_time_minutes.map(delay),
            diagnosis_delay_minutes: self.diagnosis_time_minutes.map(delay),
        }
    }

    fn observe(&mut self, sample: &Sample, scenario: ScenarioClass, params: &EvaluatorParams) {
        if sample.elapsed_minutes <= params.injection_time_minutes {
            return;
        }

        if !self.anomaly_detected && sample.detector_score > params.detection_threshold {
            self.anomaly_detected = true;
            self.anomaly_time_minutes = Some(sample.elapsed_minutes);
            debug!(
                elapsed = sample.elapsed_minutes,
                score = sample.detector_score,
                "anomaly detected"
            );
        }

        if !self.diagnosis_confirmed {
            if scenario.matches(sample.diagnosis_code) {
                self.consecutive_match_count = self.consecutive_match_count.saturating_add(1);
            } else {
                self.consecutive_match_count = 0;
            }

            if self.consecutive_match_count >= params.persistence_limit {
                self.diagnosis_confirmed = true;
                self.diagnosis_time_minutes = Some(sample.elapsed_minutes);
                debug!(
                    elapsed = sample.elapsed_minutes,
                    streak = self.consecutive_match_count,
                    "diagnosis confirmed"
                );
            }
        }
    }
}

/// One evaluated sample together with the running values after it.
#[derive(Debug, Clone, Serialize)]
pub struct TraceStep {
    pub sample: Sample,
    /// The diagnosis code rounded to a fault class.
    pub diagnosed_class: i64,
    pub running: TimingReport,
    pub state: EvaluationState,
}

/// Final result of a run, complete or cancelled.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Outcome {
    pub report: TimingReport,
    pub state: EvaluationState,
    pub samples_evaluated: usize,
    pub cancelled: bool,
}

/// Lazy, single-use evaluation of one scenario replay.
///
/// Yields `Ok(TraceStep)` per sample. A malformed record yields one `Err`
/// and ends the iteration. When the cancellation token fires, iteration
/// ends before the next sample and the partial state stands as-is.
pub struct Evaluation<I> {
    params: EvaluatorParams,
    scenario: ScenarioClass,
    records: Enumerate<I>,
    state: EvaluationState,
    previous_index: Option<u64>,
    samples_evaluated: usize,
    cancel: Option<CancellationToken>,
    cancelled: bool,
    done: bool,
}

impl<I> Evaluation<I>
where
    I: Iterator<Item = SampleRecord>,
{
    pub fn new<R>(params: EvaluatorParams, scenario: ScenarioClass, records: R) -> Self
    where
        R: IntoIterator<IntoIter = I>,
    {
        Self {
            params,
            scenario,
            records: records.into_iter().enumerate(),
            state: EvaluationState::default(),
            previous_index: None,
            samples_evaluated: 0,
            cancel: None,
            cancelled: false,
            done: false,
        }
    }

    /// Stop cleanly before the next sample once `token` is cancelled.
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = Some(token);
        self
    }

    pub fn scenario(&self) -> ScenarioClass {
        self.scenario
    }

    pub fn params(&self) -> &EvaluatorParams {
        &self.params
    }

    pub fn state(&self) -> &EvaluationState {
        &self.state
    }

    pub fn report(&self) -> TimingReport {
        self.state.report(self.params.injection_time_minutes)
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled
    }

    /// Drive the replay to its end (or cancellation) and return the outcome.
    pub fn run(mut self) -> Result<Outcome, DetectError> {
        for step in &mut self {
            step?;
        }
        Ok(self.finish())
    }

    /// Like [`run`](Self::run), keeping every step for charting.
    pub fn run_with_trace(mut self) -> Result<(Outcome, Vec<TraceStep>), DetectError> {
        let mut trace = Vec::new();
        for step in &mut self {
            trace.push(step?);
        }
        Ok((self.finish(), trace))
    }

    /// Report whatever has been evaluated so far.
    pub fn finish(self) -> Outcome {
        let report = self.report();
        info!(
            scenario = %self.scenario,
            samples = self.samples_evaluated,
            cancelled = self.cancelled,
            detection_delay = ?report.detection_delay_minutes,
            diagnosis_delay = ?report.diagnosis_delay_minutes,
            "evaluation finished"
        );
        Outcome {
            report,
            state: self.state,
            samples_evaluated: self.samples_evaluated,
            cancelled: self.cancelled,
        }
    }

    fn halt_with(&mut self, err: DetectError) -> Option<Result<TraceStep, DetectError>> {
        self.done = true;
        Some(Err(err))
    }
}

impl<I> Iterator for Evaluation<I>
where
    I: Iterator<Item = SampleRecord>,
{
    type Item = Result<TraceStep, DetectError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        if self.cancel.as_ref().is_some_and(|t| t.is_cancelled()) {
            debug!(samples = self.samples_evaluated, "evaluation cancelled");
            self.cancelled = true;
            self.done = true;
            return None;
        }

        let Some((position, record)) = self.records.next() else {
            self.done = true;
            return None;
        };

        let sample = match Sample::from_record(record, position, self.params.sample_period_minutes)
        {
            Ok(sample) => sample,
            Err(e) => return self.halt_with(e),
        };

        if let Some(previous) = self.previous_index {
            if sample.sequence_index <= previous {
                return self.halt_with(DetectError::OutOfOrder {
                    index: position,
                    sequence_index: sample.sequence_index,
                    previous,
                });
            }
        }
        self.previous_index = Some(sample.sequence_index);

        self.state.observe(&sample, self.scenario, &self.params);
        self.samples_evaluated += 1;

        Some(Ok(TraceStep {
            diagnosed_class: round_diagnosis(sample.diagnosis_code) as i64,
            running: self.report(),
            state: self.state.clone(),
            sample,
        }))
    }
}

impl<I> FusedIterator for Evaluation<I> where I: Iterator<Item = SampleRecord> {}

/// Evaluate a whole replay with fresh state and return its timing report.
pub fn evaluate<R>(
    records: R,
    scenario: ScenarioClass,
    params: &EvaluatorParams,
) -> Result<TimingReport, DetectError>
where
    R: IntoIterator<Item = SampleRecord>,
{
    Ok(Evaluation::new(*params, scenario, records).run()?.report)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scenario(id: i64) -> ScenarioClass {
        ScenarioClass::new(id).unwrap()
    }

    /// Records at minutes 57, 60, 63, ... (indices 19, 20, 21, ...).
    fn replay(scores: &[f64], codes: &[f64]) -> Vec<SampleRecord> {
        scores
            .iter()
            .zip(codes)
            .enumerate()
            .map(|(i, (&s, &c))| SampleRecord::new(19 + i as u64, s, c))
            .collect()
    }

    #[test]
    fn test_param_validation() {
        assert!(EvaluatorParams::new(3.0, 60.0, 0.5, 2).is_ok());
        assert!(EvaluatorParams::new(3.0, 60.0, 0.0, 1).is_ok());
        assert!(EvaluatorParams::new(3.0, 60.0, 1.0, 1).is_ok());

        let err = EvaluatorParams::new(3.0, 60.0, 1.5, 2).unwrap_err();
        assert!(matches!(
            err,
            DetectError::InvalidParameter { name: "detection_threshold", .. }
        ));
        assert!(EvaluatorParams::new(3.0, 60.0, -0.1, 2).is_err());
        assert!(EvaluatorParams::new(3.0, 60.0, f64::NAN, 2).is_err());
        assert!(EvaluatorParams::new(3.0, 60.0, 0.5, 0).is_err());
        assert!(EvaluatorParams::new(0.0, 60.0, 0.5, 2).is_err());
        assert!(EvaluatorParams::new(3.0, f64::INFINITY, 0.5, 2).is_err());
        assert!(EvaluatorParams::new(3.0, f64::NAN, 0.5, 2).is_err());
    }

    #[test]
    fn test_negative_injection_time_is_accepted() {
        // Every sample, minute 0 included, is then post-injection.
        let params = EvaluatorParams::new(3.0, -1.0, 0.5, 1).unwrap();
        let records = vec![SampleRecord::new(0, 0.9, 6.0)];
        let report = evaluate(records, scenario(6), &params).unwrap();
        assert_eq!(report.detection_delay_minutes, Some(1.0));
        assert_eq!(report.diagnosis_delay_minutes, Some(1.0));
    }

    #[test]
    fn test_default_params() {
        let p = EvaluatorParams::default();
        assert_eq!(p.sample_period_minutes(), 3.0);
        assert_eq!(p.injection_time_minutes(), 60.0);
        assert_eq!(p.detection_threshold(), 0.5);
        assert_eq!(p.persistence_limit(), 2);
    }

    #[test]
    fn test_state_starts_clear() {
        let state = EvaluationState::default();
        assert!(!state.anomaly_detected());
        assert!(!state.diagnosis_confirmed());
        assert_eq!(state.consecutive_match_count(), 0);
        assert_eq!(state.report(60.0), TimingReport::default());
    }

    #[test]
    fn test_threshold_is_strict() {
        let records = replay(&[0.1, 0.1, 0.5, 0.51], &[0.0; 4]);
        let report = evaluate(records, scenario(1), &EvaluatorParams::default()).unwrap();
        // 0.5 at minute 63 does not cross; 0.51 at minute 66 does.
        assert_eq!(report.detection_delay_minutes, Some(6.0));
        assert_eq!(report.diagnosis_delay_minutes, None);
    }

    #[test]
    fn test_running_values_per_step() {
        let records = replay(&[0.1, 0.1, 0.9, 0.2, 0.1], &[0.0, 0.0, 3.0, 3.0, 3.0]);
        let steps: Vec<TraceStep> = Evaluation::new(EvaluatorParams::default(), scenario(3), records)
            .collect::<Result<_, _>>()
            .unwrap();

        assert_eq!(steps.len(), 5);
        assert_eq!(steps[1].sample.elapsed_minutes, 60.0);
        assert_eq!(steps[1].running, TimingReport::default());

        assert_eq!(steps[2].running.detection_delay_minutes, Some(3.0));
        assert_eq!(steps[2].running.diagnosis_delay_minutes, None);
        assert_eq!(steps[2].state.consecutive_match_count(), 1);
        assert_eq!(steps[2].diagnosed_class, 3);

        assert_eq!(steps[3].running.diagnosis_delay_minutes, Some(6.0));
        assert_eq!(steps[4].running, steps[3].running);
    }

    #[test]
    fn test_streak_stops_counting_once_confirmed() {
        let records = replay(&[0.0; 5], &[0.0, 0.0, 5.0, 5.0, 5.0]);
        let outcome = Evaluation::new(EvaluatorParams::default(), scenario(5), records)
            .run()
            .unwrap();
        assert_eq!(outcome.state.consecutive_match_count(), 2);
        assert_eq!(outcome.state.diagnosis_time_minutes(), Some(66.0));
        assert_eq!(outcome.samples_evaluated, 5);
        assert!(!outcome.cancelled);
    }

    #[test]
    fn test_out_of_order_index_fails() {
        let records = vec![
            SampleRecord::new(20, 0.0, 0.0),
            SampleRecord::new(21, 0.0, 0.0),
            SampleRecord::new(21, 0.0, 0.0),
        ];
        let err = evaluate(records, scenario(1), &EvaluatorParams::default()).unwrap_err();
        assert_eq!(
            err,
            DetectError::OutOfOrder {
                index: 2,
                sequence_index: 21,
                previous: 21
            }
        );
    }

    #[test]
    fn test_error_ends_iteration() {
        let records = vec![
            SampleRecord::new(20, 0.0, 0.0),
            SampleRecord {
                sequence_index: Some(21),
                diagnosis_code: Some(1.0),
                ..Default::default()
            },
            SampleRecord::new(22, 0.0, 0.0),
        ];
        let mut eval = Evaluation::new(EvaluatorParams::default(), scenario(1), records);
        assert!(eval.next().unwrap().is_ok());
        assert!(matches!(
            eval.next(),
            Some(Err(DetectError::MissingField { index: 1, field: "detector_score" }))
        ));
        assert!(eval.next().is_none());
    }

    #[test]
    fn test_delay_floor_at_zero() {
        // Injection at 61.5 with a 3 minute period: first eligible sample is 63.
        let params = EvaluatorParams::new(3.0, 61.5, 0.5, 1).unwrap();
        let state = {
            let mut s = EvaluationState::default();
            s.anomaly_time_minutes = Some(60.0);
            s.anomaly_detected = true;
            s
        };
        assert_eq!(state.report(params.injection_time_minutes()).detection_delay_minutes, Some(0.0));

        let report = evaluate(vec![SampleRecord::new(21, 0.9, 1.0)], scenario(1), &params).unwrap();
        assert_eq!(report.detection_delay_minutes, Some(1.5));
        assert_eq!(report.diagnosis_delay_minutes, Some(1.5));
    }
}
