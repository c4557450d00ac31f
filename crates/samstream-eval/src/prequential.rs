use std::collections::VecDeque;
use std::error::Error;
use std::io::Write;

use serde::Serialize;

use samstream_core::StreamClassifier;
use samstream_metrics::{accuracy, cohen_kappa, kappa_temporal};
use samstream_neighbors::arg_max_vote;

use crate::streams::InstanceStream;

/// Configuration of a prequential run.
#[derive(Debug, Clone)]
pub struct PrequentialConfig {
    /// Stop after this many instances (or when the stream ends).
    pub max_instances: usize,
    /// Sliding window for the windowed accuracy.
    pub window_size: usize,
    /// Emit one record every this many instances.
    pub report_every: usize,
}

impl Default for PrequentialConfig {
    fn default() -> Self {
        PrequentialConfig {
            max_instances: 100_000,
            window_size: 1000,
            report_every: 1000,
        }
    }
}

/// One reporting-interval row of a prequential run.
#[derive(Debug, Clone, Serialize)]
pub struct EvalRecord {
    pub instances: usize,
    pub accuracy: f64,
    pub window_accuracy: f64,
    pub kappa: f64,
    pub kappa_temporal: f64,
}

/// Final statistics of a prequential run.
#[derive(Debug, Clone, Serialize)]
pub struct RunSummary {
    pub instances: usize,
    pub accuracy: f64,
    pub window_accuracy: f64,
    pub kappa: f64,
    pub kappa_temporal: f64,
}

impl RunSummary {
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}

/// Test-then-train driver: each instance is first predicted, then used to
/// update the learner, with interleaved accuracy and kappa tracking.
pub struct PrequentialEvaluator {
    pub config: PrequentialConfig,
}

impl PrequentialEvaluator {
    pub fn new(config: PrequentialConfig) -> Self {
        PrequentialEvaluator { config }
    }

    /// Drive `learner` over `stream`, optionally writing one CSV record per
    /// reporting interval.
    pub fn run<C, S, W>(
        &self,
        learner: &mut C,
        stream: &mut S,
        csv_out: Option<W>,
    ) -> Result<RunSummary, Box<dyn Error>>
    where
        C: StreamClassifier<f64>,
        S: InstanceStream,
        W: Write,
    {
        let header = stream.header().clone();
        learner.set_context(&header);

        let mut writer = csv_out.map(csv::Writer::from_writer);
        let mut y_true: Vec<usize> = Vec::new();
        let mut y_pred: Vec<usize> = Vec::new();
        let mut window: VecDeque<bool> = VecDeque::with_capacity(self.config.window_size);
        let mut n_classes = header.n_classes().max(1);

        let mut seen = 0usize;
        while seen < self.config.max_instances {
            let Some(x) = stream.next_instance() else {
                break;
            };
            let votes = learner.predict(&x)?;
            let predicted = arg_max_vote(&votes);

            y_true.push(x.label());
            y_pred.push(predicted);
            n_classes = n_classes.max(x.label() + 1).max(predicted + 1);
            if window.len() == self.config.window_size {
                window.pop_front();
            }
            window.push_back(predicted == x.label());

            learner.train(&x)?;
            seen += 1;

            if seen % self.config.report_every == 0 {
                let record = EvalRecord {
                    instances: seen,
                    accuracy: accuracy(&y_true, &y_pred),
                    window_accuracy: Self::window_accuracy(&window),
                    kappa: cohen_kappa(&y_true, &y_pred, n_classes),
                    kappa_temporal: kappa_temporal(&y_true, &y_pred),
                };
                if let Some(w) = writer.as_mut() {
                    w.serialize(&record)?;
                }
            }
        }
        if let Some(w) = writer.as_mut() {
            w.flush()?;
        }
        learner.after_learning();

        let summary = RunSummary {
            instances: seen,
            accuracy: accuracy(&y_true, &y_pred),
            window_accuracy: Self::window_accuracy(&window),
            kappa: cohen_kappa(&y_true, &y_pred, n_classes),
            kappa_temporal: kappa_temporal(&y_true, &y_pred),
        };
        log::info!(
            "prequential run finished: {} instances, accuracy {:.3}",
            summary.instances,
            summary.accuracy
        );
        Ok(summary)
    }

    fn window_accuracy(window: &VecDeque<bool>) -> f64 {
        if window.is_empty() {
            return 0.0;
        }
        window.iter().filter(|&&c| c).count() as f64 / window.len() as f64
    }
}
