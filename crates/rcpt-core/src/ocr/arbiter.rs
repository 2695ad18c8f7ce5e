//! Runs OCR attempts over variants, configurations and engines and keeps
//! the most confident reading.
//!
//! Every attempt is independent. A failing attempt (error, panic, timeout or
//! empty text) is dropped from the candidate set and never aborts the run.
//! Among the survivors the highest confidence wins; ties go to the attempt
//! planned first.

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::mpsc::{self, RecvTimeoutError};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use rayon::prelude::*;
use tracing::{debug, info, warn};

use crate::error::OcrError;
use crate::models::config::{EngineConfig, ScanMode};
use crate::preprocess::{ImageVariant, VariantKind, VariantSet};

use super::engine::{EngineKind, OcrEngineAdapter};
use super::{OcrConfig, OcrResult, PageLayout};

/// One planned engine run.
#[derive(Clone)]
pub struct Attempt {
    pub engine: Arc<dyn OcrEngineAdapter>,
    pub config: OcrConfig,
    pub variant: ImageVariant,
}

impl Attempt {
    /// `engine:config:variant`
    pub fn method(&self) -> String {
        format!("{}:{}:{}", self.engine.name(), self.config.name, self.variant.name())
    }
}

/// Winner of an arbiter run plus bookkeeping.
#[derive(Debug, Clone)]
pub struct ArbiterOutcome {
    /// Best result, or [`OcrResult::failed`] when nothing succeeded.
    pub best: OcrResult,
    pub attempts: usize,
    pub failures: usize,
}

/// Plans and runs OCR attempts.
pub struct OcrArbiter {
    timeout: Option<Duration>,
}

impl OcrArbiter {
    /// Create an arbiter with the default 120s per-attempt budget.
    pub fn new() -> Self {
        Self {
            timeout: Some(Duration::from_secs(120)),
        }
    }

    pub fn from_config(config: &EngineConfig) -> Self {
        let timeout = (config.attempt_timeout_secs > 0)
            .then(|| Duration::from_secs(config.attempt_timeout_secs));
        Self { timeout }
    }

    /// Set the per-attempt time budget; `None` waits indefinitely.
    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    /// List the attempts a run would make, in tie-breaking order.
    ///
    /// Layout engines pair every variant with every configuration; neural
    /// engines run once per variant. Fast mode keeps only the
    /// receipt-optimized configuration and runs neural engines on the
    /// standard variant alone.
    pub fn plan(
        &self,
        variants: &VariantSet,
        configs: &[OcrConfig],
        engines: &[Arc<dyn OcrEngineAdapter>],
        mode: ScanMode,
    ) -> Vec<Attempt> {
        let layout_configs: Vec<&OcrConfig> = match mode {
            ScanMode::Full => configs.iter().collect(),
            ScanMode::Fast => configs
                .iter()
                .find(|c| c.name == OcrConfig::RECEIPT_OPTIMIZED)
                .or_else(|| configs.first())
                .into_iter()
                .collect(),
        };

        let neural_variant = match mode {
            ScanMode::Full => None,
            ScanMode::Fast => variants
                .get(VariantKind::Standard)
                .or_else(|| variants.iter().next())
                .map(|v| v.kind),
        };
        let auto = OcrConfig::new("auto", PageLayout::UniformBlock);

        let mut attempts = Vec::new();
        for variant in variants.iter() {
            for engine in engines {
                match engine.kind() {
                    EngineKind::Layout => {
                        for config in &layout_configs {
                            attempts.push(Attempt {
                                engine: Arc::clone(engine),
                                config: (*config).clone(),
                                variant: variant.clone(),
                            });
                        }
                    }
                    EngineKind::Neural => {
                        if neural_variant.is_none_or(|kind| kind == variant.kind) {
                            attempts.push(Attempt {
                                engine: Arc::clone(engine),
                                config: auto.clone(),
                                variant: variant.clone(),
                            });
                        }
                    }
                }
            }
        }

        attempts
    }

    /// Run every planned attempt in parallel and pick the winner.
    pub fn run(
        &self,
        variants: &VariantSet,
        configs: &[OcrConfig],
        engines: &[Arc<dyn OcrEngineAdapter>],
        mode: ScanMode,
    ) -> ArbiterOutcome {
        let attempts = self.plan(variants, configs, engines, mode);
        info!("Running {} OCR attempts ({:?} mode)", attempts.len(), mode);

        let results: Vec<Result<OcrResult, OcrError>> =
            attempts.par_iter().map(|a| self.run_attempt(a)).collect();

        let mut best: Option<OcrResult> = None;
        let mut failures = 0;
        for (attempt, result) in attempts.iter().zip(results) {
            match result {
                Ok(r) if !r.text.trim().is_empty() => {
                    debug!("{}: confidence {:.3}", r.method, r.confidence);
                    // Strictly greater keeps the earliest on ties
                    if best.as_ref().is_none_or(|b| r.confidence > b.confidence) {
                        best = Some(r);
                    }
                }
                Ok(_) => {
                    debug!("{}: empty text", attempt.method());
                    failures += 1;
                }
                Err(e) => {
                    debug!("{}: {}", attempt.method(), e);
                    failures += 1;
                }
            }
        }

        let best = match best {
            Some(b) => {
                info!("Best OCR result: {} ({:.3})", b.method, b.confidence);
                b
            }
            None => {
                warn!("All {} OCR attempts failed", attempts.len());
                OcrResult::failed()
            }
        };

        ArbiterOutcome {
            best,
            attempts: attempts.len(),
            failures,
        }
    }

    /// Run one attempt with panic isolation and the time budget.
    fn run_attempt(&self, attempt: &Attempt) -> Result<OcrResult, OcrError> {
        let start = Instant::now();

        let outcome = match self.timeout {
            None => catch_unwind(AssertUnwindSafe(|| {
                attempt.engine.recognize(&attempt.variant, &attempt.config)
            }))
            .unwrap_or_else(|payload| Err(OcrError::Panicked(panic_message(payload)))),
            Some(timeout) => {
                let (tx, rx) = mpsc::channel();
                let job = attempt.clone();
                thread::spawn(move || {
                    let result = catch_unwind(AssertUnwindSafe(|| {
                        job.engine.recognize(&job.variant, &job.config)
                    }))
                    .unwrap_or_else(|payload| Err(OcrError::Panicked(panic_message(payload))));
                    // Receiver is gone once the attempt timed out
                    let _ = tx.send(result);
                });

                match rx.recv_timeout(timeout) {
                    Ok(result) => result,
                    Err(RecvTimeoutError::Timeout) => Err(OcrError::Timeout(timeout.as_secs())),
                    Err(RecvTimeoutError::Disconnected) => {
                        Err(OcrError::Panicked("attempt worker exited".to_string()))
                    }
                }
            }
        };

        outcome.map(|mut result| {
            result.method = attempt.method();
            result.processing_time_ms = start.elapsed().as_millis() as u64;
            result
        })
    }
}

impl Default for OcrArbiter {
    fn default() -> Self {
        Self::new()
    }
}

fn panic_message(payload: Box<dyn std::any::Any + Send>) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{GrayImage, Luma};
    use pretty_assertions::assert_eq;

    type Respond = dyn Fn(&ImageVariant, &OcrConfig) -> Result<OcrResult, OcrError> + Send + Sync;

    struct MockEngine {
        name: &'static str,
        kind: EngineKind,
        respond: Box<Respond>,
    }

    impl MockEngine {
        fn arc(
            name: &'static str,
            kind: EngineKind,
            respond: impl Fn(&ImageVariant, &OcrConfig) -> Result<OcrResult, OcrError> + Send + Sync + 'static,
        ) -> Arc<dyn OcrEngineAdapter> {
            Arc::new(Self {
                name,
                kind,
                respond: Box::new(respond),
            })
        }
    }

    impl OcrEngineAdapter for MockEngine {
        fn name(&self) -> &str {
            self.name
        }

        fn kind(&self) -> EngineKind {
            self.kind
        }

        fn recognize(&self, variant: &ImageVariant, config: &OcrConfig) -> Result<OcrResult, OcrError> {
            (self.respond)(variant, config)
        }
    }

    fn variants(kinds: &[VariantKind]) -> VariantSet {
        kinds
            .iter()
            .map(|k| ImageVariant::new(*k, GrayImage::from_pixel(8, 8, Luma([255]))))
            .collect()
    }

    fn all_variants() -> VariantSet {
        variants(&[
            VariantKind::Standard,
            VariantKind::HighContrast,
            VariantKind::Denoised,
            VariantKind::Sharpened,
            VariantKind::Adaptive,
        ])
    }

    fn fixed(text: &'static str, confidence: f32) -> impl Fn(&ImageVariant, &OcrConfig) -> Result<OcrResult, OcrError> {
        move |_, _| Ok(OcrResult::new(text, confidence, ""))
    }

    #[test]
    fn test_plan_sizes() {
        let arbiter = OcrArbiter::new();
        let engines = vec![
            MockEngine::arc("layout", EngineKind::Layout, fixed("x", 0.5)),
            MockEngine::arc("neural", EngineKind::Neural, fixed("x", 0.5)),
        ];
        let set = all_variants();
        let configs = OcrConfig::catalog();

        let full = arbiter.plan(&set, &configs, &engines, ScanMode::Full);
        let fast = arbiter.plan(&set, &configs, &engines, ScanMode::Fast);

        assert_eq!(full.len(), 5 * 6 + 5);
        assert_eq!(fast.len(), 5 + 1);
        assert!(fast.len() <= full.len());
        assert!(fast.iter().all(|a| a.config.name != "default"));
        assert_eq!(
            fast.iter().filter(|a| a.engine.kind() == EngineKind::Neural).map(|a| a.method()).collect::<Vec<_>>(),
            vec!["neural:auto:standard".to_string()]
        );
    }

    #[test]
    fn test_fast_plan_falls_back_to_first_config() {
        let engines = vec![MockEngine::arc("layout", EngineKind::Layout, fixed("x", 0.5))];
        let configs = vec![OcrConfig::new("only", PageLayout::SparseText)];
        let plan = OcrArbiter::new().plan(&variants(&[VariantKind::Adaptive]), &configs, &engines, ScanMode::Fast);
        assert_eq!(plan.len(), 1);
        assert_eq!(plan[0].method(), "layout:only:adaptive");
    }

    #[test]
    fn test_highest_confidence_wins() {
        let engines = vec![MockEngine::arc("layout", EngineKind::Layout, |variant, _| {
            let confidence = if variant.kind == VariantKind::Sharpened { 0.9 } else { 0.4 };
            Ok(OcrResult::new(format!("TOTAL {}", variant.name()), confidence, ""))
        })];
        let outcome = OcrArbiter::new().run(&all_variants(), &[OcrConfig::receipt_optimized()], &engines, ScanMode::Full);

        assert_eq!(outcome.best.method, "layout:receipt_optimized:sharpened");
        assert_eq!(outcome.best.text, "TOTAL sharpened");
        assert_eq!(outcome.attempts, 5);
        assert_eq!(outcome.failures, 0);
    }

    #[test]
    fn test_ties_go_to_first_planned() {
        let engines = vec![
            MockEngine::arc("first", EngineKind::Layout, fixed("A", 0.7)),
            MockEngine::arc("second", EngineKind::Layout, fixed("B", 0.7)),
        ];
        let outcome = OcrArbiter::new().run(&all_variants(), &OcrConfig::catalog(), &engines, ScanMode::Full);
        assert_eq!(outcome.best.method, "first:default:standard");
    }

    #[test]
    fn test_panics_errors_and_empty_text_are_excluded() {
        let engines = vec![
            MockEngine::arc("panicky", EngineKind::Layout, |_, _| panic!("engine crashed")),
            MockEngine::arc("broken", EngineKind::Layout, |_, _| {
                Err(OcrError::Recognition("bad".to_string()))
            }),
            MockEngine::arc("blank", EngineKind::Layout, fixed("   ", 0.99)),
            MockEngine::arc("ok", EngineKind::Neural, fixed("TOTAL 5.00", 0.2)),
        ];
        let set = variants(&[VariantKind::Standard]);
        let outcome = OcrArbiter::new().run(&set, &[OcrConfig::receipt_optimized()], &engines, ScanMode::Full);

        assert_eq!(outcome.best.text, "TOTAL 5.00");
        assert_eq!(outcome.attempts, 4);
        assert_eq!(outcome.failures, 3);
    }

    #[test]
    fn test_panic_without_timeout_is_caught() {
        let engines = vec![MockEngine::arc("panicky", EngineKind::Neural, |_, _| panic!("boom"))];
        let outcome = OcrArbiter::new()
            .with_timeout(None)
            .run(&variants(&[VariantKind::Standard]), &[], &engines, ScanMode::Full);
        assert!(outcome.best.is_failure());
        assert_eq!(outcome.failures, 1);
    }

    #[test]
    fn test_slow_attempt_times_out() {
        let engines = vec![
            MockEngine::arc("slow", EngineKind::Neural, |_, _| {
                thread::sleep(Duration::from_millis(500));
                Ok(OcrResult::new("late", 1.0, ""))
            }),
            MockEngine::arc("quick", EngineKind::Layout, fixed("on time", 0.3)),
        ];
        let outcome = OcrArbiter::new()
            .with_timeout(Some(Duration::from_millis(50)))
            .run(&variants(&[VariantKind::Standard]), &[OcrConfig::receipt_optimized()], &engines, ScanMode::Full);

        assert_eq!(outcome.best.text, "on time");
        assert_eq!(outcome.failures, 1);
    }

    #[test]
    fn test_no_engines_gives_sentinel() {
        let outcome = OcrArbiter::new().run(&all_variants(), &OcrConfig::catalog(), &[], ScanMode::Full);
        assert!(outcome.best.is_failure());
        assert_eq!(outcome.attempts, 0);
    }

    #[test]
    fn test_zero_timeout_config_disables_budget() {
        let config = EngineConfig {
            attempt_timeout_secs: 0,
            ..EngineConfig::default()
        };
        assert_eq!(OcrArbiter::from_config(&config).timeout, None);
        assert_eq!(
            OcrArbiter::from_config(&EngineConfig::default()).timeout,
            Some(Duration::from_secs(120))
        );
    }
}
