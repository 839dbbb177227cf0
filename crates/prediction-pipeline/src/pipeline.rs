//! Prediction Pipeline Implementation

use std::sync::Arc;
use std::time::Instant;

use class_index::{ClassIndex, LookupError};
use confidence_scorer::{softmax, top_k, ConfidenceScorer};
use image_preprocessor::ImagePreprocessor;
use inference_engine::{InferenceEngine, InferenceError};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn, Level};

use crate::ClassifyError;

/// Runner-up classes written to debug logs
const DEBUG_TOP_K: usize = 3;

/// Outcome of one pipeline run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Prediction {
    /// Winning class and its confidence percentage (0 to 100)
    Success { class_name: String, confidence: f64 },
    /// Stage failure, flattened to its message
    Failure { error: String },
}

impl Prediction {
    /// True for the success variant
    pub fn is_success(&self) -> bool {
        matches!(self, Prediction::Success { .. })
    }
}

impl From<Result<Classification, ClassifyError>> for Prediction {
    fn from(result: Result<Classification, ClassifyError>) -> Self {
        match result {
            Ok(c) => Prediction::Success {
                class_name: c.class_name,
                confidence: c.confidence,
            },
            Err(e) => Prediction::Failure {
                error: e.to_string(),
            },
        }
    }
}

/// Successful classification with its label index
#[derive(Debug, Clone, PartialEq)]
pub struct Classification {
    pub index: usize,
    pub class_name: String,
    pub confidence: f64,
}

/// Preprocessor -> engine -> scorer, with class name resolution.
///
/// Holds only read-only collaborators; one instance serves all requests.
pub struct PredictionPipeline {
    preprocessor: ImagePreprocessor,
    engine: Arc<dyn InferenceEngine>,
    class_index: Arc<ClassIndex>,
    scorer: ConfidenceScorer,
}

impl PredictionPipeline {
    /// Assemble a pipeline, rejecting collaborators that cannot agree.
    ///
    /// The engine must accept the preprocessor's tensor shape, and if it
    /// declares its output width that width must equal the class count.
    pub fn new(
        preprocessor: ImagePreprocessor,
        engine: Arc<dyn InferenceEngine>,
        class_index: Arc<ClassIndex>,
    ) -> Result<Self, ClassifyError> {
        let produced = preprocessor.config().tensor_shape();
        let accepted = engine.input_shape();
        if produced != accepted {
            return Err(InferenceError::InvalidInputShape {
                expected: format!("{:?}", accepted),
                actual: format!("{:?}", produced),
            }
            .into());
        }

        if let Some(width) = engine.output_width() {
            class_index.check_width(width)?;
        }

        info!(
            "Prediction pipeline ready: backend={}, classes={}, input={:?}",
            engine.backend_name(),
            class_index.len(),
            accepted
        );

        Ok(Self {
            preprocessor,
            engine,
            class_index,
            scorer: ConfidenceScorer::new(),
        })
    }

    /// Classify image bytes; never fails, errors become [`Prediction::Failure`]
    pub fn run(&self, bytes: &[u8]) -> Prediction {
        let result = self.classify(bytes);

        match &result {
            Ok(c) => {
                metrics::counter!("classifier_predictions_total", "outcome" => "success").increment(1);
                info!("Predicted '{}' ({:.2}%)", c.class_name, c.confidence);
            }
            Err(e) => {
                metrics::counter!("classifier_predictions_total", "outcome" => "failure", "stage" => e.kind())
                    .increment(1);
                warn!("Prediction failed at {} stage: {}", e.kind(), e);
            }
        }

        result.into()
    }

    /// Classify image bytes, keeping the failing stage
    pub fn classify(&self, bytes: &[u8]) -> Result<Classification, ClassifyError> {
        let start = Instant::now();

        let tensor = self.preprocessor.process(bytes)?;
        let preprocessed = start.elapsed();

        let logits = self.engine.infer(tensor)?;
        let inferred = start.elapsed();
        metrics::histogram!("classifier_inference_seconds")
            .record((inferred - preprocessed).as_secs_f64());

        self.class_index.check_width(logits.len())?;
        let score = self.scorer.score(logits.as_slice())?;
        let class_name = self.resolve(score.index)?;

        debug!(
            "Pipeline timings: preprocess={:?}, inference={:?}, total={:?}",
            preprocessed,
            inferred - preprocessed,
            start.elapsed()
        );
        if tracing::enabled!(Level::DEBUG) {
            if let Ok(probabilities) = softmax(logits.as_slice()) {
                for (index, p) in top_k(&probabilities, DEBUG_TOP_K) {
                    let name = self.class_index.name_for(index).unwrap_or("?");
                    debug!("  {} ({}) p={:.4}", name, index, p);
                }
            }
        }

        Ok(Classification {
            index: score.index,
            class_name,
            confidence: score.confidence,
        })
    }

    fn resolve(&self, index: usize) -> Result<String, LookupError> {
        self.class_index.name_for(index).map(str::to_string)
    }

    /// Class mapping in use
    pub fn class_index(&self) -> &ClassIndex {
        &self.class_index
    }

    /// Backend name of the engine
    pub fn backend_name(&self) -> &'static str {
        self.engine.backend_name()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image_preprocessor::{ImageTensor, PreprocessConfig};
    use inference_engine::{Logits, MockEngine};

    struct NanEngine;

    impl InferenceEngine for NanEngine {
        fn infer(&self, _input: ImageTensor) -> Result<Logits, InferenceError> {
            Ok(Logits::new(vec![0.0, f32::NAN, 0.0]))
        }

        fn input_shape(&self) -> [usize; 4] {
            [1, 3, 224, 224]
        }

        fn backend_name(&self) -> &'static str {
            "nan"
        }
    }

    fn classes() -> Arc<ClassIndex> {
        Arc::new(ClassIndex::from_names(["rose", "tulip", "daisy"]).unwrap())
    }

    #[test]
    fn test_rejects_mismatched_input_shape() {
        let engine = Arc::new(MockEngine::new(vec![0.0; 3]));
        let pre = ImagePreprocessor::new(PreprocessConfig::with_size(128, 128));

        let err = PredictionPipeline::new(pre, engine, classes()).err().unwrap();
        assert!(matches!(
            err,
            ClassifyError::Inference(InferenceError::InvalidInputShape { .. })
        ));
    }

    #[test]
    fn test_rejects_mismatched_class_count() {
        let engine = Arc::new(MockEngine::new(vec![0.0; 5]));

        let err = PredictionPipeline::new(ImagePreprocessor::default(), engine, classes())
            .err()
            .unwrap();
        assert!(matches!(
            err,
            ClassifyError::Lookup(LookupError::WidthMismatch { expected: 3, actual: 5 })
        ));
    }

    #[test]
    fn test_empty_bytes_become_failure() {
        let engine = Arc::new(MockEngine::new(vec![1.0, 0.0, 0.0]));
        let pipeline = PredictionPipeline::new(ImagePreprocessor::default(), engine, classes()).unwrap();

        let prediction = pipeline.run(&[]);
        assert!(!prediction.is_success());
        assert!(matches!(
            pipeline.classify(&[]),
            Err(ClassifyError::Decode(_))
        ));
    }

    #[test]
    fn test_failure_kinds() {
        let err: ClassifyError = LookupError::OutOfRange { index: 9, len: 3 }.into();
        assert_eq!(err.kind(), "lookup");
        assert_eq!(err.to_string(), "Class index 9 is out of range for 3 classes");
    }

    #[test]
    fn test_prediction_serialization() {
        let success = Prediction::Success {
            class_name: "rose".to_string(),
            confidence: 90.5,
        };
        let failure = Prediction::Failure {
            error: "bad".to_string(),
        };

        assert_eq!(
            serde_json::to_value(&success).unwrap(),
            serde_json::json!({"class_name": "rose", "confidence": 90.5})
        );
        assert_eq!(
            serde_json::to_value(&failure).unwrap(),
            serde_json::json!({"error": "bad"})
        );
    }

    #[test]
    fn test_non_finite_logits_are_reported() {
        let pipeline =
            PredictionPipeline::new(ImagePreprocessor::default(), Arc::new(NanEngine), classes())
                .unwrap();
        let img = image::RgbImage::from_pixel(8, 8, image::Rgb([1, 2, 3]));
        let mut bytes = Vec::new();
        image::DynamicImage::ImageRgb8(img)
            .write_to(&mut std::io::Cursor::new(&mut bytes), image::ImageFormat::Png)
            .unwrap();

        let err = pipeline.classify(&bytes).unwrap_err();
        assert!(matches!(err, ClassifyError::Score(_)));
    }
}
