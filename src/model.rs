use std::fs::File;
use std::io::Read;

use tensorflow::{Graph, ImportGraphDefOptions, Session, SessionOptions, SessionRunArgs, Tensor};

use crate::error::ServiceError;
use crate::preprocess::{ImageTensor, CHANNELS, IMAGE_SIZE};

/// The opaque inference capability: one preprocessed image in, one raw
/// score vector out. The handler pipeline only sees this trait, so
/// tests substitute deterministic stubs for the real model.
pub trait Infer: Send + Sync {
    fn predict(&self, image: &ImageTensor) -> Result<Vec<f32>, ServiceError>;
}

const INPUT_OP: &str = "x";
const OUTPUT_OP: &str = "Identity";

/// TensorFlow frozen-graph backend. Loaded once at startup; the
/// session handles concurrent `run` calls, so no locking here.
pub struct TomatoModel {
    session: Session,
    graph: Graph,
}

impl TomatoModel {
    pub fn load(model_path: &str) -> Result<Self, Box<dyn std::error::Error>> {
        let mut graph = Graph::new();
        let mut model_file = File::open(model_path)?;
        let mut model_bytes = Vec::new();
        model_file.read_to_end(&mut model_bytes)?;

        graph.import_graph_def(&model_bytes, &ImportGraphDefOptions::new())?;
        let session = Session::new(&SessionOptions::new(), &graph)?;

        Ok(TomatoModel { session, graph })
    }
}

impl Infer for TomatoModel {
    fn predict(&self, image: &ImageTensor) -> Result<Vec<f32>, ServiceError> {
        // The graph expects a batch axis; we always feed a batch of one.
        let mut input: Tensor<f32> =
            Tensor::new(&[1, IMAGE_SIZE as u64, IMAGE_SIZE as u64, CHANNELS as u64]);
        input.copy_from_slice(image.as_slice());

        let input_operation = self
            .graph
            .operation_by_name(INPUT_OP)
            .map_err(|e| ServiceError::Inference(e.to_string()))?
            .ok_or_else(|| {
                ServiceError::Inference(format!("input operation '{INPUT_OP}' not found in graph"))
            })?;
        let output_operation = self
            .graph
            .operation_by_name(OUTPUT_OP)
            .map_err(|e| ServiceError::Inference(e.to_string()))?
            .ok_or_else(|| {
                ServiceError::Inference(format!(
                    "output operation '{OUTPUT_OP}' not found in graph"
                ))
            })?;

        let mut args = SessionRunArgs::new();
        args.add_feed(&input_operation, 0, &input);
        let output_token = args.request_fetch(&output_operation, 0);
        self.session
            .run(&mut args)
            .map_err(|e| ServiceError::Inference(e.to_string()))?;

        let output: Tensor<f32> = args
            .fetch(output_token)
            .map_err(|e| ServiceError::Inference(e.to_string()))?;
        Ok(output.to_vec())
    }
}
