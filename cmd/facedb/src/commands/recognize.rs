//! Recognize command.

use std::path::PathBuf;

use clap::Args;
use facedb_cli::Output;
use facedb_embed::{BoundingBox, Embedder};
use serde::Serialize;

use super::{
    create_embedder, load_config, output, prepare_embedding, print_success, print_verbose,
    with_store,
};
use crate::Cli;

/// Recognize every face in an image against the registered persons.
#[derive(Args)]
pub struct RecognizeCommand {
    /// Image to recognize
    image: PathBuf,

    /// Minimum similarity score (default: thresholds.face_similarity)
    #[arg(short, long)]
    threshold: Option<f32>,
}

#[derive(Debug, Serialize)]
struct FaceResult {
    index: usize,
    name: String,
    similarity: f32,
    confidence: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    bbox: Option<BoundingBox>,
}

#[derive(Debug, Serialize)]
struct RecognitionReport {
    image: String,
    threshold: f32,
    faces: Vec<FaceResult>,
    /// Faces dropped for low detection confidence.
    ignored: usize,
}

impl RecognizeCommand {
    pub fn run(&self, cli: &Cli) -> anyhow::Result<()> {
        let cfg = load_config(cli)?;
        let threshold = self.threshold.unwrap_or(cfg.thresholds.face_similarity);
        let min_confidence = cfg.thresholds.detection_confidence;

        let detected = create_embedder(&cfg).detect(&self.image)?;
        if detected.is_empty() {
            anyhow::bail!("no face detected in image {}", self.image.display());
        }
        print_verbose(cli, &format!("Detected {} face(s)", detected.len()));

        let report = with_store(&cfg, |store| {
            let mut faces = Vec::new();
            let mut ignored = 0;
            for (i, face) in detected.into_iter().enumerate() {
                if face.confidence < min_confidence {
                    ignored += 1;
                    continue;
                }
                let m = store.identify(&prepare_embedding(&cfg, face.embedding), threshold);
                faces.push(FaceResult {
                    index: i + 1,
                    name: m.name,
                    similarity: m.score,
                    confidence: face.confidence,
                    bbox: face.bbox,
                });
            }
            Ok(RecognitionReport {
                image: self.image.to_string_lossy().into_owned(),
                threshold,
                faces,
                ignored,
            })
        })?;

        for f in &report.faces {
            print_success(&format!(
                "Face {}: {} (similarity: {:.4})",
                f.index, f.name, f.similarity
            ));
        }

        let out = output(cli);
        if cfg.settings.save_detection_boxes {
            let path = cfg.result_path(&format!("recognition_result.{}", out.format.extension()));
            Output::new(out.format, Some(path.clone())).write(&report)?;
            print_verbose(cli, &format!("Recognition result saved as: {}", path.display()));
        }
        out.write(&report)
    }
}
