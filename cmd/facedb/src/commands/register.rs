//! Register command.

use std::path::PathBuf;

use clap::Args;
use facedb::Upsert;
use facedb_cli::{Output, OutputFormat};
use facedb_embed::Embedder;
use serde::Serialize;

use super::{
    create_embedder, load_config, output, prepare_embedding, print_success, print_verbose,
    print_warning, with_store,
};
use crate::Cli;

/// Register a person from the most confident face in an image.
///
/// Registering an existing name replaces that person's embedding.
#[derive(Args)]
pub struct RegisterCommand {
    /// Person name (unique, case-sensitive)
    name: String,

    /// Image containing the person's face
    image: PathBuf,
}

#[derive(Serialize)]
struct RegisterResult<'a> {
    name: &'a str,
    image: String,
    confidence: f32,
    action: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    face_file: Option<String>,
}

impl RegisterCommand {
    pub fn run(&self, cli: &Cli) -> anyhow::Result<()> {
        let cfg = load_config(cli)?;
        let embedder = create_embedder(&cfg);

        let face = embedder.best_face(&self.image)?;
        if face.confidence < cfg.thresholds.detection_confidence {
            anyhow::bail!(
                "no face detected in image {} above confidence {}",
                self.image.display(),
                cfg.thresholds.detection_confidence
            );
        }
        print_verbose(cli, &format!("Using face with confidence {}", face.confidence));

        let image = self.image.to_string_lossy().into_owned();
        let embedding = prepare_embedding(&cfg, face.embedding.clone());
        let outcome = with_store(&cfg, |store| {
            Ok(store.upsert(&self.name, &image, &embedding, face.confidence)?)
        })?;

        // The person is registered at this point; a failed face dump only warns.
        let face_file = if cfg.settings.save_detected_faces {
            let path = cfg.feature_path(&face_file_name(&self.name));
            match Output::new(OutputFormat::Json, Some(path.clone())).write(&face) {
                Ok(()) => Some(path.display().to_string()),
                Err(e) => {
                    print_warning(&format!("Cannot save face to {}: {:#}", path.display(), e));
                    None
                }
            }
        } else {
            None
        };

        let action = match outcome {
            Upsert::Added => "added",
            Upsert::Updated => "updated",
        };
        print_success(&format!(
            "Registered {} ({}) with confidence {}",
            self.name, action, face.confidence
        ));

        output(cli).write(&RegisterResult {
            name: &self.name,
            image,
            confidence: face.confidence,
            action,
            face_file,
        })
    }
}

/// File name for a person's saved face. Path separators in the name are
/// replaced so the file always lands directly in the features directory.
fn face_file_name(name: &str) -> String {
    let safe: String = name
        .chars()
        .map(|c| if matches!(c, '/' | '\\' | ':') { '_' } else { c })
        .collect();
    format!("{}_face.json", safe)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;

    #[test]
    fn test_face_file_name() {
        assert_eq!(face_file_name("Alice"), "Alice_face.json");
        assert_eq!(face_file_name("../x"), ".._x_face.json");
        assert_eq!(face_file_name("a\\b:c"), "a_b_c_face.json");
    }

    #[test]
    fn test_face_file_stays_in_features_dir() {
        let features = Path::new("/data/features");
        for name in ["../../etc/passwd", "/abs", "..", "a/../../b"] {
            let path = features.join(face_file_name(name));
            assert_eq!(path.parent(), Some(features), "{name}");
        }
    }
}
