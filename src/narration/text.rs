use std::fs;

use super::{Artifact, ArtifactKind, NarrationError, NarrationJob};

/// Last resort: the original narrative, unmodified, as a `.txt` file.
pub struct TextFileTier;

impl TextFileTier {
    pub fn name(&self) -> &str {
        "text-file"
    }

    pub fn write(&self, job: &NarrationJob<'_>) -> Result<Artifact, NarrationError> {
        fs::write(&job.text_path, job.original).map_err(|source| NarrationError::Write {
            path: job.text_path.clone(),
            source,
        })?;
        Ok(Artifact::new(job.text_path.clone(), ArtifactKind::Text))
    }
}
