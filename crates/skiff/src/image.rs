//! Making sure the images a test run needs are present locally.

use std::collections::BTreeMap;
use std::path::PathBuf;

use skiff_common::{EngineError, EngineErrorKind, SkiffError, SkiffResult};

use crate::runtime::EngineClient;

/// Inputs of an image build.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ImageBuildData {
    /// Tags to apply; the first one is checked for presence.
    pub tags: Vec<String>,
    /// Build arguments.
    pub args: BTreeMap<String, Option<String>>,
    /// Build context directory.
    pub root: PathBuf,
    /// Dockerfile path, relative to `root`.
    pub dockerfile: String,
    /// Ignore the build cache.
    pub no_cache: bool,
    /// Delete `root` once the build is done.
    pub clear_root: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Action {
    Pull,
    Build { data: ImageBuildData, force: bool },
}

/// What to do about one image.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImagePlan {
    tags: Vec<String>,
    action: Action,
}

impl ImagePlan {
    /// Pull `tag` if it is missing.
    pub fn pull(tag: impl Into<String>) -> Self {
        Self {
            tags: vec![tag.into()],
            action: Action::Pull,
        }
    }

    /// Build the image if it is missing, or always when `force` is set.
    #[must_use]
    pub fn build(data: ImageBuildData, force: bool) -> Self {
        Self {
            tags: data.tags.clone(),
            action: Action::Build { data, force },
        }
    }

    /// Tags the plan concerns.
    #[must_use]
    pub fn tags(&self) -> &[String] {
        &self.tags
    }
}

/// Pull or build every image that is missing locally.
///
/// # Errors
///
/// Fails on the first image that cannot be inspected, pulled or built; the
/// error names its tag.
pub async fn ensure_images<C: EngineClient + ?Sized>(
    client: &C,
    plans: &[ImagePlan],
) -> SkiffResult<()> {
    for plan in plans {
        let Some(tag) = plan.tags.first() else {
            continue;
        };

        let exists = client
            .image_exists(tag)
            .await
            .map_err(|source| image_error("find image", tag, source))?;

        match &plan.action {
            Action::Pull if !exists => {
                tracing::info!(image = %tag, "Pulling image");
                client
                    .pull_image(tag)
                    .await
                    .map_err(|source| image_error("pull image", tag, source))?;
            }
            Action::Build { data, force } if !exists || *force => {
                if let Some(latest) = data.tags.iter().find(|t| t.contains(":latest")) {
                    remove_previous(client, latest).await;
                }

                tracing::info!(image = %tag, "Building image");
                client
                    .build_image(data)
                    .await
                    .map_err(|source| image_error("build image", tag, source))?;
            }
            _ => tracing::debug!(image = %tag, "Image present"),
        }
    }

    Ok(())
}

async fn remove_previous<C: EngineClient + ?Sized>(client: &C, tag: &str) {
    match client.remove_image(tag).await {
        Ok(()) => tracing::debug!(image = %tag, "Removed previous image"),
        Err(e) if e.kind == EngineErrorKind::NotFound => {}
        Err(e) => tracing::warn!(image = %tag, error = %e, "Failed to remove previous image"),
    }
}

fn image_error(operation: &'static str, tag: &str, source: EngineError) -> SkiffError {
    SkiffError::Engine {
        operation,
        name: tag.to_string(),
        id: String::new(),
        source,
    }
}
