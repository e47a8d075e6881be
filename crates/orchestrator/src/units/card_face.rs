//! Front-face content for the revealed card.

use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use summon_core::ProjectDescriptor;
use thiserror::Error;
use tracing::{error, warn};

use crate::backend::FaceContent;
use crate::error::panic_message;

const MAX_STARS: u8 = 5;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum FaceError {
    #[error("project {0} has no display name")]
    MissingTitle(String),

    #[error("importance {0} cannot be rendered as stars")]
    InvalidImportance(f32),

    #[error("face composition failed: {0}")]
    Composer(String),
}

/// Turns a descriptor into front-face content.
pub trait FaceComposer: Send + Sync {
    fn compose(&self, descriptor: &ProjectDescriptor) -> Result<FaceContent, FaceError>;
}

/// Title, category, rarity accent, importance as 0-5 stars and the summary
/// from the detail payload.
#[derive(Debug, Clone, Copy, Default)]
pub struct DescriptorFaceComposer;

impl FaceComposer for DescriptorFaceComposer {
    fn compose(&self, descriptor: &ProjectDescriptor) -> Result<FaceContent, FaceError> {
        let title = descriptor.display_name.trim();
        if title.is_empty() {
            return Err(FaceError::MissingTitle(descriptor.id.clone()));
        }
        if !descriptor.importance.is_finite() {
            return Err(FaceError::InvalidImportance(descriptor.importance));
        }

        Ok(FaceContent {
            title: title.to_string(),
            subtitle: subtitle(descriptor),
            rarity: descriptor.rarity,
            accent_rgb: descriptor.rarity.accent_rgb(),
            stars: descriptor.importance.round().clamp(0.0, f32::from(MAX_STARS)) as u8,
            summary: descriptor.summary().map(str::to_string),
            placeholder: false,
        })
    }
}

fn subtitle(descriptor: &ProjectDescriptor) -> String {
    let category = descriptor.category.trim();
    if category.is_empty() {
        descriptor.rarity.as_str().to_string()
    } else {
        format!("{} / {}", category, descriptor.rarity.as_str())
    }
}

/// Neutral face used when composition fails.
pub fn placeholder(descriptor: &ProjectDescriptor) -> FaceContent {
    let title = descriptor.display_name.trim();
    FaceContent {
        title: if title.is_empty() {
            descriptor.id.clone()
        } else {
            title.to_string()
        },
        subtitle: String::new(),
        rarity: descriptor.rarity,
        accent_rgb: descriptor.rarity.accent_rgb(),
        stars: 0,
        summary: None,
        placeholder: true,
    }
}

/// Compose, substituting the placeholder for an error or a panic.
pub(crate) fn compose_safely(
    composer: &dyn FaceComposer,
    descriptor: &ProjectDescriptor,
) -> Arc<FaceContent> {
    match std::panic::catch_unwind(AssertUnwindSafe(|| composer.compose(descriptor))) {
        Ok(Ok(content)) => Arc::new(content),
        Ok(Err(e)) => {
            warn!(project_id = %descriptor.id, error = %e, "Face composition failed, using placeholder");
            Arc::new(placeholder(descriptor))
        }
        Err(payload) => {
            error!(
                project_id = %descriptor.id,
                panic = %panic_message(payload.as_ref()),
                "Face composer panicked, using placeholder"
            );
            Arc::new(placeholder(descriptor))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use summon_core::RarityTier;

    struct Panicking;

    impl FaceComposer for Panicking {
        fn compose(&self, _descriptor: &ProjectDescriptor) -> Result<FaceContent, FaceError> {
            panic!("template missing")
        }
    }

    #[test]
    fn test_compose_from_descriptor() {
        let descriptor = ProjectDescriptor::new("atlas", "  Atlas ")
            .with_rarity(RarityTier::Epic)
            .with_category("Tooling")
            .with_importance(3.6)
            .with_detail(json!({"summary": "Maps everything"}));

        let face = DescriptorFaceComposer.compose(&descriptor).unwrap();
        assert_eq!(face.title, "Atlas");
        assert_eq!(face.subtitle, "Tooling / epic");
        assert_eq!(face.stars, 4);
        assert_eq!(face.accent_rgb, 0xa855f7);
        assert_eq!(face.summary.as_deref(), Some("Maps everything"));
        assert!(!face.placeholder);
    }

    #[test]
    fn test_stars_are_clamped() {
        let descriptor = ProjectDescriptor::new("p", "P").with_importance(42.0);
        assert_eq!(DescriptorFaceComposer.compose(&descriptor).unwrap().stars, 5);
        let descriptor = ProjectDescriptor::new("p", "P").with_importance(-3.0);
        assert_eq!(DescriptorFaceComposer.compose(&descriptor).unwrap().stars, 0);
    }

    #[test]
    fn test_errors_fall_back_to_placeholder() {
        let descriptor = ProjectDescriptor::new("ghost", "   ");
        assert_eq!(
            DescriptorFaceComposer.compose(&descriptor),
            Err(FaceError::MissingTitle("ghost".into()))
        );

        let face = compose_safely(&DescriptorFaceComposer, &descriptor);
        assert!(face.placeholder);
        assert_eq!(face.title, "ghost");
    }

    #[test]
    fn test_panic_falls_back_to_placeholder() {
        let descriptor = ProjectDescriptor::new("p", "Project");
        let face = compose_safely(&Panicking, &descriptor);
        assert!(face.placeholder);
        assert_eq!(face.title, "Project");
    }
}
