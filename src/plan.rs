//! Task planning for the three run modes.
//!
//! Every run is turned into an explicit list of [`TaskSpec`] descriptors
//! before anything is scheduled. Seeds are drawn here so a seeded RNG gives
//! reproducible plans.

use rand::Rng;

use crate::error::{Result, StudioError};
use crate::types::{Angle, GeneratedImage, GenerationConfig, Resolution};

/// Seeds are drawn from `0..SEED_RANGE`.
pub const SEED_RANGE: u64 = 1_000_000_000;

/// How a task relates to the other tasks of its run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TaskRole {
    /// Stands alone.
    Single,
    /// First view of a text-only chain. On success it spawns one
    /// derived task per remaining angle.
    Anchor { remaining: Vec<Angle> },
    /// A follow-up view rendered from an anchor's image.
    Derived,
}

/// One unit of scheduled work.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskSpec {
    pub prompt: String,
    pub angle: Angle,
    pub resolution: Resolution,
    pub seed: u64,
    /// Reference image as a data URL.
    pub reference: Option<String>,
    pub editing: bool,
    pub role: TaskRole,
}

impl TaskSpec {
    /// Follow-up tasks for a successful anchor: same prompt, seed and
    /// resolution, with the anchor's image as reference. Empty for other roles.
    pub fn derived_from(&self, anchor_image: &str) -> Vec<TaskSpec> {
        match &self.role {
            TaskRole::Anchor { remaining } => remaining
                .iter()
                .map(|&angle| TaskSpec {
                    prompt: self.prompt.clone(),
                    angle,
                    resolution: self.resolution,
                    seed: self.seed,
                    reference: Some(anchor_image.to_string()),
                    editing: false,
                    role: TaskRole::Derived,
                })
                .collect(),
            TaskRole::Single | TaskRole::Derived => Vec::new(),
        }
    }

    pub fn is_anchor(&self) -> bool {
        matches!(self.role, TaskRole::Anchor { .. })
    }
}

pub fn fresh_seed<R: Rng + ?Sized>(rng: &mut R) -> u64 {
    rng.random_range(0..SEED_RANGE)
}

/// Shortest imported prompt line kept; anything shorter is noise.
pub const MIN_BATCH_PROMPT_CHARS: usize = 3;

/// Prompts for a new-generation run. A non-empty imported batch wins over
/// the single free-text prompt. Imported lines shorter than
/// [`MIN_BATCH_PROMPT_CHARS`] after trimming are dropped.
pub fn resolve_prompts(single: &str, batch: &[String]) -> Vec<String> {
    let batch: Vec<String> = batch
        .iter()
        .map(|p| p.trim())
        .filter(|p| p.chars().count() >= MIN_BATCH_PROMPT_CHARS)
        .map(str::to_string)
        .collect();
    if !batch.is_empty() {
        return batch;
    }
    let single = single.trim();
    if single.is_empty() {
        Vec::new()
    } else {
        vec![single.to_string()]
    }
}

/// Plan a new-generation run.
///
/// With an uploaded reference every (prompt, repetition, angle) becomes an
/// independent task. Without one, each (prompt, repetition) becomes a single
/// anchor task at the first angle that carries the remaining angles.
pub fn plan_new_generation<R: Rng + ?Sized>(
    config: &GenerationConfig,
    prompts: &[String],
    uploaded: Option<&str>,
    rng: &mut R,
) -> Result<Vec<TaskSpec>> {
    if prompts.is_empty() {
        return Err(StudioError::NoPrompt);
    }
    let angles = config.selected_angles();
    let Some((&first, rest)) = angles.split_first() else {
        return Err(StudioError::NoAngleSelected);
    };

    let mut tasks = Vec::new();
    for prompt in prompts {
        for _ in 0..config.effective_batch_count() {
            match uploaded {
                Some(reference) => {
                    for &angle in &angles {
                        tasks.push(TaskSpec {
                            prompt: prompt.clone(),
                            angle,
                            resolution: config.resolution,
                            seed: fresh_seed(rng),
                            reference: Some(reference.to_string()),
                            editing: false,
                            role: TaskRole::Single,
                        });
                    }
                }
                None => tasks.push(TaskSpec {
                    prompt: prompt.clone(),
                    angle: first,
                    resolution: config.resolution,
                    seed: fresh_seed(rng),
                    reference: None,
                    editing: false,
                    role: TaskRole::Anchor {
                        remaining: rest.to_vec(),
                    },
                }),
            }
        }
    }
    Ok(tasks)
}

/// Plan a batch edit: one edit per target, keeping its angle and resolution.
/// A blank `edit_prompt` reuses each image's own prompt.
pub fn plan_batch_edit<R: Rng + ?Sized>(
    targets: &[GeneratedImage],
    edit_prompt: &str,
    rng: &mut R,
) -> Vec<TaskSpec> {
    let edit_prompt = edit_prompt.trim();
    targets
        .iter()
        .map(|image| {
            let prompt = if edit_prompt.is_empty() {
                image.prompt.clone()
            } else {
                edit_prompt.to_string()
            };
            edit_task(image, prompt, image.resolution, rng)
        })
        .collect()
}

/// Plan a batch upscale: re-render each target at `target` resolution from
/// its original prompt.
pub fn plan_batch_upscale<R: Rng + ?Sized>(
    targets: &[GeneratedImage],
    target: Resolution,
    rng: &mut R,
) -> Vec<TaskSpec> {
    targets
        .iter()
        .map(|image| edit_task(image, image.prompt.clone(), target, rng))
        .collect()
}

/// Edit task over an existing image.
pub fn edit_task<R: Rng + ?Sized>(
    image: &GeneratedImage,
    prompt: String,
    resolution: Resolution,
    rng: &mut R,
) -> TaskSpec {
    TaskSpec {
        prompt,
        angle: image.angle,
        resolution,
        seed: fresh_seed(rng),
        reference: Some(image.image_data.clone()),
        editing: true,
        role: TaskRole::Single,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn image(id: &str, prompt: &str, angle: Angle, resolution: Resolution) -> GeneratedImage {
        GeneratedImage {
            id: id.to_string(),
            image_data: format!("data:image/png;base64,{}", id),
            angle,
            prompt: prompt.to_string(),
            timestamp: 1,
            resolution,
        }
    }

    #[test]
    fn test_resolve_prompts_batch_wins() {
        let batch = vec!["  mug ".to_string(), "".to_string(), "lamp".to_string()];
        assert_eq!(resolve_prompts("single", &batch), vec!["mug", "lamp"]);
        assert_eq!(resolve_prompts("  single  ", &[]), vec!["single"]);
        assert!(resolve_prompts("   ", &["  ".to_string()]).is_empty());
    }

    #[test]
    fn test_short_batch_lines_dropped() {
        let batch = vec!["a".to_string(), " ab ".to_string(), "abc".to_string(), "--".to_string()];
        assert_eq!(resolve_prompts("single", &batch), vec!["abc"]);

        // All lines too short: fall back to the free-text prompt.
        let batch = vec!["x".to_string(), "yz".to_string()];
        assert_eq!(resolve_prompts("single", &batch), vec!["single"]);

        // The free-text prompt has no minimum length.
        assert_eq!(resolve_prompts("ox", &[]), vec!["ox"]);
    }

    #[test]
    fn test_no_prompt_fails() {
        let mut rng = StdRng::seed_from_u64(1);
        let err = plan_new_generation(&GenerationConfig::default(), &[], None, &mut rng);
        assert!(matches!(err, Err(StudioError::NoPrompt)));
    }

    #[test]
    fn test_no_angle_fails() {
        let mut rng = StdRng::seed_from_u64(1);
        let config = GenerationConfig::default().with_angles(&[]);
        let err = plan_new_generation(&config, &["cup".to_string()], None, &mut rng);
        assert!(matches!(err, Err(StudioError::NoAngleSelected)));
    }

    #[test]
    fn test_text_only_plans_one_anchor_per_repetition() {
        let mut rng = StdRng::seed_from_u64(7);
        let config = GenerationConfig {
            batch_count: 2,
            ..GenerationConfig::default().with_angles(&[Angle::Front, Angle::LeftSide, Angle::TopDown])
        };
        let prompts = vec!["cup".to_string(), "mug".to_string()];
        let tasks = plan_new_generation(&config, &prompts, None, &mut rng).unwrap();

        assert_eq!(tasks.len(), 4);
        for task in &tasks {
            assert_eq!(task.angle, Angle::Front);
            assert!(task.reference.is_none());
            assert_eq!(
                task.role,
                TaskRole::Anchor {
                    remaining: vec![Angle::LeftSide, Angle::TopDown]
                }
            );
            assert!(task.seed < SEED_RANGE);
        }
        assert_eq!(tasks[0].prompt, "cup");
        assert_eq!(tasks[2].prompt, "mug");
    }

    #[test]
    fn test_uploaded_reference_plans_independent_tasks() {
        let mut rng = StdRng::seed_from_u64(7);
        let config = GenerationConfig::default().with_angles(&[Angle::Front, Angle::LeftSide]);
        let tasks =
            plan_new_generation(&config, &["cup".to_string()], Some("data:x"), &mut rng).unwrap();

        assert_eq!(tasks.len(), 2);
        assert_eq!(tasks[0].angle, Angle::Front);
        assert_eq!(tasks[1].angle, Angle::LeftSide);
        assert!(tasks.iter().all(|t| t.role == TaskRole::Single && !t.editing));
        assert!(tasks.iter().all(|t| t.reference.as_deref() == Some("data:x")));
    }

    #[test]
    fn test_derived_reuse_anchor_seed() {
        let anchor = TaskSpec {
            prompt: "cup".into(),
            angle: Angle::Front,
            resolution: Resolution::TwoK,
            seed: 1234,
            reference: None,
            editing: false,
            role: TaskRole::Anchor {
                remaining: vec![Angle::LeftSide, Angle::TopDown],
            },
        };
        let derived = anchor.derived_from("data:anchor");
        assert_eq!(derived.len(), 2);
        assert_eq!(derived[0].angle, Angle::LeftSide);
        assert_eq!(derived[1].angle, Angle::TopDown);
        for task in &derived {
            assert_eq!(task.seed, 1234);
            assert_eq!(task.resolution, Resolution::TwoK);
            assert_eq!(task.reference.as_deref(), Some("data:anchor"));
            assert_eq!(task.role, TaskRole::Derived);
            assert!(task.derived_from("data:x").is_empty());
        }
    }

    #[test]
    fn test_batch_edit_prompt_fallback() {
        let mut rng = StdRng::seed_from_u64(3);
        let targets = vec![
            image("a", "red cup", Angle::Front, Resolution::TwoK),
            image("b", "blue cup", Angle::Isometric, Resolution::OneK),
        ];

        let tasks = plan_batch_edit(&targets, "   ", &mut rng);
        assert_eq!(tasks[0].prompt, "red cup");
        assert_eq!(tasks[1].prompt, "blue cup");
        assert_eq!(tasks[0].resolution, Resolution::TwoK);
        assert_eq!(tasks[1].angle, Angle::Isometric);
        assert!(tasks.iter().all(|t| t.editing));

        let tasks = plan_batch_edit(&targets, " make it gold ", &mut rng);
        assert!(tasks.iter().all(|t| t.prompt == "make it gold"));
        assert_eq!(tasks[0].reference.as_deref(), Some("data:image/png;base64,a"));
    }

    #[test]
    fn test_batch_upscale_forces_resolution() {
        let mut rng = StdRng::seed_from_u64(3);
        let targets = vec![
            image("a", "red cup", Angle::Front, Resolution::OneK),
            image("b", "blue cup", Angle::LeftSide, Resolution::TwoK),
        ];
        let tasks = plan_batch_upscale(&targets, Resolution::FourK, &mut rng);
        assert!(tasks.iter().all(|t| t.resolution == Resolution::FourK && t.editing));
        assert_eq!(tasks[1].prompt, "blue cup");
    }
}
