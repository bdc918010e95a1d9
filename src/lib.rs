pub mod cache;
pub mod cards;
pub mod coach;
pub mod evaluator;
pub mod game;
pub mod kv;
pub mod pipeline;
pub mod position;
pub mod progress;
pub mod scenario;
pub mod session;
pub mod store;
pub mod strength;
pub mod table;
pub mod tasks;
pub mod trainer;
pub mod web;

pub use cards::{Card, Hand};
pub use evaluator::{Evaluation, evaluate};
pub use game::Decision;
pub use pipeline::{PipelineConfig, ScenarioPipeline};
pub use position::Position;
pub use progress::SkillLevel;
pub use scenario::Scenario;
pub use session::{SessionConfig, TrainingSession};
pub use strength::{HandStrengthTier, classify};
pub use trainer::{Trainer, TrainerConfig, TrainerSummary};
