pub mod skill;
pub mod registry;
pub mod dry_run;

pub use skill::{Skill, SkillMetadata, SkillResult};
pub use registry::SkillRegistry;
pub use dry_run::DryRunSkill;
