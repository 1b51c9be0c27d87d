use std::collections::HashMap;
use std::sync::Arc;

use tracing::debug;

use crate::task::TaskType;
use super::skill::Skill;

/// Capability table mapping each task type to the skill that executes it.
///
/// Holds at most one skill per type. Registering a second skill for a type
/// replaces the first (last write wins) and hands the old one back.
#[derive(Default, Clone)]
pub struct SkillRegistry {
    skills: HashMap<TaskType, Arc<dyn Skill>>,
}

impl SkillRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, skill: Arc<dyn Skill>) -> Option<Arc<dyn Skill>> {
        let task_type = skill.task_type();
        let previous = self.skills.insert(task_type, skill);
        if let Some(ref old) = previous {
            debug!(task_type = %task_type, replaced = old.name(), "Replaced registered skill");
        }
        previous
    }

    pub fn with_skill(mut self, skill: Arc<dyn Skill>) -> Self {
        self.register(skill);
        self
    }

    pub fn get_skill(&self, task_type: TaskType) -> Option<Arc<dyn Skill>> {
        self.skills.get(&task_type).cloned()
    }

    /// Registered skills in `TaskType::ALL` order.
    pub fn get_all_skills(&self) -> Vec<Arc<dyn Skill>> {
        TaskType::ALL
            .iter()
            .filter_map(|t| self.skills.get(t).cloned())
            .collect()
    }

    pub fn get_skill_types(&self) -> Vec<TaskType> {
        TaskType::ALL
            .iter()
            .copied()
            .filter(|t| self.skills.contains_key(t))
            .collect()
    }

    pub fn contains(&self, task_type: TaskType) -> bool {
        self.skills.contains_key(&task_type)
    }

    pub fn len(&self) -> usize {
        self.skills.len()
    }

    pub fn is_empty(&self) -> bool {
        self.skills.is_empty()
    }
}

impl std::fmt::Debug for SkillRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SkillRegistry")
            .field("types", &self.get_skill_types())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::HeraldError;
    use crate::skills::SkillResult;
    use crate::task::Payload;
    use async_trait::async_trait;
    use tokio_util::sync::CancellationToken;

    struct NamedSkill {
        name: &'static str,
        task_type: TaskType,
    }

    #[async_trait]
    impl Skill for NamedSkill {
        fn name(&self) -> &str {
            self.name
        }

        fn description(&self) -> &str {
            "test skill"
        }

        fn task_type(&self) -> TaskType {
            self.task_type
        }

        async fn execute(&self, _payload: &Payload, _cancel: CancellationToken) -> Result<SkillResult, HeraldError> {
            Ok(SkillResult::ok(serde_json::json!({ "by": self.name })))
        }
    }

    fn skill(name: &'static str, task_type: TaskType) -> Arc<dyn Skill> {
        Arc::new(NamedSkill { name, task_type })
    }

    #[test]
    fn test_register_and_lookup() {
        let mut registry = SkillRegistry::new();
        assert!(registry.register(skill("writer", TaskType::ContentGeneration)).is_none());

        let found = registry.get_skill(TaskType::ContentGeneration).unwrap();
        assert_eq!(found.name(), "writer");
        assert!(registry.get_skill(TaskType::SocialPost).is_none());
        assert!(registry.contains(TaskType::ContentGeneration));
    }

    #[test]
    fn test_duplicate_registration_replaces() {
        let mut registry = SkillRegistry::new();
        registry.register(skill("first", TaskType::SocialPost));
        let replaced = registry.register(skill("second", TaskType::SocialPost)).unwrap();

        assert_eq!(replaced.name(), "first");
        assert_eq!(registry.len(), 1);
        assert_eq!(registry.get_skill(TaskType::SocialPost).unwrap().name(), "second");
    }

    #[test]
    fn test_listing_follows_enum_order() {
        let registry = SkillRegistry::new()
            .with_skill(skill("mail", TaskType::EmailCampaign))
            .with_skill(skill("writer", TaskType::ContentGeneration));

        assert_eq!(
            registry.get_skill_types(),
            vec![TaskType::ContentGeneration, TaskType::EmailCampaign]
        );
        let names: Vec<_> = registry.get_all_skills().iter().map(|s| s.name().to_string()).collect();
        assert_eq!(names, vec!["writer", "mail"]);
    }

    #[test]
    fn test_empty_registry() {
        let registry = SkillRegistry::new();
        assert!(registry.is_empty());
        assert!(registry.get_all_skills().is_empty());
        assert!(registry.get_skill_types().is_empty());
    }
}
