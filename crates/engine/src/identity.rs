use chronicle_common::{ActorId, ActorInfo};
use parking_lot::RwLock;
use std::collections::HashMap;

#[derive(Debug, thiserror::Error)]
pub enum IdentityError {
    #[error("unknown actor {0}")]
    Unknown(ActorId),
    #[error("identity service unavailable: {0}")]
    Unavailable(String),
}

/// Resolves actor ids to display metadata.
pub trait IdentityLookup: Send + Sync {
    fn resolve(&self, actor: &ActorId) -> Result<ActorInfo, IdentityError>;
}

/// In-memory actor directory.
#[derive(Debug, Default)]
pub struct StaticDirectory {
    actors: RwLock<HashMap<ActorId, ActorInfo>>,
}

impl StaticDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_actors(actors: impl IntoIterator<Item = ActorInfo>) -> Self {
        let directory = Self::new();
        for actor in actors {
            directory.insert(actor);
        }
        directory
    }

    pub fn insert(&self, actor: ActorInfo) {
        self.actors.write().insert(actor.id.clone(), actor);
    }

    pub fn len(&self) -> usize {
        self.actors.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl IdentityLookup for StaticDirectory {
    fn resolve(&self, actor: &ActorId) -> Result<ActorInfo, IdentityError> {
        self.actors
            .read()
            .get(actor)
            .cloned()
            .ok_or_else(|| IdentityError::Unknown(actor.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolves_known_actors_only() {
        let directory = StaticDirectory::from_actors([ActorInfo {
            id: ActorId::new("ada"),
            display_name: "Ada".into(),
            email: "ada@example.com".into(),
            avatar_url: None,
        }]);
        assert_eq!(directory.len(), 1);
        assert_eq!(
            directory.resolve(&ActorId::new("ada")).unwrap().display_name,
            "Ada"
        );
        assert!(matches!(
            directory.resolve(&ActorId::new("bob")),
            Err(IdentityError::Unknown(_))
        ));
    }
}
