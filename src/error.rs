use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ResolveError {
    #[error("recipe {0} does not exist")]
    RecipeNotFound(String),

    #[error("circular dependency detected: {recipe}")]
    CircularDependency {
        /// Name of the recipe that was reached again
        recipe: String,
        /// Recipe ids on the branch when the cycle closed, outermost first
        path: Vec<String>,
    },

    #[error("no recipe produces item {0}")]
    NoProducingRecipe(String),
}

impl ResolveError {
    pub fn is_circular(&self) -> bool {
        matches!(self, ResolveError::CircularDependency { .. })
    }
}

pub type Result<T> = std::result::Result<T, ResolveError>;
