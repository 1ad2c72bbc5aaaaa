#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    #[error("Entity not found: {entity} at index {index}")]
    NotFound { entity: &'static str, index: usize },
}
