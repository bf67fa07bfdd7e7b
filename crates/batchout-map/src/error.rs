#[derive(Debug, thiserror::Error)]
pub enum MapError {
    #[error("map element must be a column name (string) or a single-key {{index: [children]}} mapping, got: {0}")]
    InvalidElement(serde_json::Value),

    #[error("index mapping must have exactly one key, got {0}")]
    NotASingleKeyMapping(usize),

    #[error("index children must be a list, got: {0}")]
    ChildrenNotAList(serde_json::Value),
}
