use hsm_domain::XName;
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum GraphError {
    #[error("component '{component}' is already a member of group '{existing_group}' in exclusive set '{exclusive_set}'")]
    ExclusiveConflict {
        component: String,
        existing_group: String,
        exclusive_set: String,
    },

    #[error("component '{component}' is already a member of partition '{existing}'")]
    AlreadyPartitioned { component: String, existing: String },

    #[error("unknown component: {0}")]
    UnknownComponent(String),
}

impl GraphError {
    pub fn unknown(id: &XName) -> Self {
        GraphError::UnknownComponent(id.to_string())
    }
}
