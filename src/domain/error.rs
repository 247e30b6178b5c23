use thiserror::Error;

#[derive(Debug, Error)]
pub enum DomainError {
    #[error("{entity} `{id}` not found")]
    NotFound { entity: &'static str, id: String },
    #[error("{entity} `{id}` does not belong to form {form_id}")]
    Mismatch {
        entity: &'static str,
        id: String,
        form_id: u64,
    },
}

impl DomainError {
    pub fn not_found(entity: &'static str, id: impl ToString) -> Self {
        Self::NotFound {
            entity,
            id: id.to_string(),
        }
    }

    pub fn mismatch(entity: &'static str, id: impl ToString, form_id: u64) -> Self {
        Self::Mismatch {
            entity,
            id: id.to_string(),
            form_id,
        }
    }
}
