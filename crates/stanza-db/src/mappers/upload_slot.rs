//! Upload slot mappers

use stanza_core::{DomainError, UploadSlot};

use crate::models::UploadSlotModel;

impl From<UploadSlotModel> for UploadSlot {
    fn from(model: UploadSlotModel) -> Self {
        UploadSlot {
            id: model.id,
            filename: model.filename,
            // The column carries a non-negative CHECK constraint
            size: u64::try_from(model.size).unwrap_or_default(),
            content_type: model.content_type,
            created_at: model.created_at,
        }
    }
}

/// Data for inserting a new upload slot
#[derive(Debug, Clone)]
pub struct UploadSlotInsert<'a> {
    pub filename: &'a str,
    pub size: i64,
    pub content_type: Option<&'a str>,
}

impl<'a> TryFrom<&'a UploadSlot> for UploadSlotInsert<'a> {
    type Error = DomainError;

    fn try_from(slot: &'a UploadSlot) -> Result<Self, Self::Error> {
        let size = i64::try_from(slot.size)
            .map_err(|_| DomainError::ValidationError(format!("size {} out of range", slot.size)))?;
        Ok(Self {
            filename: &slot.filename,
            size,
            content_type: slot.content_type.as_deref(),
        })
    }
}
