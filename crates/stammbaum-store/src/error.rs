use thiserror::Error;

use crate::handle::Handle;
use crate::model::RecordKind;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("{kind} record not found: {handle}")]
    NotFound { kind: RecordKind, handle: Handle },
}
