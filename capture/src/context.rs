use errors::{BridgeError, BridgeResult};
use fl_core::SessionOwner;

/// The monitored session as seen by the pipeline. Only exists for a valid owner.
#[derive(Debug, Clone)]
pub struct ServiceContext {
    owner: SessionOwner
}

impl ServiceContext {
    pub fn new(owner: Option<SessionOwner>) -> BridgeResult<Self> {
        let owner = owner.ok_or(BridgeError::MissingSessionOwner)?;

        if !owner.valid {
            return Err(BridgeError::InvalidSessionOwner {
                reason: format!("unit {} is no longer valid", owner.unit_id)
            });
        }

        if owner.unit_id.trim().is_empty() {
            return Err(BridgeError::InvalidSessionOwner {
                reason: "empty unit id".to_string()
            });
        }

        Ok(Self { owner })
    }

    pub fn owner(&self) -> &SessionOwner {
        &self.owner
    }
}
