use std::error::Error;
use std::fmt::Display;
use std::sync::Mutex;

use log::debug;

use crate::config::Response;

/// Failures reported by a response store.
#[derive(Eq, PartialEq, Debug, Clone)]
pub enum StoreError {
    /// The backing storage could not be read or written.
    Unavailable(String),
    /// The backing storage was read but its layout is not understood.
    Malformed(String),
    /// A response with this respondent id was already recorded.
    DuplicateRespondent(String),
    /// The store only supports loading.
    ReadOnly,
}

impl Error for StoreError {}

impl Display for StoreError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StoreError::Unavailable(msg) => write!(f, "response store unavailable: {}", msg),
            StoreError::Malformed(msg) => write!(f, "response store is malformed: {}", msg),
            StoreError::DuplicateRespondent(id) => {
                write!(f, "respondent {} has already been recorded", id)
            }
            StoreError::ReadOnly => write!(f, "response store is read-only"),
        }
    }
}

/// The durable table of survey responses.
///
/// Implementations must apply `append` completely or not at all, and must not
/// let two appends interleave.
pub trait ResponseStore {
    fn load(&self) -> Result<Vec<Response>, StoreError>;

    fn append(&self, response: &Response) -> Result<(), StoreError>;
}

/// A store that keeps the responses in memory.
#[derive(Debug, Default)]
pub struct MemoryStore {
    rows: Mutex<Vec<Response>>,
}

impl MemoryStore {
    pub fn new() -> MemoryStore {
        MemoryStore::default()
    }

    pub fn with_responses(responses: Vec<Response>) -> MemoryStore {
        MemoryStore {
            rows: Mutex::new(responses),
        }
    }
}

impl ResponseStore for MemoryStore {
    fn load(&self) -> Result<Vec<Response>, StoreError> {
        let rows = self
            .rows
            .lock()
            .map_err(|e| StoreError::Unavailable(e.to_string()))?;
        Ok(rows.clone())
    }

    fn append(&self, response: &Response) -> Result<(), StoreError> {
        let mut rows = self
            .rows
            .lock()
            .map_err(|e| StoreError::Unavailable(e.to_string()))?;
        if rows
            .iter()
            .any(|r| r.respondent_id == response.respondent_id)
        {
            return Err(StoreError::DuplicateRespondent(
                response.respondent_id.clone(),
            ));
        }
        debug!("MemoryStore::append: {}", response.respondent_id);
        rows.push(response.clone());
        Ok(())
    }
}
