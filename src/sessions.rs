use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

use crate::error::{Error, Result};
use crate::gfs::Gfs;
use crate::store::GitStore;
use crate::types::GfsOptions;

/// Registry of open sessions, keyed by session id.
///
/// Owned by whoever serves the sessions (a protocol front-end, a test);
/// there is no global instance.
#[derive(Debug, Default)]
pub struct Sessions {
    open: Mutex<HashMap<String, Gfs>>,
}

impl Sessions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Open a session on `store` and register it under its id.
    pub fn open(&self, store: &GitStore, options: GfsOptions) -> Result<Gfs> {
        let gfs = store.gfs(options)?;
        self.lock()?
            .insert(gfs.session_id().to_string(), gfs.clone());
        Ok(gfs)
    }

    pub fn get(&self, id: &str) -> Result<Option<Gfs>> {
        Ok(self.lock()?.get(id).cloned())
    }

    /// Unregister and close a session. Handles still held elsewhere fail
    /// with [`Error::Closed`] from then on.
    pub fn close(&self, id: &str) -> Result<bool> {
        let removed = self.lock()?.remove(id);
        match removed {
            Some(gfs) => {
                gfs.close()?;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    pub fn ids(&self) -> Result<Vec<String>> {
        let mut ids: Vec<String> = self.lock()?.keys().cloned().collect();
        ids.sort();
        Ok(ids)
    }

    pub fn len(&self) -> Result<usize> {
        Ok(self.lock()?.len())
    }

    pub fn is_empty(&self) -> Result<bool> {
        Ok(self.lock()?.is_empty())
    }

    fn lock(&self) -> Result<MutexGuard<'_, HashMap<String, Gfs>>> {
        self.open.lock().map_err(|e| Error::git_msg(e.to_string()))
    }
}
