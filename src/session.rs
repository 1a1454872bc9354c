// src/session.rs
use crate::db;
use crate::error::AppError;
use crate::models::User;
use crate::store::{KeyValueStore, StoreError};
use std::sync::{Arc, RwLock};

/// The signed-in user, mirrored to the persisted `currentUser` pointer.
///
/// There is exactly one session per process and every HTTP client shares it:
/// a request acts as whoever signed in last, the same way a single browser tab
/// holds one signed-in user. It is not per-client authentication, and nothing
/// here identifies the caller of a request.
pub struct Session {
    store: Arc<dyn KeyValueStore>,
    current: RwLock<Option<User>>,
}

impl Session {
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self {
            store,
            current: RwLock::new(None),
        }
    }

    /// Load the persisted pointer. Reads only; nothing is written back.
    pub fn restore(&self) -> Result<Option<User>, StoreError> {
        let user = db::get_current_user(self.store.as_ref())?;
        self.replace(user.clone());
        Ok(user)
    }

    pub fn current(&self) -> Option<User> {
        match self.current.read() {
            Ok(current) => current.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    pub fn require(&self) -> Result<User, AppError> {
        self.current()
            .ok_or_else(|| AppError::Unauthorized("Not signed in".to_string()))
    }

    pub(crate) fn begin(&self, user: &User) -> Result<(), StoreError> {
        db::set_current_user(self.store.as_ref(), user)?;
        self.replace(Some(user.clone()));
        Ok(())
    }

    pub(crate) fn end(&self) -> Result<Option<User>, StoreError> {
        db::clear_current_user(self.store.as_ref())?;
        Ok(self.replace(None))
    }

    fn replace(&self, user: Option<User>) -> Option<User> {
        let mut current = match self.current.write() {
            Ok(current) => current,
            Err(poisoned) => poisoned.into_inner(),
        };
        std::mem::replace(&mut *current, user)
    }
}
