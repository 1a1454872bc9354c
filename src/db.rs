// src/db.rs
use crate::models::{Contract, User};
use crate::store::{
    CREDENTIALS_KEY, CURRENT_USER_KEY, KeyValueStore, StoreError, USERS_KEY, load_json,
    mining_key, save_json,
};
use std::collections::HashMap;
use uuid::Uuid;

pub fn get_users(store: &dyn KeyValueStore) -> Result<Vec<User>, StoreError> {
    Ok(load_json(store, USERS_KEY)?.unwrap_or_default())
}

pub fn save_users(store: &dyn KeyValueStore, users: &[User]) -> Result<(), StoreError> {
    save_json(store, USERS_KEY, users)
}

/// Match on email or username.
pub fn get_user_by_identifier(
    store: &dyn KeyValueStore,
    identifier: &str,
) -> Result<Option<User>, StoreError> {
    Ok(get_users(store)?
        .into_iter()
        .find(|u| u.email == identifier || u.username == identifier))
}

pub fn get_credentials(store: &dyn KeyValueStore) -> Result<HashMap<Uuid, String>, StoreError> {
    Ok(load_json(store, CREDENTIALS_KEY)?.unwrap_or_default())
}

pub fn save_credentials(
    store: &dyn KeyValueStore,
    credentials: &HashMap<Uuid, String>,
) -> Result<(), StoreError> {
    save_json(store, CREDENTIALS_KEY, credentials)
}

pub fn get_current_user(store: &dyn KeyValueStore) -> Result<Option<User>, StoreError> {
    load_json(store, CURRENT_USER_KEY)
}

pub fn set_current_user(store: &dyn KeyValueStore, user: &User) -> Result<(), StoreError> {
    save_json(store, CURRENT_USER_KEY, user)
}

pub fn clear_current_user(store: &dyn KeyValueStore) -> Result<(), StoreError> {
    store.remove(CURRENT_USER_KEY)
}

pub fn get_contracts(
    store: &dyn KeyValueStore,
    user_id: &Uuid,
) -> Result<Vec<Contract>, StoreError> {
    Ok(load_json(store, &mining_key(user_id))?.unwrap_or_default())
}

pub fn save_contracts(
    store: &dyn KeyValueStore,
    user_id: &Uuid,
    contracts: &[Contract],
) -> Result<(), StoreError> {
    save_json(store, &mining_key(user_id), contracts)
}
