// src/auth.rs
use crate::clock::Clock;
use crate::config::AuthSettings;
use crate::db;
use crate::error::AppError;
use crate::mining::MiningLedger;
use crate::models::{LoginRequest, RegisterRequest, User};
use crate::notify::{NotificationKind, Notifier, report};
use crate::scheduler::AccrualTasks;
use crate::session::Session;
use crate::store::KeyValueStore;
use actix_web::{HttpResponse, get, post, web};
use bcrypt::{hash, verify};
use serde_json::json;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use uuid::Uuid;

/// Registration, sign-in and the session lifecycle.
///
/// Registration reads `users`, checks uniqueness and writes `credentials`,
/// `users` and `currentUser` under `write_lock`. The bcrypt hash is computed
/// before the lock is taken.
pub struct AccountStore {
    store: Arc<dyn KeyValueStore>,
    session: Arc<Session>,
    clock: Arc<dyn Clock>,
    notifier: Arc<dyn Notifier>,
    settings: AuthSettings,
    write_lock: Mutex<()>,
}

impl AccountStore {
    pub fn new(
        store: Arc<dyn KeyValueStore>,
        session: Arc<Session>,
        clock: Arc<dyn Clock>,
        notifier: Arc<dyn Notifier>,
        settings: AuthSettings,
    ) -> Self {
        Self {
            store,
            session,
            clock,
            notifier,
            settings,
            write_lock: Mutex::new(()),
        }
    }

    pub fn session(&self) -> &Arc<Session> {
        &self.session
    }

    pub fn register(&self, req: &RegisterRequest) -> Result<User, AppError> {
        report(
            self.notifier.as_ref(),
            self.try_register(req),
            |_| "Account created successfully!".to_string(),
            "Failed to create account",
        )
    }

    fn try_register(&self, req: &RegisterRequest) -> Result<User, AppError> {
        let username = req.username.trim();
        let email = req.email.trim();
        if username.is_empty() || email.is_empty() || req.password.is_empty() {
            return Err(AppError::Validation(
                "Username, email and password are required".to_string(),
            ));
        }
        if req.password != req.confirm_password {
            return Err(AppError::Validation("Passwords do not match".to_string()));
        }

        let password_hash = hash(&req.password, self.settings.bcrypt_cost)?;

        let _guard = self.lock();
        let store = self.store.as_ref();
        let mut users = db::get_users(store)?;
        if users
            .iter()
            .any(|u| u.email == email || u.username == username)
        {
            return Err(AppError::Conflict(
                "User with this email or username already exists".to_string(),
            ));
        }

        let new_user = User {
            id: Uuid::new_v4(),
            username: username.to_string(),
            email: email.to_string(),
            display_name: Some(username.to_string()),
            created_at: self.clock.now(),
        };

        let previous_credentials = db::get_credentials(store)?;
        let mut credentials = previous_credentials.clone();
        credentials.insert(new_user.id, password_hash);
        db::save_credentials(store, &credentials)?;

        users.push(new_user.clone());
        let committed =
            db::save_users(store, &users).and_then(|()| self.session.begin(&new_user));
        if let Err(e) = committed {
            users.pop();
            self.roll_back(&users, &previous_credentials);
            return Err(e.into());
        }

        tracing::info!("Registered user {} ({})", new_user.username, new_user.id);
        Ok(new_user)
    }

    // Best effort: restores the lists read before a failed registration.
    fn roll_back(&self, users: &[User], credentials: &HashMap<Uuid, String>) {
        let store = self.store.as_ref();
        if let Err(e) = db::save_users(store, users) {
            tracing::error!("Failed to roll back users: {}", e);
        }
        if let Err(e) = db::save_credentials(store, credentials) {
            tracing::error!("Failed to roll back credentials: {}", e);
        }
    }

    fn lock(&self) -> MutexGuard<'_, ()> {
        self.write_lock
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// `identifier` is matched against both email and username.
    pub fn sign_in(&self, identifier: &str, password: &str) -> Result<User, AppError> {
        report(
            self.notifier.as_ref(),
            self.try_sign_in(identifier, password),
            |_| "Signed in successfully!".to_string(),
            "Failed to sign in",
        )
    }

    fn try_sign_in(&self, identifier: &str, password: &str) -> Result<User, AppError> {
        let store = self.store.as_ref();
        let user = db::get_user_by_identifier(store, identifier.trim())?
            .ok_or_else(|| AppError::NotFound("User not found".to_string()))?;

        if self.settings.verify_passwords {
            let credentials = db::get_credentials(store)?;
            let verified = match credentials.get(&user.id) {
                Some(stored) => verify(password, stored).unwrap_or(false),
                None => false,
            };
            if !verified {
                tracing::warn!("Rejected sign-in for {}", user.id);
                return Err(AppError::Unauthorized("Invalid credentials".to_string()));
            }
        }

        self.session.begin(&user)?;
        tracing::info!("Signed in user {}", user.id);
        Ok(user)
    }

    /// Clears the session only. The user record and contracts stay.
    pub fn sign_out(&self) -> Result<Option<User>, AppError> {
        match self.session.end() {
            Ok(Some(user)) => {
                tracing::info!("Signed out user {}", user.id);
                self.notifier
                    .notify("Signed out successfully!", NotificationKind::Success);
                Ok(Some(user))
            }
            Ok(None) => Ok(None),
            Err(e) => report(
                self.notifier.as_ref(),
                Err(e.into()),
                |_| String::new(),
                "Failed to sign out",
            ),
        }
    }

    /// Called once at startup.
    pub fn restore_session(&self) -> Result<Option<User>, AppError> {
        let user = self.session.restore()?;
        if let Some(user) = &user {
            tracing::info!("Restored session for {}", user.id);
        }
        Ok(user)
    }
}

pub fn init_routes(cfg: &mut web::ServiceConfig) {
    cfg.service(register);
    cfg.service(login);
    cfg.service(logout);
    cfg.service(current_session);
}

#[post("/auth/register")]
pub async fn register(
    accounts: web::Data<AccountStore>,
    ledger: web::Data<MiningLedger>,
    tasks: web::Data<AccrualTasks>,
    req: web::Json<RegisterRequest>,
) -> Result<HttpResponse, actix_web::Error> {
    match accounts.register(&req) {
        Ok(user) => {
            tasks.follow(ledger.into_inner(), user.id);
            Ok(HttpResponse::Created().json(json!({
                "message": "User created successfully",
                "user": user,
            })))
        }
        Err(e) => Ok(e.to_response()),
    }
}

#[post("/auth/login")]
pub async fn login(
    accounts: web::Data<AccountStore>,
    ledger: web::Data<MiningLedger>,
    tasks: web::Data<AccrualTasks>,
    req: web::Json<LoginRequest>,
) -> Result<HttpResponse, actix_web::Error> {
    match accounts.sign_in(&req.identifier, &req.password) {
        Ok(user) => {
            tasks.follow(ledger.into_inner(), user.id);
            Ok(HttpResponse::Ok().json(json!({ "user": user })))
        }
        Err(e) => Ok(e.to_response()),
    }
}

#[post("/auth/logout")]
pub async fn logout(
    accounts: web::Data<AccountStore>,
    tasks: web::Data<AccrualTasks>,
) -> Result<HttpResponse, actix_web::Error> {
    match accounts.sign_out() {
        Ok(Some(_)) => {
            tasks.stop();
            Ok(HttpResponse::Ok().json(json!({ "message": "Signed out" })))
        }
        Ok(None) => Ok(HttpResponse::Ok().json(json!({ "message": "No active session" }))),
        Err(e) => Ok(e.to_response()),
    }
}

#[get("/auth/session")]
pub async fn current_session(
    accounts: web::Data<AccountStore>,
) -> Result<HttpResponse, actix_web::Error> {
    Ok(HttpResponse::Ok().json(json!({ "user": accounts.session().current() })))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::SystemClock;
    use crate::notify::QueueNotifier;
    use crate::store::MemoryStore;

    fn accounts(verify_passwords: bool) -> (AccountStore, Arc<QueueNotifier>, Arc<MemoryStore>) {
        let store = Arc::new(MemoryStore::new());
        let notifier = Arc::new(QueueNotifier::new(16));
        let session = Arc::new(Session::new(store.clone()));
        let accounts = AccountStore::new(
            store.clone(),
            session,
            Arc::new(SystemClock),
            notifier.clone(),
            AuthSettings {
                verify_passwords,
                bcrypt_cost: 4,
            },
        );
        (accounts, notifier, store)
    }

    fn request(username: &str, email: &str, password: &str, confirm: &str) -> RegisterRequest {
        RegisterRequest {
            username: username.to_string(),
            email: email.to_string(),
            password: password.to_string(),
            confirm_password: confirm.to_string(),
        }
    }

    #[test]
    fn test_register_sets_display_name_and_session() {
        let (accounts, notifier, _) = accounts(true);
        let user = accounts
            .register(&request("alice", "alice@example.com", "pw", "pw"))
            .unwrap();
        assert_eq!(user.display_name.as_deref(), Some("alice"));
        assert_eq!(accounts.session().current(), Some(user));
        assert_eq!(notifier.drain()[0].message, "Account created successfully!");
    }

    #[test]
    fn test_mismatched_confirmation_is_validation_error() {
        let (accounts, notifier, store) = accounts(true);
        let err = accounts
            .register(&request("alice", "alice@example.com", "pw", "other"))
            .unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
        assert_eq!(notifier.drain()[0].message, "Passwords do not match");
        assert!(db::get_users(store.as_ref()).unwrap().is_empty());
    }

    #[test]
    fn test_blank_fields_are_rejected() {
        let (accounts, _, _) = accounts(true);
        let err = accounts
            .register(&request("  ", "alice@example.com", "pw", "pw"))
            .unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
    }

    #[test]
    fn test_wrong_password_rejected_when_verifying() {
        let (accounts, _, _) = accounts(true);
        accounts
            .register(&request("alice", "alice@example.com", "secret", "secret"))
            .unwrap();
        accounts.sign_out().unwrap();

        let err = accounts.sign_in("alice", "guess").unwrap_err();
        assert!(matches!(err, AppError::Unauthorized(_)));
        assert!(accounts.session().current().is_none());
    }

    #[test]
    fn test_any_password_accepted_without_verification() {
        let (accounts, _, _) = accounts(false);
        accounts
            .register(&request("alice", "alice@example.com", "secret", "secret"))
            .unwrap();
        accounts.sign_out().unwrap();

        let user = accounts.sign_in("alice@example.com", "anything").unwrap();
        assert_eq!(user.username, "alice");
    }

    #[test]
    fn test_sign_out_without_session_is_noop() {
        let (accounts, notifier, _) = accounts(true);
        assert!(accounts.sign_out().unwrap().is_none());
        assert!(notifier.drain().is_empty());
    }
}
