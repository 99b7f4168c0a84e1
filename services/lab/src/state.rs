//! Application state shared across handlers

use crate::{
    account::AccountService, booking::BookingEngine, credentials::CredentialStore,
    permissions::PermissionResolver, repositories::Stores, session::SessionManager,
};

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub stores: Stores,
    pub credentials: CredentialStore,
    pub sessions: SessionManager,
    pub permissions: PermissionResolver,
    pub bookings: BookingEngine,
    pub accounts: AccountService,
    pub cookie_secure: bool,
}

impl AppState {
    /// Wire the core components over a set of stores
    pub fn new(
        stores: Stores,
        credentials: CredentialStore,
        sessions: SessionManager,
        cookie_secure: bool,
    ) -> Self {
        let permissions = PermissionResolver::new(
            stores.permissions.clone(),
            stores.users.clone(),
            stores.equipment.clone(),
        );
        let bookings = BookingEngine::new(stores.bookings.clone(), permissions.clone());
        let accounts =
            AccountService::new(credentials.clone(), sessions.clone(), stores.users.clone());

        Self {
            stores,
            credentials,
            sessions,
            permissions,
            bookings,
            accounts,
            cookie_secure,
        }
    }
}
