use db::DBService;
use services::services::{auth::AuthService, jobs::JobTracker};

pub mod error;
pub mod http;
pub mod middleware;
pub mod routes;

#[cfg(test)]
pub mod test_support;

#[derive(Clone)]
pub struct AppState {
    db: DBService,
    jobs: JobTracker,
    auth: AuthService,
}

impl AppState {
    pub fn new(db: DBService) -> Self {
        Self {
            db,
            jobs: JobTracker::new(),
            auth: AuthService::new(),
        }
    }

    pub fn db(&self) -> &DBService {
        &self.db
    }

    pub fn jobs(&self) -> &JobTracker {
        &self.jobs
    }

    pub fn auth(&self) -> &AuthService {
        &self.auth
    }
}
