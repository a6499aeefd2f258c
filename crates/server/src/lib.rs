use std::sync::Arc;

use db::DBService;
use tera::Tera;

pub mod error;
pub mod http;
pub mod middleware;
pub mod routes;
mod templates;

/// Shared handler state. Cheap to clone.
#[derive(Clone)]
pub struct AppState {
    db: DBService,
    templates: Arc<Tera>,
}

impl AppState {
    pub fn new(db: DBService) -> Result<Self, tera::Error> {
        Ok(Self {
            db,
            templates: Arc::new(templates::load()?),
        })
    }

    pub fn db(&self) -> &DBService {
        &self.db
    }

    pub fn templates(&self) -> &Tera {
        &self.templates
    }
}
