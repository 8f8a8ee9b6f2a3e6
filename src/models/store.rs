use serde::{Deserialize, Serialize};

use crate::models::project::Project;

/// Current schema version
pub const CURRENT_VERSION: u32 = 1;

/// On-disk shape of the metadata collection
#[derive(Serialize, Deserialize, Debug)]
pub struct Store {
    pub version: u32,
    #[serde(default)]
    pub projects: Vec<Project>,
}

impl Default for Store {
    fn default() -> Self {
        Self {
            version: CURRENT_VERSION,
            projects: vec![],
        }
    }
}

impl Store {
    pub fn find_by_slug(&self, slug: &str) -> Option<&Project> {
        self.projects.iter().find(|p| p.slug() == Some(slug))
    }

    pub fn add_project(&mut self, project: Project) {
        self.projects.push(project);
    }
}
