use jiff::Timestamp;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Status written on every new submission. Nothing transitions it yet.
pub const STATUS_PENDING: &str = "pending";

pub type ProjectId = Uuid;

/// A published student project as stored in the metadata collection.
///
/// Documents are read leniently: apart from `id`, any field may be missing on
/// records that were not written by the intake service.
#[derive(Serialize, Deserialize, Default, Clone, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Project {
    /// Identifier assigned by the metadata store
    pub id: ProjectId,
    /// Name of the student who submitted the project
    #[serde(default)]
    pub student_name: String,
    /// Title of the project
    #[serde(default)]
    pub project_title: String,
    /// Canonical folder name under the static hosting tree
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub slug: Option<String>,
    /// Free text description
    #[serde(default)]
    pub description: String,
    /// Retrievable URL of the uploaded HTML artifact
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub html_file_url: Option<String>,
    /// Key of the uploaded artifact in the artifact store
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub artifact_key: Option<String>,
    /// When the submission was recorded
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<Timestamp>,
    /// Opaque moderation status
    #[serde(default)]
    pub status: String,
}

impl Project {
    pub fn from_new(id: ProjectId, new_project: NewProject) -> Self {
        Self {
            id,
            student_name: new_project.student_name,
            project_title: new_project.project_title,
            slug: Some(new_project.slug),
            description: new_project.description,
            html_file_url: Some(new_project.html_file_url),
            artifact_key: Some(new_project.artifact_key),
            created_at: Some(new_project.created_at),
            status: new_project.status,
        }
    }

    /// The slug, if present and non-empty
    pub fn slug(&self) -> Option<&str> {
        self.slug.as_deref().filter(|s| !s.is_empty())
    }

    /// The artifact URL, if present and non-empty
    pub fn html_file_url(&self) -> Option<&str> {
        self.html_file_url.as_deref().filter(|u| !u.is_empty())
    }

    /// The artifact store key, if present and non-empty
    pub fn artifact_key(&self) -> Option<&str> {
        self.artifact_key.as_deref().filter(|k| !k.is_empty())
    }
}

/// A project record before the metadata store has assigned it an id.
#[derive(Clone, Debug, PartialEq)]
pub struct NewProject {
    pub student_name: String,
    pub project_title: String,
    pub slug: String,
    pub description: String,
    pub html_file_url: String,
    pub artifact_key: String,
    pub created_at: Timestamp,
    pub status: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_project_serializes_with_camel_case_fields() {
        let project = Project {
            student_name: String::from("Jean Dupont"),
            project_title: String::from("Démo"),
            slug: Some(String::from("demo")),
            html_file_url: Some(String::from("https://cdn.example/demo.html")),
            status: String::from(STATUS_PENDING),
            ..Project::default()
        };

        let value = serde_json::to_value(&project).unwrap();

        assert_eq!(value["studentName"], "Jean Dupont");
        assert_eq!(value["projectTitle"], "Démo");
        assert_eq!(value["htmlFileUrl"], "https://cdn.example/demo.html");
        assert_eq!(value["status"], "pending");
        assert!(value.get("createdAt").is_none());
        assert!(value.get("artifactKey").is_none());
    }

    #[test]
    fn test_project_tolerates_missing_fields() {
        let json = r#"{"id": "6f1c1d3e-9a4b-4c53-8d0e-2f6a3b7c9d10", "projectTitle": "Orphan"}"#;

        let project: Project = serde_json::from_str(json).unwrap();

        assert_eq!(project.project_title, "Orphan");
        assert_eq!(project.slug(), None);
        assert_eq!(project.html_file_url(), None);
        assert_eq!(project.artifact_key(), None);
    }

    #[test]
    fn test_empty_slug_and_url_are_treated_as_missing() {
        let project = Project {
            slug: Some(String::new()),
            html_file_url: Some(String::new()),
            ..Project::default()
        };

        assert_eq!(project.slug(), None);
        assert_eq!(project.html_file_url(), None);
    }
}
