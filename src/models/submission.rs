/// Free text fields of the submission form, as typed by the student.
#[derive(Clone, Debug, Default)]
pub struct SubmissionForm {
    pub student_name: String,
    pub project_title: String,
    pub slug: String,
    pub description: String,
}

/// The HTML entry point attached to a submission.
#[derive(Clone, Debug, Default)]
pub struct ArtifactUpload {
    /// Name of the file as provided by the client
    pub file_name: String,
    /// Declared MIME type, when the client sent one
    pub content_type: Option<String>,
    pub bytes: Vec<u8>,
}

impl ArtifactUpload {
    /// Accepts a `text/html` MIME type (parameters ignored) or a `.html` name.
    pub fn looks_like_html(&self) -> bool {
        let declared_html = self.content_type.as_deref().is_some_and(|ct| {
            ct.split(';')
                .next()
                .map(|essence| essence.trim().eq_ignore_ascii_case("text/html"))
                .unwrap_or(false)
        });

        declared_html || self.file_name.to_lowercase().ends_with(".html")
    }

    /// Final path component of the client supplied name
    pub fn base_name(&self) -> Option<&str> {
        self.file_name
            .rsplit(|c: char| c == '/' || c == '\\')
            .next()
            .map(str::trim)
            .filter(|name| !name.is_empty() && *name != "." && *name != "..")
    }
}
