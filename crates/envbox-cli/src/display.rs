use serde::Serialize;
use tabled::Tabled;

/// Display row for `envbox list`.
#[derive(Debug, Serialize, Tabled)]
pub struct EnvironmentRow {
    #[tabled(rename = "ENVIRONMENT")]
    pub name: String,
    #[tabled(rename = "PROJECT PATH")]
    pub project_path: String,
}
