use crate::llm::models::GenerationMode;
use serde::{Deserialize, Serialize};

const KNOWN_TAGS: &[&str] = &[
    "blog", "ecommerce", "social", "saas", "analytics", "users", "posts", "orders", "products",
    "auth",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InputType {
    Prompt,
    SqlUpload,
    Mixed,
}

impl InputType {
    pub fn as_str(&self) -> &'static str {
        match self {
            InputType::Prompt => "prompt",
            InputType::SqlUpload => "sql_upload",
            InputType::Mixed => "mixed",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "prompt" => Some(InputType::Prompt),
            "sql_upload" => Some(InputType::SqlUpload),
            "mixed" => Some(InputType::Mixed),
            _ => None,
        }
    }
}

impl From<GenerationMode> for InputType {
    fn from(mode: GenerationMode) -> Self {
        match mode {
            GenerationMode::NewSchema => InputType::Prompt,
            GenerationMode::Analysis => InputType::SqlUpload,
            GenerationMode::Improvement => InputType::Mixed,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SchemaProject {
    pub id: String,
    pub owner_id: String,
    pub name: String,
    pub description: Option<String>,
    pub input_type: InputType,
    pub original_prompt: Option<String>,
    pub uploaded_sql: Option<String>,
    pub generated_sql: String,
    pub ai_explanation: Option<String>,
    pub ai_suggestions: Vec<String>,
    pub tags: Vec<String>,
    pub is_favorite: bool,
    pub created_at: String,
    pub updated_at: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewSchemaProject {
    pub owner_id: String,
    pub name: String,
    pub description: Option<String>,
    pub input_type: InputType,
    pub original_prompt: Option<String>,
    pub uploaded_sql: Option<String>,
    pub generated_sql: String,
    pub ai_explanation: Option<String>,
    #[serde(default)]
    pub ai_suggestions: Vec<String>,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub is_favorite: bool,
}

// Fields left as None keep their stored value
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ProjectUpdate {
    pub name: Option<String>,
    pub description: Option<String>,
    pub generated_sql: Option<String>,
    pub ai_explanation: Option<String>,
    pub ai_suggestions: Option<Vec<String>>,
    pub tags: Option<Vec<String>>,
    pub is_favorite: Option<bool>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerationHistory {
    pub id: String,
    pub project_id: String,
    pub prompt_used: String,
    pub sql_generated: String,
    pub ai_model: String,
    pub generation_time_ms: i64,
    pub tokens_used: Option<i64>,
    pub created_at: String,
}

#[derive(Debug, Clone)]
pub struct NewGenerationHistory {
    pub project_id: String,
    pub prompt_used: String,
    pub sql_generated: String,
    pub ai_model: String,
    pub generation_time_ms: i64,
    pub tokens_used: Option<i64>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ProjectWithHistory {
    #[serde(flatten)]
    pub project: SchemaProject,
    pub generation_history: Vec<GenerationHistory>,
}

/// Names a project after the first words of its prompt, or its uploaded file.
pub fn generate_project_name(prompt: Option<&str>, uploaded_file_name: Option<&str>) -> String {
    if let Some(prompt) = prompt.filter(|p| !p.is_empty()) {
        let words = prompt.split(' ').take(4).collect::<Vec<_>>().join(" ");
        return if words.chars().count() > 30 {
            format!("{}...", words.chars().take(30).collect::<String>())
        } else {
            words
        };
    }

    if let Some(file_name) = uploaded_file_name.filter(|f| !f.is_empty()) {
        return format!("Schema from {}", file_name);
    }

    format!("Untitled Schema {}", chrono::Local::now().format("%Y-%m-%d"))
}

pub fn extract_tags_from_prompt(prompt: &str) -> Vec<String> {
    let lower = prompt.to_lowercase();
    KNOWN_TAGS
        .iter()
        .filter(|tag| lower.contains(*tag))
        .map(|tag| tag.to_string())
        .collect()
}

/// One-line summary for project listings.
pub fn format_project_preview(project: &SchemaProject) -> String {
    if let Some(prompt) = project.original_prompt.as_deref().filter(|p| !p.is_empty()) {
        return if prompt.chars().count() > 100 {
            format!("{}...", prompt.chars().take(100).collect::<String>())
        } else {
            prompt.to_string()
        };
    }

    if project.uploaded_sql.as_deref().is_some_and(|s| !s.is_empty()) {
        return "SQL file uploaded".to_string();
    }

    "No description available".to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn project(prompt: Option<&str>, sql: Option<&str>) -> SchemaProject {
        SchemaProject {
            id: "p1".into(),
            owner_id: "u1".into(),
            name: "test".into(),
            description: None,
            input_type: InputType::Prompt,
            original_prompt: prompt.map(str::to_string),
            uploaded_sql: sql.map(str::to_string),
            generated_sql: "SELECT 1;".into(),
            ai_explanation: None,
            ai_suggestions: vec![],
            tags: vec![],
            is_favorite: false,
            created_at: String::new(),
            updated_at: String::new(),
        }
    }

    #[test]
    fn test_project_name_from_prompt() {
        assert_eq!(
            generate_project_name(Some("Blog with users and posts and comments"), None),
            "Blog with users and"
        );
        assert_eq!(
            generate_project_name(Some("Internationalization localization configuration management"), None),
            "Internationalization localizat..."
        );
    }

    #[test]
    fn test_project_name_fallbacks() {
        assert_eq!(
            generate_project_name(None, Some("legacy.sql")),
            "Schema from legacy.sql"
        );
        assert!(generate_project_name(Some(""), None).starts_with("Untitled Schema "));
    }

    #[test]
    fn test_extract_tags() {
        let tags = extract_tags_from_prompt("An Ecommerce shop with Products, orders and auth");
        assert_eq!(tags, vec!["ecommerce", "orders", "products", "auth"]);
        assert!(extract_tags_from_prompt("inventory of spare parts").is_empty());
    }

    #[test]
    fn test_preview() {
        assert_eq!(format_project_preview(&project(Some("short prompt"), None)), "short prompt");
        let long = "x".repeat(150);
        assert_eq!(format_project_preview(&project(Some(&long), None)).len(), 103);
        assert_eq!(
            format_project_preview(&project(None, Some("CREATE TABLE t (id INT);"))),
            "SQL file uploaded"
        );
        assert_eq!(format_project_preview(&project(None, None)), "No description available");
    }

    #[test]
    fn test_input_type_from_mode() {
        assert_eq!(InputType::from(GenerationMode::Improvement), InputType::Mixed);
        assert_eq!(InputType::parse(InputType::SqlUpload.as_str()), Some(InputType::SqlUpload));
    }
}
