use serde::{Deserialize, Serialize};

// Extra facts about an upload, carried along for the prompt and for history
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct InputContext {
    pub is_improvement: bool,
    pub file_size: u64,
    pub file_name: String,
}

// What the user asked for: a description, an uploaded SQL file, or both
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GenerationInput {
    pub description: Option<String>,
    pub uploaded_sql: Option<String>,
    #[serde(default)]
    pub context: InputContext,
}

impl GenerationInput {
    pub fn from_description(description: impl Into<String>) -> Self {
        Self {
            description: Some(description.into()),
            ..Default::default()
        }
    }

    pub fn from_sql(sql: impl Into<String>, file_name: Option<String>) -> Self {
        let sql = sql.into();
        Self {
            context: InputContext {
                is_improvement: true,
                file_size: sql.len() as u64,
                file_name: file_name.unwrap_or_default(),
            },
            uploaded_sql: Some(sql),
            description: None,
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Description, if one was given and it is not empty.
    pub fn description_text(&self) -> Option<&str> {
        self.description.as_deref().filter(|d| !d.is_empty())
    }

    /// Uploaded SQL, if one was given and it is not empty.
    pub fn sql_text(&self) -> Option<&str> {
        self.uploaded_sql.as_deref().filter(|s| !s.is_empty())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GenerationMode {
    NewSchema,
    Improvement,
    Analysis,
}

impl GenerationMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            GenerationMode::NewSchema => "new_schema",
            GenerationMode::Improvement => "improvement",
            GenerationMode::Analysis => "analysis",
        }
    }

    /// Whether the request started from uploaded SQL.
    pub fn has_upload(&self) -> bool {
        !matches!(self, GenerationMode::NewSchema)
    }
}

impl std::fmt::Display for GenerationMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// One prompt per request, never modified once built
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PromptConfig {
    pub mode: GenerationMode,
    pub system_instruction: String,
    pub user_instruction: String,
    pub temperature: f32,
    pub max_tokens: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationReport {
    pub is_valid: bool,
    pub errors: Vec<String>,
}

// Text as it came back from a generator, before parsing
#[derive(Debug, Clone, PartialEq)]
pub struct RawResponse {
    pub text: String,
    pub model: String,
    pub tokens_used: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerationResult {
    pub sql: String,
    pub explanation: String,
    pub suggestions: Vec<String>,
    pub estimated_cost: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct GenerationOutcome {
    pub result: GenerationResult,
    pub mode: GenerationMode,
    pub model: String,
    pub duration_ms: u64,
    pub tokens_used: Option<u32>,
    pub prompt_used: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Progress {
    pub step: String,
    pub percent: u8,
    pub message: String,
}

impl Progress {
    pub fn new(step: &str, percent: u8, message: &str) -> Self {
        Self {
            step: step.to_string(),
            percent: percent.min(100),
            message: message.to_string(),
        }
    }
}
