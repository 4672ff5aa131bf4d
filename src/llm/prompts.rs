use crate::llm::models::{GenerationInput, GenerationMode, PromptConfig, ValidationReport};
use tracing::debug;

const MIN_DESCRIPTION_CHARS: usize = 10;
const MAX_DESCRIPTION_CHARS: usize = 2000;
const MIN_SQL_CHARS: usize = 20;
const MAX_SQL_CHARS: usize = 50_000;

/// Instruction shared by every mode. It pins down the response layout the parser relies on:
/// SQL code block, then explanation, then suggestions, then cost estimate.
pub const SYSTEM_INSTRUCTION: &str = r#"You are an expert database architect and SQL specialist. Your role is to generate optimized, production-ready database schemas based on user requirements.

Core Responsibilities:
- Generate clean, normalized database schemas (typically 3NF unless specified otherwise)
- Create proper relationships with foreign keys and constraints
- Add appropriate indexes for performance optimization
- Include data types that match the requirements
- Provide cost-effective solutions
- Follow database best practices and naming conventions

Output Requirements:
- Always respond with valid SQL DDL statements
- Include CREATE TABLE statements with proper constraints
- Add indexes where beneficial for performance
- Use consistent naming conventions (snake_case for tables/columns)
- Include comments explaining complex relationships
- Provide a brief explanation of design decisions

Schema Optimization:
- Automatically determine the best normalization level based on use case
- Add indexes on foreign keys and frequently queried columns
- Use appropriate data types to minimize storage costs
- Consider query patterns when designing relationships
- Include created_at/updated_at timestamps where relevant

Cost Considerations:
- Optimize for storage efficiency
- Consider read vs write patterns
- Minimize redundant data
- Use appropriate column sizes

RESPONSE FORMAT EXAMPLE:

When generating a new schema, structure your response like this:

```sql
-- Blog System Database Schema

-- Users table for authentication and profiles
CREATE TABLE users (
    id SERIAL PRIMARY KEY,
    email VARCHAR(255) UNIQUE NOT NULL,
    username VARCHAR(100) UNIQUE NOT NULL,
    password_hash VARCHAR(255) NOT NULL,
    bio TEXT,
    created_at TIMESTAMP DEFAULT CURRENT_TIMESTAMP,
    updated_at TIMESTAMP DEFAULT CURRENT_TIMESTAMP
);

-- Posts table for blog content
CREATE TABLE posts (
    id SERIAL PRIMARY KEY,
    user_id INTEGER NOT NULL REFERENCES users(id) ON DELETE CASCADE,
    title VARCHAR(500) NOT NULL,
    slug VARCHAR(500) UNIQUE NOT NULL,
    content TEXT NOT NULL,
    status VARCHAR(20) DEFAULT 'draft' CHECK (status IN ('draft', 'published', 'archived')),
    published_at TIMESTAMP,
    created_at TIMESTAMP DEFAULT CURRENT_TIMESTAMP,
    updated_at TIMESTAMP DEFAULT CURRENT_TIMESTAMP
);

-- Performance indexes
CREATE INDEX idx_users_email ON users(email);
CREATE INDEX idx_posts_user_id ON posts(user_id);
CREATE INDEX idx_posts_status_published ON posts(status, published_at) WHERE status = 'published';
```

## Design Explanation

**Schema Overview:**
This blog schema follows 3NF normalization principles while optimizing for read-heavy workloads typical of blog platforms.

**Key Design Decisions:**
1. **User Management**: Separate authentication fields from profile data for security
2. **Content Structure**: Posts include slug for SEO-friendly URLs and status for workflow management
3. **Audit Trail**: All tables include created_at/updated_at for change tracking

**Suggestions:**
- Consider adding full-text search indexes for post content if search functionality is needed
- Implement soft deletes for posts if content recovery is important
- Consider partitioning if expecting high volume (>1M posts)

**Estimated Cost:**
~$8-20/month for small to medium blog (assuming cloud PostgreSQL hosting)

Always follow this structure: SQL code block, then explanations, then suggestions, then cost estimate."#;

/// Sample descriptions offered to users who don't know where to start.
pub const EXAMPLE_PROMPTS: &[(&str, &str)] = &[
    (
        "blog",
        "I need a modern blog platform with users, posts, and comments. Requirements: Users can write multiple posts with rich content (title, body, excerpt). Each post can have many threaded comments. Include post categories and tagging system. Users should have profiles with bio and avatar. Support for draft/published post statuses. Need SEO-friendly URLs. Optimize for read-heavy workloads with fast page loads.",
    ),
    (
        "ecommerce",
        "Create an e-commerce platform database with comprehensive product management. Requirements: Products with variants (size, color), categories and subcategories, inventory tracking with low-stock alerts. Customer accounts with multiple shipping addresses. Shopping cart and wishlist functionality. Order management with status tracking (pending, shipped, delivered). Payment processing with transaction history. Product reviews and ratings. Coupon/discount system. Optimize for high transaction volume.",
    ),
    (
        "social",
        "Design a social media platform similar to Twitter/Instagram. Requirements: User profiles with followers/following relationships. Posts with text, images, and videos. Like, comment, and share functionality. Real-time messaging between users. Notification system for user interactions. Content feed algorithm support. Hashtag and mention functionality. User privacy settings. Content moderation capabilities. Optimize for real-time updates and high engagement.",
    ),
    (
        "saas",
        "Build a multi-tenant SaaS application database for project management. Requirements: Organizations with multiple users and role-based permissions (admin, member, viewer). Projects with tasks, milestones, and deadlines. Time tracking and reporting. File attachments and comments. Subscription management with different plans and billing cycles. Usage analytics and feature tracking. API access logs. Data isolation between organizations. Support for scaling to thousands of organizations.",
    ),
    (
        "analytics",
        "Create a data warehouse for web analytics and business intelligence. Requirements: Event tracking for user actions (page views, clicks, conversions). User sessions with device and location data. Custom event properties and dimensions. Real-time and batch data ingestion. Fast aggregation queries for dashboards. User cohort analysis. Funnel and retention reports. A/B testing experiment tracking. Data retention policies. Optimize for analytical queries and large data volumes.",
    ),
    (
        "task_management",
        "Design a team task management system like Asana or Trello. Requirements: Teams with multiple projects and boards. Tasks with priorities, due dates, and assignees. Task dependencies and subtasks. File attachments and comments. Time tracking and progress reporting. Custom fields and labels. Activity feeds and notifications. Workload balancing and capacity planning. Integration capabilities with external tools.",
    ),
    (
        "marketplace",
        "Create a marketplace platform like Etsy or eBay. Requirements: Seller accounts with shop management. Product listings with multiple images and variants. Buyer accounts with purchase history. Order fulfillment and shipping tracking. Rating and review system for both buyers and sellers. Search and filtering capabilities. Payment processing with escrow. Dispute resolution system. Commission tracking. Fraud detection support.",
    ),
];

/// Picks the prompt mode from the shape of the input.
pub fn select_mode(input: &GenerationInput) -> GenerationMode {
    match (input.sql_text(), input.description_text()) {
        (Some(_), Some(_)) => GenerationMode::Improvement,
        (Some(_), None) => GenerationMode::Analysis,
        _ => GenerationMode::NewSchema,
    }
}

/// Builds the prompt for a request. Same input, same prompt.
pub fn build_prompt(input: &GenerationInput) -> PromptConfig {
    let mode = select_mode(input);
    let description = input.description_text().unwrap_or_default();
    let sql = input.sql_text().unwrap_or_default();

    let (user_instruction, temperature, max_tokens) = match mode {
        GenerationMode::NewSchema => (new_schema_instruction(description), 0.3, 2500),
        GenerationMode::Improvement => (improvement_instruction(sql, description), 0.2, 3000),
        GenerationMode::Analysis => (analysis_instruction(sql), 0.3, 3500),
    };

    debug!(mode = %mode, chars = user_instruction.len(), "Built generation prompt");

    PromptConfig {
        mode,
        system_instruction: SYSTEM_INSTRUCTION.to_string(),
        user_instruction,
        temperature,
        max_tokens,
    }
}

fn new_schema_instruction(description: &str) -> String {
    format!(
        r###"Create a database schema based on this description:

"{}"

Requirements:
1. Generate complete SQL DDL statements with proper constraints
2. Add strategic indexes for performance optimization
3. Follow 3NF normalization unless use case requires otherwise
4. Include audit timestamps (created_at, updated_at)
5. Use appropriate data types and sizes
6. Add meaningful comments for complex relationships

Please structure your response exactly like the example format in your system prompt:
- Start with SQL code block containing all CREATE TABLE and CREATE INDEX statements
- Follow with "## Design Explanation" section explaining your decisions
- Include "**Suggestions:**" section with actionable recommendations
- End with "**Estimated Cost:**" for cloud hosting

Focus on creating a production-ready schema that balances performance, maintainability, and cost efficiency."###,
        description
    )
}

fn improvement_instruction(sql: &str, description: &str) -> String {
    format!(
        r#"Analyze and improve this existing SQL schema:

```sql
{}
```

Improvement requirements:
"{}"

Please analyze the existing schema and provide improvements. Structure your response as follows:

```sql
-- IMPROVED SCHEMA
-- [Add comments highlighting your changes]

[Your improved SQL DDL here]
```

## Analysis & Improvements

**Issues Found in Original Schema:**
- List specific problems you identified
- Explain why each issue impacts performance or maintainability

**Key Improvements Made:**
1. **Performance**: Detail indexes and optimizations added
2. **Data Integrity**: Describe constraint and relationship improvements
3. **Normalization**: Explain any structural changes
4. **Best Practices**: Note adherence to conventions

**Suggestions:**
- Additional recommendations for further optimization
- Considerations for scaling and maintenance

**Estimated Cost Impact:**
Compare original vs improved schema costs

Focus on maintaining data integrity while significantly improving performance and maintainability."#,
        sql, description
    )
}

fn analysis_instruction(sql: &str) -> String {
    format!(
        r#"Analyze this database schema and provide comprehensive improvement recommendations:

```sql
{}
```

Please provide a thorough analysis structured as follows:

## Schema Analysis

**Current Schema Overview:**
- Describe what this schema appears to be designed for
- Identify the main entities and relationships
- Note the current normalization level

**Issues & Opportunities:**
- Performance bottlenecks (missing indexes, inefficient queries)
- Data integrity concerns (missing constraints, weak relationships)
- Normalization problems (redundancy, update anomalies)
- Naming convention inconsistencies

```sql
-- OPTIMIZED SCHEMA
-- Comments explaining each improvement

[Provide the improved SQL DDL with all your enhancements]
```

## Improvements Made

**Performance Enhancements:**
1. **Indexes Added**: List each index and why it improves query performance
2. **Data Type Optimizations**: Explain any column type improvements

**Data Integrity Improvements:**
1. **Constraints Added**: Detail foreign keys, checks, and unique constraints
2. **Relationship Fixes**: Explain proper relationship implementations

**Suggestions for Further Enhancement:**
- Scaling considerations
- Monitoring recommendations
- Maintenance best practices

**Cost Analysis:**
Estimate hosting costs and performance impact of improvements."#,
        sql
    )
}

/// Checks an input before anything is sent to a model. Every broken rule is reported.
pub fn validate_input(input: &GenerationInput) -> ValidationReport {
    let mut errors = Vec::new();

    if input.description_text().is_none() && input.sql_text().is_none() {
        errors.push("Please provide either a description or upload an SQL file".to_string());
    }

    // A supplied field is held to its length rules even when it is empty.
    if let Some(description) = &input.description {
        let chars = description.chars().count();
        if chars < MIN_DESCRIPTION_CHARS {
            errors.push("Description is too short. Please provide more details".to_string());
        }
        if chars > MAX_DESCRIPTION_CHARS {
            errors.push(format!(
                "Description is too long. Please keep it under {} characters",
                MAX_DESCRIPTION_CHARS
            ));
        }
    }

    if let Some(sql) = &input.uploaded_sql {
        let chars = sql.chars().count();
        if chars < MIN_SQL_CHARS {
            errors.push("SQL file seems too short to be a valid schema".to_string());
        }
        if chars > MAX_SQL_CHARS {
            errors.push("SQL file is too large. Please use files under 50KB".to_string());
        }
    }

    ValidationReport {
        is_valid: errors.is_empty(),
        errors,
    }
}

pub fn example_prompt(name: &str) -> Option<&'static str> {
    EXAMPLE_PROMPTS
        .iter()
        .find(|(key, _)| *key == name)
        .map(|(_, prompt)| *prompt)
}

#[cfg(test)]
mod tests {
    use super::*;

    const SQL: &str = "CREATE TABLE users (id INTEGER PRIMARY KEY, email TEXT);";

    fn input(description: Option<&str>, sql: Option<&str>) -> GenerationInput {
        GenerationInput {
            description: description.map(str::to_string),
            uploaded_sql: sql.map(str::to_string),
            ..Default::default()
        }
    }

    #[test]
    fn test_mode_new_schema_from_description() {
        let prompt = build_prompt(&input(Some("A library with books and loans"), None));
        assert_eq!(prompt.mode, GenerationMode::NewSchema);
        assert_eq!(prompt.temperature, 0.3);
        assert_eq!(prompt.max_tokens, 2500);
        assert!(prompt.user_instruction.contains("\"A library with books and loans\""));
    }

    #[test]
    fn test_mode_improvement_with_both() {
        let prompt = build_prompt(&input(Some("Add indexes for email lookups"), Some(SQL)));
        assert_eq!(prompt.mode, GenerationMode::Improvement);
        assert_eq!(prompt.temperature, 0.2);
        assert_eq!(prompt.max_tokens, 3000);
        assert!(prompt.user_instruction.contains(SQL));
        assert!(prompt.user_instruction.contains("Add indexes for email lookups"));
    }

    #[test]
    fn test_mode_analysis_with_sql_only() {
        let prompt = build_prompt(&input(None, Some(SQL)));
        assert_eq!(prompt.mode, GenerationMode::Analysis);
        assert_eq!(prompt.max_tokens, 3500);
        assert!(prompt.user_instruction.starts_with("Analyze this database schema"));
    }

    #[test]
    fn test_empty_description_counts_as_absent_for_mode() {
        let prompt = build_prompt(&input(Some(""), Some(SQL)));
        assert_eq!(prompt.mode, GenerationMode::Analysis);
    }

    #[test]
    fn test_system_instruction_is_shared() {
        let a = build_prompt(&input(Some("A library with books and loans"), None));
        let b = build_prompt(&input(None, Some(SQL)));
        assert_eq!(a.system_instruction, b.system_instruction);
        assert_eq!(a.system_instruction, SYSTEM_INSTRUCTION);
    }

    #[test]
    fn test_build_is_idempotent() {
        let request = input(Some("Inventory tracking for a warehouse"), Some(SQL));
        let first = build_prompt(&request);
        let second = build_prompt(&request);
        assert_eq!(first, second);
        assert_eq!(
            serde_json::to_string(&first).unwrap(),
            serde_json::to_string(&second).unwrap()
        );
    }

    #[test]
    fn test_validate_nothing_provided() {
        let report = validate_input(&input(Some(""), Some("")));
        assert!(!report.is_valid);
        assert!(report.errors.iter().any(|e| e.contains("provide")));
    }

    #[test]
    fn test_validate_short_description() {
        let report = validate_input(&input(Some("short"), None));
        assert!(!report.is_valid);
        assert!(report.errors.iter().any(|e| e.contains("too short")));
    }

    #[test]
    fn test_validate_long_description() {
        let report = validate_input(&input(Some(&"x".repeat(2001)), None));
        assert!(!report.is_valid);
        assert!(report.errors.iter().any(|e| e.contains("too long")));
    }

    #[test]
    fn test_validate_accumulates_errors() {
        let report = validate_input(&input(Some(""), Some("SELECT 1;!")));
        assert!(!report.is_valid);
        assert!(report.errors.len() >= 2, "errors: {:?}", report.errors);
    }

    #[test]
    fn test_validate_sql_bounds() {
        let report = validate_input(&input(None, Some(&"-".repeat(50_001))));
        assert!(report.errors.iter().any(|e| e.contains("too large")));

        let report = validate_input(&input(None, Some(SQL)));
        assert!(report.is_valid);
    }

    #[test]
    fn test_validate_counts_characters_not_bytes() {
        // 10 multi-byte characters
        let report = validate_input(&input(Some("éééééééééé"), None));
        assert!(report.is_valid);
    }

    #[test]
    fn test_example_prompt_lookup() {
        assert!(example_prompt("blog").unwrap().contains("blog platform"));
        assert!(example_prompt("unknown").is_none());
    }
}
