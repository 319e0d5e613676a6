//! Built-in catalog of MCP server tools.
//!
//! Each entry hands the request off to an external MCP server: execution
//! returns a successful result flagged `requires_external_mcp`, carrying the
//! server name, its install package and the caller's params.

use async_trait::async_trait;
use maestro_core::{
    InstallComplexity, ToolCategory, ToolDefinition, ToolError, ToolExecutor, ToolMetadata,
    ToolPriority, ToolResult,
};
use serde_json::json;
use std::sync::Arc;

struct CatalogEntry {
    id: &'static str,
    name: &'static str,
    category: ToolCategory,
    priority: ToolPriority,
    capabilities: &'static [&'static str],
    required_env: &'static [&'static str],
    package: &'static str,
    install: InstallComplexity,
    description: &'static str,
}

const CATALOG: &[CatalogEntry] = &[
    CatalogEntry {
        id: "discord",
        name: "Discord",
        category: ToolCategory::Communication,
        priority: ToolPriority::Critical,
        capabilities: &["messaging", "chat", "notify", "channel_history"],
        required_env: &["DISCORD_BOT_TOKEN"],
        package: "mcp-discord",
        install: InstallComplexity::Low,
        description: "Read and send Discord channel messages",
    },
    CatalogEntry {
        id: "memory",
        name: "Memory",
        category: ToolCategory::Memory,
        priority: ToolPriority::Critical,
        capabilities: &["memory", "knowledge_graph", "remember", "recall"],
        required_env: &[],
        package: "@modelcontextprotocol/server-memory",
        install: InstallComplexity::Low,
        description: "Persistent knowledge-graph memory",
    },
    CatalogEntry {
        id: "brave_search",
        name: "Brave Search",
        category: ToolCategory::Search,
        priority: ToolPriority::High,
        capabilities: &["web_search", "news", "search"],
        required_env: &["BRAVE_API_KEY"],
        package: "@modelcontextprotocol/server-brave-search",
        install: InstallComplexity::Low,
        description: "Web and news search through the Brave API",
    },
    CatalogEntry {
        id: "github",
        name: "GitHub",
        category: ToolCategory::Automation,
        priority: ToolPriority::High,
        capabilities: &["repo", "issues", "pull_requests", "code_search"],
        required_env: &["GITHUB_TOKEN"],
        package: "@modelcontextprotocol/server-github",
        install: InstallComplexity::Low,
        description: "Repository, issue and pull request automation",
    },
    CatalogEntry {
        id: "filesystem",
        name: "Filesystem",
        category: ToolCategory::Content,
        priority: ToolPriority::High,
        capabilities: &["file_read", "file_write", "document"],
        required_env: &[],
        package: "@modelcontextprotocol/server-filesystem",
        install: InstallComplexity::Low,
        description: "Sandboxed local file access",
    },
    CatalogEntry {
        id: "postgres",
        name: "PostgreSQL",
        category: ToolCategory::Database,
        priority: ToolPriority::Medium,
        capabilities: &["sql", "database", "query"],
        required_env: &["POSTGRES_URL"],
        package: "@modelcontextprotocol/server-postgres",
        install: InstallComplexity::Medium,
        description: "Read-only PostgreSQL queries",
    },
    CatalogEntry {
        id: "sqlite",
        name: "SQLite",
        category: ToolCategory::Database,
        priority: ToolPriority::Medium,
        capabilities: &["sql", "database", "local_storage"],
        required_env: &["SQLITE_PATH"],
        package: "mcp-server-sqlite",
        install: InstallComplexity::Low,
        description: "Local SQLite database access",
    },
    CatalogEntry {
        id: "redis",
        name: "Redis",
        category: ToolCategory::Database,
        priority: ToolPriority::Medium,
        capabilities: &["cache", "key_value", "storage"],
        required_env: &["REDIS_URL"],
        package: "mcp-server-redis",
        install: InstallComplexity::Medium,
        description: "Redis cache and key-value store",
    },
    CatalogEntry {
        id: "notion",
        name: "Notion",
        category: ToolCategory::Automation,
        priority: ToolPriority::Medium,
        capabilities: &["notes", "document", "knowledge_base"],
        required_env: &["NOTION_API_KEY"],
        package: "mcp-notion-server",
        install: InstallComplexity::Medium,
        description: "Notion pages and databases",
    },
    CatalogEntry {
        id: "google_calendar",
        name: "Google Calendar",
        category: ToolCategory::Automation,
        priority: ToolPriority::Low,
        capabilities: &["calendar", "schedule", "events"],
        required_env: &["GOOGLE_CREDENTIALS"],
        package: "mcp-google-calendar",
        install: InstallComplexity::High,
        description: "Calendar events and scheduling",
    },
    CatalogEntry {
        id: "slack",
        name: "Slack",
        category: ToolCategory::Communication,
        priority: ToolPriority::Low,
        capabilities: &["messaging", "chat", "notify"],
        required_env: &["SLACK_BOT_TOKEN"],
        package: "@modelcontextprotocol/server-slack",
        install: InstallComplexity::Low,
        description: "Slack workspace messaging",
    },
    CatalogEntry {
        id: "perplexity",
        name: "Perplexity",
        category: ToolCategory::Search,
        priority: ToolPriority::High,
        capabilities: &["research", "web_search", "citations"],
        required_env: &["PERPLEXITY_API_KEY"],
        package: "mcp-perplexity",
        install: InstallComplexity::Low,
        description: "Research answers with citations",
    },
    CatalogEntry {
        id: "openai_tools",
        name: "OpenAI Tools",
        category: ToolCategory::Ai,
        priority: ToolPriority::Medium,
        capabilities: &["image_generation", "vision", "embedding"],
        required_env: &["OPENAI_API_KEY"],
        package: "mcp-openai",
        install: InstallComplexity::Medium,
        description: "Image generation, vision and embeddings",
    },
    CatalogEntry {
        id: "huggingface",
        name: "Hugging Face",
        category: ToolCategory::Ai,
        priority: ToolPriority::Medium,
        capabilities: &["model_inference", "embedding", "multimodal"],
        required_env: &["HF_TOKEN"],
        package: "mcp-huggingface",
        install: InstallComplexity::High,
        description: "Hosted model inference",
    },
];

/// Executor that defers to an external MCP server.
#[derive(Debug, Clone)]
pub struct McpBridge {
    server: String,
    package: String,
}

impl McpBridge {
    pub fn new(server: impl Into<String>, package: impl Into<String>) -> Self {
        Self {
            server: server.into(),
            package: package.into(),
        }
    }
}

#[async_trait]
impl ToolExecutor for McpBridge {
    async fn execute(&self, params: serde_json::Value) -> Result<ToolResult, ToolError> {
        Ok(ToolResult::external_mcp(
            self.server.clone(),
            json!({
                "server": self.server,
                "install": self.package,
                "params": params,
            }),
        ))
    }
}

/// Definitions for every catalogued MCP server.
pub fn mcp_catalog() -> Vec<ToolDefinition> {
    CATALOG
        .iter()
        .map(|e| {
            ToolDefinition::new(
                e.id,
                e.name,
                e.category,
                Arc::new(McpBridge::new(e.id, e.package)),
            )
            .with_priority(e.priority)
            .with_capabilities(e.capabilities.iter().copied())
            .with_required_env(e.required_env.iter().copied())
            .with_metadata(ToolMetadata {
                description: e.description.to_string(),
                version: "1.0.0".to_string(),
                install_complexity: e.install,
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn catalog_entries_are_valid_and_unique() {
        let tools = mcp_catalog();
        assert_eq!(tools.len(), 14);

        let ids: HashSet<&str> = tools.iter().map(|t| t.id.as_str()).collect();
        assert_eq!(ids.len(), tools.len());
        for tool in &tools {
            tool.validate().unwrap();
        }
    }

    #[test]
    fn memory_needs_no_environment() {
        let tools = mcp_catalog();
        let memory = tools.iter().find(|t| t.id == "memory").unwrap();
        assert!(memory.required_env.is_empty());
        assert_eq!(memory.priority, ToolPriority::Critical);

        let brave = tools.iter().find(|t| t.id == "brave_search").unwrap();
        assert_eq!(brave.required_env, vec!["BRAVE_API_KEY".to_string()]);
    }

    #[tokio::test]
    async fn bridge_defers_to_external_server() {
        let bridge = McpBridge::new("github", "@modelcontextprotocol/server-github");
        let result = bridge.execute(json!({"repo": "maestro"})).await.unwrap();

        assert!(result.success);
        assert!(result.requires_external_mcp);
        assert_eq!(result.tool_used, "github");
        let data = result.data.unwrap();
        assert_eq!(data["server"], "github");
        assert_eq!(data["params"]["repo"], "maestro");
    }
}
