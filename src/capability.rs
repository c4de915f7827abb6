//! Pluggable worker capabilities

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::task::Task;

/// Specialization tag selecting which capability a worker invokes.
///
/// Chosen from the task's `type` attribute when the worker is created;
/// unknown or absent tags fall back to [`Specialization::General`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Specialization {
    DataAnalysis,
    WebScraping,
    TextProcessing,
    ImageProcessing,
    CodeAnalysis,
    Database,
    Api,
    Testing,
    General,
}

impl Specialization {
    pub const ALL: [Specialization; 9] = [
        Specialization::DataAnalysis,
        Specialization::WebScraping,
        Specialization::TextProcessing,
        Specialization::ImageProcessing,
        Specialization::CodeAnalysis,
        Specialization::Database,
        Specialization::Api,
        Specialization::Testing,
        Specialization::General,
    ];

    /// Parse an open string tag, falling back to `General`.
    pub fn from_tag(tag: Option<&str>) -> Self {
        match tag {
            Some("data_analysis") => Specialization::DataAnalysis,
            Some("web_scraping") => Specialization::WebScraping,
            Some("text_processing") => Specialization::TextProcessing,
            Some("image_processing") => Specialization::ImageProcessing,
            Some("code_analysis") => Specialization::CodeAnalysis,
            Some("database") => Specialization::Database,
            Some("api") => Specialization::Api,
            Some("testing") => Specialization::Testing,
            _ => Specialization::General,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Specialization::DataAnalysis => "data_analysis",
            Specialization::WebScraping => "web_scraping",
            Specialization::TextProcessing => "text_processing",
            Specialization::ImageProcessing => "image_processing",
            Specialization::CodeAnalysis => "code_analysis",
            Specialization::Database => "database",
            Specialization::Api => "api",
            Specialization::Testing => "testing",
            Specialization::General => "general",
        }
    }
}

impl std::fmt::Display for Specialization {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A domain-specific action a worker can perform.
///
/// Supplied by the host application, one per specialization. Errors are
/// wrapped into failed outcomes at the worker; they never abort a fan-out
/// in progress.
#[async_trait]
pub trait Capability: Send + Sync {
    async fn execute(&self, task: &Task) -> anyhow::Result<Value>;
}

/// Built-in capability producing a well-defined placeholder payload for its
/// specialization. Used for every entry the host did not register.
pub struct PlaceholderCapability {
    specialization: Specialization,
}

impl PlaceholderCapability {
    pub fn new(specialization: Specialization) -> Self {
        Self { specialization }
    }
}

#[async_trait]
impl Capability for PlaceholderCapability {
    async fn execute(&self, _task: &Task) -> anyhow::Result<Value> {
        let payload = match self.specialization {
            Specialization::DataAnalysis => json!({"analysis_result": "Data analyzed"}),
            Specialization::WebScraping => json!({"scraping_result": "Data scraped"}),
            Specialization::TextProcessing => json!({"processing_result": "Text processed"}),
            Specialization::ImageProcessing => json!({"processing_result": "Image processed"}),
            Specialization::CodeAnalysis => json!({"analysis_result": "Code analyzed"}),
            Specialization::Database => json!({"database_result": "Operation completed"}),
            Specialization::Api => json!({"api_result": "API call completed"}),
            Specialization::Testing => json!({"test_result": "Tests completed"}),
            Specialization::General => json!({"result": "Task completed"}),
        };
        Ok(payload)
    }
}

/// Registration table mapping specialization to capability.
///
/// Lookup always resolves: specializations without an explicit entry fall
/// back to the mandatory default.
pub struct CapabilityRegistry {
    entries: HashMap<Specialization, Arc<dyn Capability>>,
    default: Arc<dyn Capability>,
}

impl CapabilityRegistry {
    /// Registry with only the given default entry.
    pub fn new(default: Arc<dyn Capability>) -> Self {
        Self {
            entries: HashMap::new(),
            default,
        }
    }

    /// Registry resolving every specialization to its placeholder.
    pub fn with_placeholders() -> Self {
        let mut registry = Self::new(Arc::new(PlaceholderCapability::new(Specialization::General)));
        for specialization in Specialization::ALL {
            registry.register(specialization, Arc::new(PlaceholderCapability::new(specialization)));
        }
        registry
    }

    pub fn register(&mut self, specialization: Specialization, capability: Arc<dyn Capability>) {
        self.entries.insert(specialization, capability);
    }

    /// Resolve the capability for a specialization, falling back to the
    /// default entry.
    pub fn resolve(&self, specialization: Specialization) -> Arc<dyn Capability> {
        self.entries
            .get(&specialization)
            .cloned()
            .unwrap_or_else(|| Arc::clone(&self.default))
    }
}

impl Default for CapabilityRegistry {
    fn default() -> Self {
        Self::with_placeholders()
    }
}
