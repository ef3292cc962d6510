mod builtin;
pub mod loader;
pub mod schema;

pub use loader::{builtin, load_from_path, load_from_str, resolve, ConfigError, DEFAULT_CONFIG_PATH};
pub use schema::{
    AuditSettings, CompileComponent, ComponentDescriptor, EntryPoint, Paths, PipelineConfig,
    PrebuiltComponent, RegressionSettings, Tools, ValidationError, ValidationIssue,
};
