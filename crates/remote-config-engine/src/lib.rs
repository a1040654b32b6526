//! Core engine for versioned, conditionally-evaluated configuration
//! templates.
//!
//! The crate owns three concerns: resolving which parameter values a client
//! receives (conditions evaluated in declaration order against a client
//! context), publishing new template versions under optimistic concurrency
//! (compare-and-swap on an opaque etag), and serving cursor-paginated
//! version history. Transport, authentication, and wire framing live with
//! the embedding service; this engine defines the canonical shapes and their
//! serde encoding.

pub mod config;
pub mod expr;
pub mod history;
pub mod publish;
pub mod resolver;
pub mod store;
pub mod template;
pub mod validation;

pub use config::EngineLimits;
pub use expr::{evaluate, percent_bucket, ClientContext, ExpressionError, RANDOMIZATION_ID};
pub use history::{
    list_versions, HistoryError, ListVersionsOptions, ListVersionsResponse, VersionIterator,
};
pub use publish::{PublishCoordinator, PublishError, PublishOptions};
pub use resolver::TemplateResolver;
pub use store::{StoredVersion, VersionStore, INITIAL_ETAG};
pub use template::{
    Condition, Parameter, ParameterGroup, ParameterValue, TagColor, Template, TemplateSnapshot,
    UpdateOrigin, UpdateType, User, Version, TEMPLATE_MIME_TYPE,
};
pub use validation::{validate_description, validate_template, ValidationError};
