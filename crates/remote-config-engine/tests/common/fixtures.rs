//! Utilities for constructing templates and engine instances used by the
//! integration scenarios.

use std::sync::Arc;

use remote_config_engine::{
    Condition, EngineLimits, Parameter, ParameterGroup, ParameterValue, PublishCoordinator,
    PublishOptions, Template, TemplateSnapshot, User, VersionStore, INITIAL_ETAG,
};

/// Condition name used by the canonical greeting template.
pub const IOS_CONDITION: &str = "platform_ios";

/// Builds the audit actor stamped on published versions.
pub fn actor() -> User {
    User::from_email("admin@example.com")
}

/// Builder composing candidate templates with configurable conditions,
/// parameters, and groups.
#[derive(Default)]
pub struct TemplateBuilder {
    template: Template,
}

impl TemplateBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a condition; declaration order is the order of these calls.
    pub fn condition(mut self, name: &str, expression: &str) -> Self {
        self.template
            .conditions
            .push(Condition::new(name, expression));
        self
    }

    /// Adds a top-level parameter.
    pub fn parameter(mut self, name: &str, parameter: Parameter) -> Self {
        self.template.parameters.insert(name.to_string(), parameter);
        self
    }

    /// Adds a parameter inside a named group.
    pub fn grouped_parameter(mut self, group: &str, name: &str, parameter: Parameter) -> Self {
        self.template
            .parameter_groups
            .entry(group.to_string())
            .or_insert_with(ParameterGroup::default)
            .parameters
            .insert(name.to_string(), parameter);
        self
    }

    pub fn build(self) -> Template {
        self.template
    }
}

/// The canonical scenario template: an iOS condition declared first and a
/// greeting parameter overriding its default for iOS clients.
pub fn greeting_template() -> Template {
    TemplateBuilder::new()
        .condition(IOS_CONDITION, "device.platform == 'ios'")
        .parameter(
            "greeting",
            Parameter::with_default(ParameterValue::explicit("hello"))
                .with_conditional_value(IOS_CONDITION, ParameterValue::explicit("aloha")),
        )
        .build()
}

/// Creates a fresh engine: a shared store and its publish coordinator.
pub fn engine() -> (Arc<VersionStore>, PublishCoordinator) {
    engine_with_limits(EngineLimits::default())
}

/// Creates a fresh engine with custom limits.
pub fn engine_with_limits(limits: EngineLimits) -> (Arc<VersionStore>, PublishCoordinator) {
    let store = Arc::new(VersionStore::with_limits(limits));
    let coordinator = PublishCoordinator::new(store.clone());
    (store, coordinator)
}

/// Publishes `count` copies of a template, chaining etags, and returns the
/// last snapshot.
pub fn publish_chain(
    coordinator: &PublishCoordinator,
    template: &Template,
    count: usize,
) -> TemplateSnapshot {
    let mut etag = INITIAL_ETAG.to_string();
    let mut last = None;
    for index in 0..count {
        let snapshot = coordinator
            .publish(
                template,
                &etag,
                PublishOptions::new(actor()).with_description(format!("publish #{}", index + 1)),
            )
            .expect("chained publish should succeed");
        etag = snapshot.etag.clone();
        last = Some(snapshot);
    }
    last.expect("at least one publish requested")
}
