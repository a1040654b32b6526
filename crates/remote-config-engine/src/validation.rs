//! Candidate template validation.
//!
//! Every check here runs before a publish mutates anything, so a stored
//! template is guaranteed well-formed: condition names are unique and
//! resolvable, every conditional value references a declared condition, and
//! every expression parses. Each rejection names the offending field.

use std::collections::HashSet;

use thiserror::Error;

use crate::config::EngineLimits;
use crate::expr::{self, ExpressionError};
use crate::template::{Parameter, Template};

/// Errors raised while validating a candidate template or publish request.
#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("condition at index {index} has an empty name")]
    EmptyConditionName { index: usize },
    #[error("duplicate condition name '{name}'")]
    DuplicateConditionName { name: String },
    #[error("condition '{name}' has an invalid expression: {source}")]
    InvalidExpression {
        name: String,
        #[source]
        source: ExpressionError,
    },
    #[error("parameter '{parameter}' references unknown condition '{condition}'")]
    UnknownCondition {
        parameter: String,
        condition: String,
    },
    #[error("parameter '{name}' declared more than once (again in {location})")]
    DuplicateParameterName { name: String, location: String },
    #[error("template declares {count} conditions, the limit is {limit}")]
    TooManyConditions { count: usize, limit: usize },
    #[error("template declares {count} parameters, the limit is {limit}")]
    TooManyParameters { count: usize, limit: usize },
    #[error("version description is {length} characters, the limit is {limit}")]
    DescriptionTooLong { length: usize, limit: usize },
}

/// Validates a candidate template against the engine limits.
pub fn validate_template(template: &Template, limits: &EngineLimits) -> Result<(), ValidationError> {
    if template.conditions.len() > limits.max_conditions {
        return Err(ValidationError::TooManyConditions {
            count: template.conditions.len(),
            limit: limits.max_conditions,
        });
    }

    let mut condition_names: HashSet<&str> = HashSet::new();
    for (index, condition) in template.conditions.iter().enumerate() {
        if condition.name.is_empty() {
            return Err(ValidationError::EmptyConditionName { index });
        }
        if !condition_names.insert(condition.name.as_str()) {
            return Err(ValidationError::DuplicateConditionName {
                name: condition.name.clone(),
            });
        }
        expr::parse(&condition.expression).map_err(|source| {
            ValidationError::InvalidExpression {
                name: condition.name.clone(),
                source,
            }
        })?;
    }

    let parameter_count = template.iter_parameters().count();
    if parameter_count > limits.max_parameters {
        return Err(ValidationError::TooManyParameters {
            count: parameter_count,
            limit: limits.max_parameters,
        });
    }

    // Parameter names share one namespace across the top level and every
    // group; the same key in two places would be ambiguous to clients.
    let mut parameter_names: HashSet<&str> = HashSet::new();
    for (name, parameter) in &template.parameters {
        parameter_names.insert(name.as_str());
        check_condition_references(name, parameter, &condition_names)?;
    }
    for (group_name, group) in &template.parameter_groups {
        for (name, parameter) in &group.parameters {
            if !parameter_names.insert(name.as_str()) {
                return Err(ValidationError::DuplicateParameterName {
                    name: name.clone(),
                    location: format!("parameter group '{group_name}'"),
                });
            }
            check_condition_references(name, parameter, &condition_names)?;
        }
    }

    Ok(())
}

/// Validates a caller-supplied version description.
pub fn validate_description(description: &str, limits: &EngineLimits) -> Result<(), ValidationError> {
    let length = description.chars().count();
    if length > limits.max_description_length {
        return Err(ValidationError::DescriptionTooLong {
            length,
            limit: limits.max_description_length,
        });
    }
    Ok(())
}

fn check_condition_references(
    parameter_name: &str,
    parameter: &Parameter,
    condition_names: &HashSet<&str>,
) -> Result<(), ValidationError> {
    for condition in parameter.conditional_values.keys() {
        if !condition_names.contains(condition.as_str()) {
            return Err(ValidationError::UnknownCondition {
                parameter: parameter_name.to_string(),
                condition: condition.clone(),
            });
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::template::{Condition, ParameterGroup, ParameterValue};

    fn limits() -> EngineLimits {
        EngineLimits::default()
    }

    fn template_with_condition(expression: &str) -> Template {
        Template {
            conditions: vec![Condition::new("cond", expression)],
            ..Template::default()
        }
    }

    #[test]
    fn accepts_well_formed_template() {
        let template = Template {
            conditions: vec![Condition::new("is_ios", "device.platform == 'ios'")],
            parameters: [(
                "greeting".to_string(),
                Parameter::with_default(ParameterValue::explicit("hello"))
                    .with_conditional_value("is_ios", ParameterValue::explicit("aloha")),
            )]
            .into_iter()
            .collect(),
            ..Template::default()
        };
        assert!(validate_template(&template, &limits()).is_ok());
    }

    #[test]
    fn rejects_empty_condition_name() {
        let template = Template {
            conditions: vec![Condition::new("", "true")],
            ..Template::default()
        };
        assert!(matches!(
            validate_template(&template, &limits()),
            Err(ValidationError::EmptyConditionName { index: 0 })
        ));
    }

    #[test]
    fn rejects_duplicate_condition_names() {
        let template = Template {
            conditions: vec![Condition::new("dup", "true"), Condition::new("dup", "false")],
            ..Template::default()
        };
        assert!(matches!(
            validate_template(&template, &limits()),
            Err(ValidationError::DuplicateConditionName { name }) if name == "dup"
        ));
    }

    /// Expressions are parsed during validation, never during resolution.
    #[test]
    fn rejects_unparsable_expression() {
        let template = template_with_condition("device.platform ==");
        assert!(matches!(
            validate_template(&template, &limits()),
            Err(ValidationError::InvalidExpression { name, .. }) if name == "cond"
        ));
    }

    #[test]
    fn rejects_unknown_condition_reference() {
        let template = Template {
            conditions: vec![Condition::new("declared", "true")],
            parameters: [(
                "p".to_string(),
                Parameter::default().with_conditional_value("ghost", ParameterValue::explicit("x")),
            )]
            .into_iter()
            .collect(),
            ..Template::default()
        };
        assert!(matches!(
            validate_template(&template, &limits()),
            Err(ValidationError::UnknownCondition { parameter, condition })
                if parameter == "p" && condition == "ghost"
        ));
    }

    /// Grouped parameters validate their references too, and may not shadow a
    /// top-level parameter.
    #[test]
    fn rejects_duplicate_parameter_across_group() {
        let mut group = ParameterGroup::default();
        group.parameters.insert(
            "greeting".to_string(),
            Parameter::with_default(ParameterValue::explicit("bye")),
        );
        let template = Template {
            parameters: [(
                "greeting".to_string(),
                Parameter::with_default(ParameterValue::explicit("hi")),
            )]
            .into_iter()
            .collect(),
            parameter_groups: [("tone".to_string(), group)].into_iter().collect(),
            ..Template::default()
        };
        assert!(matches!(
            validate_template(&template, &limits()),
            Err(ValidationError::DuplicateParameterName { name, .. }) if name == "greeting"
        ));
    }

    #[test]
    fn rejects_too_many_conditions() {
        let conditions = (0..5)
            .map(|i| Condition::new(format!("c{i}"), "true"))
            .collect();
        let template = Template {
            conditions,
            ..Template::default()
        };
        let limits = EngineLimits {
            max_conditions: 4,
            ..EngineLimits::default()
        };
        assert!(matches!(
            validate_template(&template, &limits),
            Err(ValidationError::TooManyConditions { count: 5, limit: 4 })
        ));
    }

    #[test]
    fn rejects_long_description() {
        let limits = EngineLimits {
            max_description_length: 8,
            ..EngineLimits::default()
        };
        assert!(validate_description("short", &limits).is_ok());
        assert!(matches!(
            validate_description("far too long for this", &limits),
            Err(ValidationError::DescriptionTooLong { limit: 8, .. })
        ));
    }
}
