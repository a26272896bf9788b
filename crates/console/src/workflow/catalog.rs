//! Static registry of the upgrade stages a workflow can contain.

use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use std::collections::BTreeMap;
use std::fmt;

use super::ValidationError;

/// Typed configuration payload carried by every step.
pub type StepConfig = BTreeMap<String, JsonValue>;

/// Config key accepted on any step; the runner keeps going when a step
/// flagged this way fails.
pub const CONTINUE_ON_FAILURE: &str = "continue_on_failure";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StepType {
    Readiness,
    Distribution,
    Precheck,
    Activation,
    Postcheck,
    Wait,
    Ping,
}

impl StepType {
    pub const ALL: [StepType; 7] = [
        StepType::Readiness,
        StepType::Distribution,
        StepType::Precheck,
        StepType::Activation,
        StepType::Postcheck,
        StepType::Wait,
        StepType::Ping,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            StepType::Readiness => "readiness",
            StepType::Distribution => "distribution",
            StepType::Precheck => "precheck",
            StepType::Activation => "activation",
            StepType::Postcheck => "postcheck",
            StepType::Wait => "wait",
            StepType::Ping => "ping",
        }
    }
}

impl fmt::Display for StepType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

impl std::str::FromStr for StepType {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "readiness" => Ok(StepType::Readiness),
            "distribution" => Ok(StepType::Distribution),
            "precheck" => Ok(StepType::Precheck),
            "activation" => Ok(StepType::Activation),
            "postcheck" => Ok(StepType::Postcheck),
            "wait" => Ok(StepType::Wait),
            "ping" => Ok(StepType::Ping),
            _ => Err(ValidationError::UnknownStepType(s.to_string())),
        }
    }
}

/// Catalog entry for one step type.
#[derive(Debug)]
pub struct StepTypeDef {
    pub step_type: StepType,
    pub display_name: &'static str,
    /// Mandatory non-negative integer fields and their defaults.
    pub integer_fields: &'static [(&'static str, u64)],
}

impl StepTypeDef {
    pub fn default_config(&self) -> StepConfig {
        self.integer_fields
            .iter()
            .map(|(key, value)| (key.to_string(), JsonValue::from(*value)))
            .collect()
    }

    pub fn is_integer_field(&self, key: &str) -> bool {
        self.integer_fields.iter().any(|(field, _)| *field == key)
    }
}

static CATALOG: [StepTypeDef; 7] = [
    StepTypeDef {
        step_type: StepType::Readiness,
        display_name: "Readiness Check",
        integer_fields: &[],
    },
    StepTypeDef {
        step_type: StepType::Distribution,
        display_name: "Software Distribution",
        integer_fields: &[],
    },
    StepTypeDef {
        step_type: StepType::Precheck,
        display_name: "Pre-Checks",
        integer_fields: &[],
    },
    StepTypeDef {
        step_type: StepType::Activation,
        display_name: "Activation",
        integer_fields: &[],
    },
    StepTypeDef {
        step_type: StepType::Postcheck,
        display_name: "Post-Checks",
        integer_fields: &[],
    },
    StepTypeDef {
        step_type: StepType::Wait,
        display_name: "Wait",
        integer_fields: &[("duration", 30)],
    },
    StepTypeDef {
        step_type: StepType::Ping,
        display_name: "Reachability Check",
        integer_fields: &[("retries", 3), ("interval", 10)],
    },
];

pub fn lookup(step_type: StepType) -> &'static StepTypeDef {
    // CATALOG is declared in StepType::ALL order.
    &CATALOG[step_type as usize]
}

pub fn all() -> &'static [StepTypeDef] {
    &CATALOG
}

/// Checks a single config value before it is accepted into a step.
pub fn validate_field(step_type: StepType, key: &str, value: &JsonValue) -> Result<(), ValidationError> {
    if lookup(step_type).is_integer_field(key) {
        if value.as_u64().is_none() {
            return Err(ValidationError::InvalidConfig {
                field: key.to_string(),
                reason: format!("expected a non-negative integer, got {}", value),
            });
        }
    } else if key == CONTINUE_ON_FAILURE && !value.is_boolean() {
        return Err(ValidationError::InvalidConfig {
            field: key.to_string(),
            reason: format!("expected a boolean, got {}", value),
        });
    }
    Ok(())
}

/// Fills in mandatory fields that are missing or hold an invalid value.
pub fn complete_config(step_type: StepType, mut config: StepConfig) -> StepConfig {
    for (key, default) in lookup(step_type).integer_fields {
        let valid = config.get(*key).map_or(false, |v| v.as_u64().is_some());
        if !valid {
            config.insert(key.to_string(), JsonValue::from(*default));
        }
    }
    config
}
