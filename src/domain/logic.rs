//! Conditional logic attached to notifications and documents.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use super::entities::EntryRecord;
use super::types::{LogicAction, LogicType};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum LogicError {
    #[error("conditional logic has no rules")]
    NoRules,
    #[error("unknown conditional logic operator `{0}`")]
    UnknownOperator(String),
    #[error("rule on field `{field_id}` compares non-numeric value `{value}`")]
    NotNumeric { field_id: String, value: String },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConditionalLogic {
    #[serde(default)]
    pub action_type: LogicAction,
    #[serde(default)]
    pub logic_type: LogicType,
    #[serde(default)]
    pub rules: Vec<LogicRule>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogicRule {
    pub field_id: String,
    pub operator: String,
    #[serde(default)]
    pub value: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Operator {
    Is,
    IsNot,
    GreaterThan,
    LessThan,
    Contains,
    StartsWith,
    EndsWith,
}

impl Operator {
    fn parse(raw: &str) -> Result<Self, LogicError> {
        match raw.trim() {
            "is" => Ok(Self::Is),
            "isnot" => Ok(Self::IsNot),
            ">" => Ok(Self::GreaterThan),
            "<" => Ok(Self::LessThan),
            "contains" => Ok(Self::Contains),
            "starts_with" => Ok(Self::StartsWith),
            "ends_with" => Ok(Self::EndsWith),
            other => Err(LogicError::UnknownOperator(other.to_string())),
        }
    }
}

impl ConditionalLogic {
    /// Evaluate the rules against an entry, returning whether the owner is shown.
    pub fn evaluate(&self, entry: &EntryRecord) -> Result<bool, LogicError> {
        if self.rules.is_empty() {
            return Err(LogicError::NoRules);
        }

        let mut results = Vec::with_capacity(self.rules.len());
        for rule in &self.rules {
            results.push(rule.matches(entry)?);
        }

        let matched = match self.logic_type {
            LogicType::All => results.iter().all(|hit| *hit),
            LogicType::Any => results.iter().any(|hit| *hit),
        };

        Ok(match self.action_type {
            LogicAction::Show => matched,
            LogicAction::Hide => !matched,
        })
    }
}

impl LogicRule {
    fn matches(&self, entry: &EntryRecord) -> Result<bool, LogicError> {
        let operator = Operator::parse(&self.operator)?;
        let candidates = entry_values(entry.value(&self.field_id));

        for candidate in &candidates {
            if self.compare(operator, candidate)? {
                return Ok(operator != Operator::IsNot);
            }
        }

        // `isnot` holds only when no candidate equals the rule value.
        Ok(operator == Operator::IsNot)
    }

    fn compare(&self, operator: Operator, candidate: &str) -> Result<bool, LogicError> {
        let left = candidate.to_lowercase();
        let right = self.value.to_lowercase();

        Ok(match operator {
            Operator::Is | Operator::IsNot => left == right,
            Operator::Contains => left.contains(&right),
            Operator::StartsWith => left.starts_with(&right),
            Operator::EndsWith => left.ends_with(&right),
            Operator::GreaterThan => self.numeric(candidate)? > self.numeric(&self.value)?,
            Operator::LessThan => self.numeric(candidate)? < self.numeric(&self.value)?,
        })
    }

    fn numeric(&self, raw: &str) -> Result<f64, LogicError> {
        raw.trim()
            .parse::<f64>()
            .map_err(|_| LogicError::NotNumeric {
                field_id: self.field_id.clone(),
                value: raw.to_string(),
            })
    }
}

fn entry_values(value: Option<&Value>) -> Vec<String> {
    match value {
        None | Some(Value::Null) => vec![String::new()],
        Some(Value::String(text)) => vec![text.clone()],
        Some(Value::Bool(flag)) => vec![if *flag { "1" } else { "" }.to_string()],
        Some(Value::Number(number)) => vec![number.to_string()],
        Some(Value::Array(items)) => {
            let values: Vec<String> = items
                .iter()
                .flat_map(|item| entry_values(Some(item)))
                .collect();
            if values.is_empty() {
                vec![String::new()]
            } else {
                values
            }
        }
        Some(Value::Object(map)) => map
            .values()
            .flat_map(|item| entry_values(Some(item)))
            .collect(),
    }
}
