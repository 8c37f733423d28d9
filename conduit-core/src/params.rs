//! Node parameters
//!
//! Nodes publish a table of [`ParameterInfo`] and accept typed
//! [`ParamValue`]s by name. The pipeline core never interprets what a
//! parameter means; it only validates type and range and watches for
//! the restart flag a change may raise.

use serde::{Deserialize, Serialize};

use crate::error::{ConduitError, Result};

/// Value of a node parameter
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ParamValue {
    Bool(bool),
    Int(i64),
    Float(f64),
    String(String),
}

impl ParamValue {
    /// Integer value, if this is one
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Self::Int(v) => Some(*v),
            _ => None,
        }
    }

    /// Numeric value; integers widen to float
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Float(v) => Some(*v),
            Self::Int(v) => Some(*v as f64),
            _ => None,
        }
    }

    /// Boolean value, if this is one
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(v) => Some(*v),
            _ => None,
        }
    }

    /// String value, if this is one
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(v) => Some(v),
            _ => None,
        }
    }

    /// Parse a command-line style value: bools, then integers, then
    /// floats, else a string
    pub fn parse(s: &str) -> Self {
        match s {
            "true" | "yes" | "on" => return Self::Bool(true),
            "false" | "no" | "off" => return Self::Bool(false),
            _ => {}
        }
        if let Ok(v) = s.parse::<i64>() {
            return Self::Int(v);
        }
        if let Ok(v) = s.parse::<f64>() {
            return Self::Float(v);
        }
        Self::String(s.to_string())
    }
}

impl std::fmt::Display for ParamValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Bool(v) => write!(f, "{}", v),
            Self::Int(v) => write!(f, "{}", v),
            Self::Float(v) => write!(f, "{}", v),
            Self::String(v) => write!(f, "{}", v),
        }
    }
}

/// Type of a node parameter
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ParamKind {
    Bool,
    Int,
    Float,
    String,
}

/// Description of one node parameter
#[derive(Debug, Clone, Serialize)]
pub struct ParameterInfo {
    /// Name used with get/set
    pub name: &'static str,
    /// Human-readable label
    pub label: &'static str,
    /// Value type
    pub kind: ParamKind,
    /// Value the node starts with
    pub default: ParamValue,
    /// Inclusive lower bound for numeric kinds
    pub min: Option<f64>,
    /// Inclusive upper bound for numeric kinds
    pub max: Option<f64>,
    /// What the parameter does
    pub help: &'static str,
    /// Changing it after negotiation raises needs-restart
    pub restart: bool,
}

impl ParameterInfo {
    /// Check `value` against type and range, returning the normalized
    /// value (integers given for float parameters become floats)
    pub fn validate(&self, value: &ParamValue) -> Result<ParamValue> {
        let normalized = match (self.kind, value) {
            (ParamKind::Bool, ParamValue::Bool(_))
            | (ParamKind::Int, ParamValue::Int(_))
            | (ParamKind::Float, ParamValue::Float(_))
            | (ParamKind::String, ParamValue::String(_)) => value.clone(),
            (ParamKind::Float, ParamValue::Int(v)) => ParamValue::Float(*v as f64),
            (kind, other) => {
                return Err(ConduitError::invalid_parameter(
                    self.name,
                    format!("expected {:?}, got {}", kind, other),
                ));
            }
        };

        if let Some(v) = normalized.as_f64() {
            if self.min.is_some_and(|min| v < min) || self.max.is_some_and(|max| v > max) {
                return Err(ConduitError::invalid_parameter(
                    self.name,
                    format!(
                        "{} outside [{}, {}]",
                        v,
                        self.min.map_or("-inf".to_string(), |m| m.to_string()),
                        self.max.map_or("inf".to_string(), |m| m.to_string()),
                    ),
                ));
            }
        }

        Ok(normalized)
    }
}

/// Look up a parameter by name
pub fn find_parameter<'a>(params: &'a [ParameterInfo], name: &str) -> Option<&'a ParameterInfo> {
    params.iter().find(|p| p.name == name)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn width_param() -> ParameterInfo {
        ParameterInfo {
            name: "max_width",
            label: "Maximum width",
            kind: ParamKind::Int,
            default: ParamValue::Int(1920),
            min: Some(16.0),
            max: Some(8192.0),
            help: "",
            restart: true,
        }
    }

    #[test]
    fn test_parse() {
        assert_eq!(ParamValue::parse("on"), ParamValue::Bool(true));
        assert_eq!(ParamValue::parse("720"), ParamValue::Int(720));
        assert_eq!(ParamValue::parse("-3.5"), ParamValue::Float(-3.5));
        assert_eq!(ParamValue::parse("bicubic"), ParamValue::String("bicubic".into()));
    }

    #[test]
    fn test_validate_type_and_range() {
        let param = width_param();
        assert_eq!(param.validate(&ParamValue::Int(1280)).ok(), Some(ParamValue::Int(1280)));
        assert!(param.validate(&ParamValue::Int(8)).is_err());
        assert!(param.validate(&ParamValue::Bool(true)).is_err());
    }

    #[test]
    fn test_validate_widens_int_to_float() {
        let param = ParameterInfo {
            kind: ParamKind::Float,
            default: ParamValue::Float(0.0),
            min: None,
            max: None,
            ..width_param()
        };
        assert_eq!(param.validate(&ParamValue::Int(3)).ok(), Some(ParamValue::Float(3.0)));
    }
}
