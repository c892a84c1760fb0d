use schemars::JsonSchema;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

/// Placeholder used for the module or file of a diagnostic that has no better location.
pub const UNKNOWN_LOCATION: &str = "---";

/// Rule severity. Only `high` changes engine behavior (waivers need a tracked reference id).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    High,
    Medium,
    Low,
}

impl Severity {
    pub fn as_str(self) -> &'static str {
        match self {
            Severity::High => "high",
            Severity::Medium => "medium",
            Severity::Low => "low",
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct UnknownSeverity(pub String);

impl fmt::Display for UnknownSeverity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown severity: {} (expected high|medium|low)", self.0)
    }
}

impl std::error::Error for UnknownSeverity {}

impl FromStr for Severity {
    type Err = UnknownSeverity;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "high" => Ok(Severity::High),
            "medium" => Ok(Severity::Medium),
            "low" => Ok(Severity::Low),
            _ => Err(UnknownSeverity(s.to_string())),
        }
    }
}

/// Waiver state of a failure.
///
/// Serialized as the label reporters print: `""`, `"**waived**"` or `"**waived by <id>**"`.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash)]
pub enum Waived {
    #[default]
    No,
    Yes,
    By(String),
}

impl Waived {
    pub fn is_waived(&self) -> bool {
        !matches!(self, Waived::No)
    }

    pub fn label(&self) -> String {
        match self {
            Waived::No => String::new(),
            Waived::Yes => "**waived**".to_string(),
            Waived::By(id) => format!("**waived by {id}**"),
        }
    }

    fn from_label(label: &str) -> Option<Self> {
        if label.is_empty() {
            return Some(Waived::No);
        }
        if label == "**waived**" {
            return Some(Waived::Yes);
        }
        label
            .strip_prefix("**waived by ")
            .and_then(|rest| rest.strip_suffix("**"))
            .map(|id| Waived::By(id.to_string()))
    }
}

impl Serialize for Waived {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.label())
    }
}

impl<'de> Deserialize<'de> for Waived {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let label = String::deserialize(deserializer)?;
        Waived::from_label(&label)
            .ok_or_else(|| serde::de::Error::custom(format!("invalid waiver label: {label}")))
    }
}

/// A failure or error produced during one scan.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct Diagnostic {
    pub severity: Severity,
    #[schemars(with = "String")]
    pub waived: Waived,
    pub message: String,
    pub module_name: String,
    pub file_name: String,
}

impl Diagnostic {
    pub fn new(
        severity: Severity,
        message: impl Into<String>,
        module_name: impl Into<String>,
        file_name: impl Into<String>,
    ) -> Self {
        Self {
            severity,
            waived: Waived::No,
            message: message.into(),
            module_name: module_name.into(),
            file_name: file_name.into(),
        }
    }

    /// An engine error (decode failure, unresolved reference). Errors are always `high`.
    pub fn error(
        message: impl Into<String>,
        module_name: impl Into<String>,
        file_name: impl Into<String>,
    ) -> Self {
        Self::new(Severity::High, message, module_name, file_name)
    }

    pub fn with_waiver(mut self, waived: Waived) -> Self {
        self.waived = waived;
        self
    }
}
