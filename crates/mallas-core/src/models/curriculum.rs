//! Curriculum identity, catalog entries and raw curriculum documents.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

/// Reserved id for the user-built curriculum kept in local storage.
pub const CUSTOM_CURRICULUM_ID: &str = "personalizado";

/// Department shown when a document does not name one.
pub const UNKNOWN_DEPARTMENT: &str = "N/A";

const DOCUMENT_EXTENSION: &str = ".json";

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum InvalidCurriculumId {
    #[error("Curriculum id must not be empty")]
    Empty,
    /// Ids name a file inside `mallas/`, so separators and parent
    /// references are refused.
    #[error("Curriculum id contains a path component: {0}")]
    PathComponent(String),
}

/// Identity of a curriculum: either a published one, named after its source
/// file, or the custom one the user edits locally.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum CurriculumId {
    Standard(String),
    Custom,
}

impl CurriculumId {
    pub fn parse(raw: &str) -> Result<Self, InvalidCurriculumId> {
        if raw.is_empty() {
            Err(InvalidCurriculumId::Empty)
        } else if raw.contains(['/', '\\']) || raw.contains("..") {
            Err(InvalidCurriculumId::PathComponent(raw.to_string()))
        } else if raw == CUSTOM_CURRICULUM_ID {
            Ok(CurriculumId::Custom)
        } else {
            Ok(CurriculumId::Standard(raw.to_string()))
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            CurriculumId::Standard(id) => id,
            CurriculumId::Custom => CUSTOM_CURRICULUM_ID,
        }
    }

    pub fn is_custom(&self) -> bool {
        matches!(self, CurriculumId::Custom)
    }
}

impl fmt::Display for CurriculumId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CurriculumId {
    type Err = InvalidCurriculumId;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

/// Code, name and department of a curriculum.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS), ts(export))]
pub struct CurriculumInfo {
    pub code: String,
    pub name: String,
    pub department: String,
}

/// One curriculum listed in the catalog.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS), ts(export))]
pub struct CatalogEntry {
    /// Source file name without extension
    pub id: String,
    pub code: String,
    pub display_name: String,
    pub department: String,
    /// Source file name as listed in the index
    pub source_ref: String,
}

impl CatalogEntry {
    /// Build an entry from a fetched document. Returns `None` unless the
    /// info block carries both a code and a name.
    pub fn from_document(file: &str, document: &CurriculumDocument) -> Option<Self> {
        let info = document.info()?;
        Some(Self {
            id: file.strip_suffix(DOCUMENT_EXTENSION).unwrap_or(file).to_string(),
            code: info.code,
            display_name: info.name,
            department: info.department,
            source_ref: file.to_string(),
        })
    }

    /// "CODE - Name", as shown in selectors.
    pub fn label(&self) -> String {
        format!("{} - {}", self.code, self.display_name)
    }

    pub fn info(&self) -> CurriculumInfo {
        CurriculumInfo {
            code: self.code.clone(),
            name: self.display_name.clone(),
            department: self.department.clone(),
        }
    }
}

/// A curriculum document as published: `{ info, malla }`, or just the body.
///
/// The body (levels and per-course prerequisites) is opaque here and passed
/// through untouched.
#[derive(Debug, Clone, PartialEq)]
pub struct CurriculumDocument {
    raw: Value,
}

impl CurriculumDocument {
    pub fn from_value(raw: Value) -> Self {
        Self { raw }
    }

    /// The info block, if it names both a code and a name.
    pub fn info(&self) -> Option<CurriculumInfo> {
        let info = self.raw.get("info")?;
        let code = text_field(info.get("codigo"))?;
        let name = text_field(info.get("nombre"))?;
        let department =
            text_field(info.get("departamento")).unwrap_or_else(|| UNKNOWN_DEPARTMENT.to_string());
        Some(CurriculumInfo {
            code,
            name,
            department,
        })
    }

    /// The curriculum body: the `malla` field when it holds something,
    /// otherwise the whole document. `null`, `false`, `0` and `""` count as
    /// holding nothing.
    pub fn into_body(self) -> Value {
        match self.raw {
            Value::Object(mut map) if map.get("malla").is_some_and(is_truthy) => {
                map.remove("malla").unwrap_or(Value::Null)
            }
            raw => raw,
        }
    }
}

fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
        Value::String(s) => !s.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    }
}

/// Non-empty text from a JSON field. Numeric codes are accepted as text.
fn text_field(value: Option<&Value>) -> Option<String> {
    let text = match value? {
        Value::String(s) => s.clone(),
        Value::Number(n) => n.to_string(),
        _ => return None,
    };
    (!text.is_empty()).then_some(text)
}

/// The index listing candidate curriculum files.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CatalogIndex {
    #[serde(default)]
    pub files: Vec<String>,
}
