//! Typed description records produced by the extraction pipeline.
//!
//! The model replies with loosely-structured JSON; this module is the boundary
//! where that JSON becomes strongly-typed records. Provenance (which file, which
//! repository) is merged in through explicit builders rather than by splicing
//! untyped key/value maps, so a reply that is missing required fields fails with
//! a [`ValidationError`] instead of producing a half-formed record.

use std::path::Path;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Identity of the source file a record was extracted from.
///
/// One `Provenance` is built per work item and shared by every record that
/// item yields.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Provenance {
    /// Path relative to the repository root, as recorded in artifacts.
    pub filepath: String,
    pub repository_url: String,
    pub group_name: String,
    pub repo_name: String,
}

impl Provenance {
    /// Final component of the file path, mirroring the `file_name` record field.
    pub fn file_name(&self) -> String {
        Path::new(&self.filepath)
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default()
    }
}

/// A model reply that parsed as JSON but does not satisfy the record schema.
///
/// Validation failures are never retried: the offending element is dropped and
/// logged while its siblings proceed.
#[derive(Debug, thiserror::Error)]
pub enum ValidationError {
    /// The value does not match the expected record shape (missing or
    /// wrongly-typed fields).
    #[error("record does not match the expected shape: {0}")]
    Shape(#[from] serde_json::Error),

    /// A field that must carry content was present but empty.
    #[error("required field `{0}` is empty")]
    EmptyField(&'static str),
}

/// One argument of a described function.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Argument {
    pub name: String,
    #[serde(rename = "type")]
    pub arg_type: String,
    pub usage: String,
}

impl Argument {
    /// Sentence form used when rendering a record for embedding.
    pub fn to_paragraph_string(&self) -> String {
        format!(
            "The argument '{}' is of type '{}'. {}",
            self.name, self.arg_type, self.usage
        )
    }
}

/// Wire shape of one element of the function-analysis reply.
#[derive(Debug, Deserialize)]
struct FunctionFields {
    function_name: String,
    #[serde(default)]
    class_name: String,
    arguments: Vec<Argument>,
    return_type: String,
    functionality: String,
    tags: Vec<String>,
}

/// Wire shape of the file-analysis reply.
#[derive(Debug, Deserialize)]
struct FileFields {
    overall_purpose_and_domain: String,
    primary_responsibilities: Vec<String>,
    tags: Vec<String>,
}

/// Description of a single function or method, with provenance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FunctionRecord {
    #[serde(default)]
    pub file_name: String,
    pub function_name: String,
    #[serde(default)]
    pub class_name: String,
    pub arguments: Vec<Argument>,
    pub return_type: String,
    pub functionality: String,
    pub tags: Vec<String>,
    pub filepath: String,
    pub repository_url: String,
    pub group_name: String,
    pub repo_name: String,
}

impl FunctionRecord {
    /// Builds one record by merging a model-returned element with known
    /// provenance.
    ///
    /// Fails with [`ValidationError`] when required fields are missing, empty,
    /// or wrongly typed. Argument order is preserved as returned.
    pub fn from_model_value(
        value: &Value,
        provenance: &Provenance,
    ) -> Result<Self, ValidationError> {
        let fields: FunctionFields = serde_json::from_value(value.clone())?;
        if fields.function_name.trim().is_empty() {
            return Err(ValidationError::EmptyField("function_name"));
        }
        if fields.tags.is_empty() {
            return Err(ValidationError::EmptyField("tags"));
        }
        Ok(Self {
            file_name: provenance.file_name(),
            function_name: fields.function_name,
            class_name: fields.class_name,
            arguments: fields.arguments,
            return_type: fields.return_type,
            functionality: fields.functionality,
            tags: fields.tags,
            filepath: provenance.filepath.clone(),
            repository_url: provenance.repository_url.clone(),
            group_name: provenance.group_name.clone(),
            repo_name: provenance.repo_name.clone(),
        })
    }

    /// Paragraph rendering of the record, suitable as an embedding document.
    pub fn to_vector_string(&self) -> String {
        let mut parts = Vec::new();

        if self.class_name.is_empty() {
            parts.push(format!(
                "The function '{}' located in the file '{}' is designed to:",
                self.function_name, self.filepath
            ));
        } else {
            parts.push(format!(
                "Within the file '{}', the method '{}' belonging to the class '{}' serves the following purpose:",
                self.filepath, self.function_name, self.class_name
            ));
        }

        parts.push(self.functionality.clone());

        if self.arguments.is_empty() {
            parts.push("It accepts no arguments.".to_string());
        } else {
            let rendered: Vec<String> = self
                .arguments
                .iter()
                .map(Argument::to_paragraph_string)
                .collect();
            parts.push(format!(
                "It accepts the following arguments: {}",
                rendered.join(" ")
            ));
        }

        parts.push(format!(
            "The function returns a value of type '{}'.",
            self.return_type
        ));

        if !self.tags.is_empty() {
            parts.push(format!(
                "This function can be categorized by the following tags: {}.",
                self.tags.join(", ")
            ));
        }

        parts.join(" ")
    }
}

/// File-level description, with provenance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileRecord {
    #[serde(default)]
    pub file_name: String,
    pub overall_purpose_and_domain: String,
    pub primary_responsibilities: Vec<String>,
    pub tags: Vec<String>,
    pub filepath: String,
    pub repository_url: String,
    pub group_name: String,
    pub repo_name: String,
}

impl FileRecord {
    /// Builds the record from the model's single-object reply plus provenance.
    pub fn from_model_value(
        value: &Value,
        provenance: &Provenance,
    ) -> Result<Self, ValidationError> {
        let fields: FileFields = serde_json::from_value(value.clone())?;
        if fields.overall_purpose_and_domain.trim().is_empty() {
            return Err(ValidationError::EmptyField("overall_purpose_and_domain"));
        }
        Ok(Self {
            file_name: provenance.file_name(),
            overall_purpose_and_domain: fields.overall_purpose_and_domain,
            primary_responsibilities: fields.primary_responsibilities,
            tags: fields.tags,
            filepath: provenance.filepath.clone(),
            repository_url: provenance.repository_url.clone(),
            group_name: provenance.group_name.clone(),
            repo_name: provenance.repo_name.clone(),
        })
    }

    /// Paragraph rendering of the record, suitable as an embedding document.
    pub fn to_vector_string(&self) -> String {
        let mut parts = Vec::new();

        parts.push(format!("The file '{}' serves the purpose:", self.filepath));
        parts.push(self.overall_purpose_and_domain.clone());

        let cleaned: Vec<String> = self
            .primary_responsibilities
            .iter()
            .map(|r| r.trim_end_matches('.').to_string())
            .filter(|r| !r.is_empty())
            .collect();

        match cleaned.len() {
            0 => {}
            1 => parts.push(format!(
                "Its primary responsibility is to {}.",
                decapitalize(&cleaned[0])
            )),
            _ => {
                let mut joined: Vec<String> = vec![cleaned[0].clone()];
                joined.extend(cleaned[1..].iter().map(|r| decapitalize(r)));
                let (last, rest) = joined.split_last().map(|(l, r)| (l.clone(), r.to_vec()))
                    .unwrap_or_default();
                parts.push(format!(
                    "Its primary responsibilities include: {}, and {}.",
                    rest.join(", "),
                    last
                ));
            }
        }

        if !self.tags.is_empty() {
            parts.push(format!(
                "This file is associated with the following keywords or tags: {}.",
                self.tags.join(", ")
            ));
        }

        parts.join(" ")
    }
}

fn decapitalize(text: &str) -> String {
    let mut chars = text.chars();
    match chars.next() {
        Some(first) => first.to_lowercase().chain(chars).collect(),
        None => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn provenance() -> Provenance {
        Provenance {
            filepath: "src/parser.py".to_string(),
            repository_url: "https://example.com/acme/widget.git".to_string(),
            group_name: "acme".to_string(),
            repo_name: "widget".to_string(),
        }
    }

    #[test]
    fn builds_function_record_with_provenance() {
        let value = json!({
            "function_name": "parse_line",
            "class_name": "Parser",
            "arguments": [
                {"name": "line", "type": "str", "usage": "The raw input line."},
                {"name": "strict", "type": "bool", "usage": "Whether to reject malformed input."}
            ],
            "return_type": "dict",
            "functionality": "Parses one line into fields.",
            "tags": ["parsing", "validation", "text", "io", "records"]
        });

        let record = FunctionRecord::from_model_value(&value, &provenance()).unwrap();
        assert_eq!(record.function_name, "parse_line");
        assert_eq!(record.class_name, "Parser");
        assert_eq!(record.file_name, "parser.py");
        assert_eq!(record.filepath, "src/parser.py");
        assert_eq!(record.repo_name, "widget");
        // declaration order preserved
        assert_eq!(record.arguments[0].name, "line");
        assert_eq!(record.arguments[1].name, "strict");
    }

    #[test]
    fn missing_return_type_is_a_shape_error() {
        let value = json!({
            "function_name": "parse_line",
            "arguments": [],
            "functionality": "Parses one line.",
            "tags": ["parsing"]
        });

        let err = FunctionRecord::from_model_value(&value, &provenance()).unwrap_err();
        assert!(matches!(err, ValidationError::Shape(_)));
    }

    #[test]
    fn empty_function_name_is_rejected() {
        let value = json!({
            "function_name": "  ",
            "arguments": [],
            "return_type": "None",
            "functionality": "Does nothing.",
            "tags": ["noop"]
        });

        let err = FunctionRecord::from_model_value(&value, &provenance()).unwrap_err();
        assert!(matches!(err, ValidationError::EmptyField("function_name")));
    }

    #[test]
    fn class_name_defaults_to_empty() {
        let value = json!({
            "function_name": "main",
            "arguments": [],
            "return_type": "None",
            "functionality": "Entry point.",
            "tags": ["cli"]
        });

        let record = FunctionRecord::from_model_value(&value, &provenance()).unwrap();
        assert_eq!(record.class_name, "");
    }

    #[test]
    fn function_vector_string_mentions_signature_and_tags() {
        let value = json!({
            "function_name": "load",
            "arguments": [
                {"name": "path", "type": "str", "usage": "File to read."}
            ],
            "return_type": "bytes",
            "functionality": "Reads a file from disk.",
            "tags": ["io", "files"]
        });
        let record = FunctionRecord::from_model_value(&value, &provenance()).unwrap();

        let text = record.to_vector_string();
        assert!(text.contains("The function 'load'"));
        assert!(text.contains("type 'bytes'"));
        assert!(text.contains("The argument 'path'"));
        assert!(text.contains("io, files"));
    }

    #[test]
    fn builds_file_record_and_rejects_empty_purpose() {
        let good = json!({
            "overall_purpose_and_domain": "Implements a CLI log parser.",
            "primary_responsibilities": ["Parses arguments.", "Reads log files."],
            "tags": ["cli", "logs", "parsing", "reports", "io"]
        });
        let record = FileRecord::from_model_value(&good, &provenance()).unwrap();
        assert_eq!(record.file_name, "parser.py");
        let text = record.to_vector_string();
        assert!(text.contains("Its primary responsibilities include: Parses arguments, and reads log files."));

        let bad = json!({
            "overall_purpose_and_domain": "",
            "primary_responsibilities": [],
            "tags": []
        });
        let err = FileRecord::from_model_value(&bad, &provenance()).unwrap_err();
        assert!(matches!(
            err,
            ValidationError::EmptyField("overall_purpose_and_domain")
        ));
    }

    #[test]
    fn file_vector_string_with_single_responsibility() {
        let value = json!({
            "overall_purpose_and_domain": "Utility helpers.",
            "primary_responsibilities": ["Normalizes text input."],
            "tags": ["text"]
        });
        let record = FileRecord::from_model_value(&value, &provenance()).unwrap();
        let text = record.to_vector_string();
        assert!(text.contains("Its primary responsibility is to normalizes text input."));
    }
}
