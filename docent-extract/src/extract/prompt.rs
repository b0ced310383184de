//! Prompt templates for the structured-output extraction calls.
//!
//! The schema literals are configuration data: they are embedded verbatim in
//! the prompt and double as documentation of the wire contract the records in
//! [`crate::records`] validate against.

const FUNCTION_TASK: &str = "You are tasked with analyzing the provided code snippet and extracting detailed information about its functions and methods. For every function and method identified, including standalone functions and methods within classes, please provide a comprehensive description by populating the following JSON structure";

const FILE_TASK: &str = "You are an expert code analyst LLM. Your task is to provide a comprehensive file-level summary for the provided source code file. Analyze the entire file to understand its overall purpose, structure, dependencies, and key components. Populate the specified JSON output format with detailed and accurate information. This summary should provide a high-level overview, distinct from the granular function-by-function analysis";

const FUNCTION_SCHEMA: &str = r#"
[
  {
    "function_name": "REQUIRED. String. name of the function/method",
    "class_name": "Optional. String. the class this method belongs to or empty otherwise",
    "arguments": [
      {
        "name": "REQUIRED. String. name of the argument",
        "type": "REQUIRED. String. type of the argument (be specific, e.g., List[int], Dict[str, Any])",
        "usage": "REQUIRED. String. Detailed explanation of how the argument is used, its role, impact, and if it's optional or has defaults."
      }
    ],
    "return_type": "REQUIRED. String. type of the return (be specific, e.g., str, None, Tuple[int, str])",
    "functionality": "REQUIRED. String. A detailed, step-by-step summary of the function's purpose, logic, key operations, and any side effects. Be specific.",
    "tags": [
      "REQUIRED. List of strings. Based on the detailed code analysis and its inferred purpose, suggest 5-7 specific and descriptive keywords or tags that categorize this function's functionality (e.g., ['data-cleaning', 'text-normalization', 'user-input-validation', 'database-query', 'error-handling']). Output as a List[String]."
    ]
  },
  ...
]
"#;

const FILE_SCHEMA: &str = r#"
{
  "overall_purpose_and_domain": "REQUIRED. String. In under 1-2 clear and concise sentences, explain the file's primary purpose and the specific problem domain or area it belongs to. Example: 'This file implements a command-line interface (CLI) tool for parsing Apache log files and generating daily traffic reports.' or 'Defines utility functions for common string manipulation tasks, such as cleaning and normalizing text data for an NLP pipeline.'",
  "primary_responsibilities": [
    "REQUIRED. List of strings. Each string in the list MUST describe a distinct, high-level responsibility of this file, starting with an action verb. Example: ['Parses user arguments from the command line.', 'Connects to the customer database.', 'Executes SQL queries to retrieve order information.', 'Formats query results into a JSON response.']"
  ],
  "tags": [
    "REQUIRED. List of strings. Based on the detailed code analysis and its inferred purpose, suggest 5-7 specific and descriptive keywords or tags that categorize this file's responsibility (e.g., ['data-cleaning', 'text-normalization', 'user-input-validation', 'database-query', 'error-handling']). Output as a List[String]."
  ]
}
"#;

/// Wraps code, task, and schema into the analyst prompt with the
/// pure-JSON-only instruction.
fn base_template(code: &str, task: &str, json_schema: &str) -> String {
    format!(
        r#"You are an expert code analyst. Your task is to analyze the provided code snippet and provide the information requested in a structured JSON format provided at the end.

**Code**

```
{code}
```

**Task or Information Required**
{task}

**Required JSON format**

```json
{json_schema}
```

Always output a valid JSON object and Do not include any text or explanation outside the JSON structure
"#
    )
}

/// Prompt asking for one description per function or method in `code`.
pub fn function_description_prompt(code: &str) -> String {
    base_template(code, FUNCTION_TASK, FUNCTION_SCHEMA)
}

/// Prompt asking for a single file-level summary of `code`.
pub fn file_description_prompt(code: &str) -> String {
    base_template(code, FILE_TASK, FILE_SCHEMA)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn function_prompt_embeds_code_and_schema() {
        let prompt = function_description_prompt("def add(a, b): return a + b");
        assert!(prompt.contains("def add(a, b)"));
        assert!(prompt.contains("\"function_name\""));
        assert!(prompt.contains("functions and methods"));
    }

    #[test]
    fn file_prompt_embeds_code_and_schema() {
        let prompt = file_description_prompt("import os");
        assert!(prompt.contains("import os"));
        assert!(prompt.contains("\"overall_purpose_and_domain\""));
        assert!(prompt.contains("file-level summary"));
    }
}
