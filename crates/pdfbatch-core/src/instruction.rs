//! Batch instruction data model
//!
//! An [`Instruction`] is one declarative unit of work against stored
//! documents. A batch is an ordered list of instructions submitted together;
//! the engine crate executes them, this module only describes them.
//!
//! All page indices are 0-based and range bounds are inclusive.

use serde::{Deserialize, Serialize};

use crate::error::PdfOpError;

/// Operation selector for a batch. Every instruction in a batch carries the
/// same kind; the job record stores it for display.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OperationKind {
    Merge,
    Delete,
    Split,
    Reorder,
    Rename,
}

impl std::fmt::Display for OperationKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OperationKind::Merge => write!(f, "merge"),
            OperationKind::Delete => write!(f, "delete"),
            OperationKind::Split => write!(f, "split"),
            OperationKind::Reorder => write!(f, "reorder"),
            OperationKind::Rename => write!(f, "rename"),
        }
    }
}

/// One declarative unit of document work.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Instruction {
    /// Append the pages of every source, in list order, into one output.
    Merge {
        source_files: Vec<String>,
        output_name: String,
    },
    /// Remove the given pages from the source. Out-of-range indices are
    /// ignored.
    DeletePages {
        source_file: String,
        pages_to_delete: Vec<u32>,
        output_name: String,
    },
    /// Produce one output per page range. `output_names` is aligned
    /// index-for-index with `page_ranges`; a missing name is synthesized
    /// from the source name and the range ordinal.
    Split {
        source_file: String,
        page_ranges: Vec<(u32, u32)>,
        #[serde(default)]
        output_names: Vec<String>,
    },
    /// Copy pages in the exact order given. Duplicates and omissions are
    /// both legal; out-of-range entries are dropped.
    Reorder {
        source_file: String,
        new_page_order: Vec<u32>,
        output_name: String,
    },
    /// Re-serialize the document under a new name with fresh metadata.
    Rename { old_name: String, new_name: String },
}

impl Instruction {
    pub fn kind(&self) -> OperationKind {
        match self {
            Instruction::Merge { .. } => OperationKind::Merge,
            Instruction::DeletePages { .. } => OperationKind::Delete,
            Instruction::Split { .. } => OperationKind::Split,
            Instruction::Reorder { .. } => OperationKind::Reorder,
            Instruction::Rename { .. } => OperationKind::Rename,
        }
    }

    /// Name used when attributing errors to this instruction.
    pub fn label(&self) -> &str {
        match self {
            Instruction::Merge { output_name, .. } => output_name,
            Instruction::DeletePages { output_name, .. } => output_name,
            Instruction::Split { source_file, .. } => source_file,
            Instruction::Reorder { output_name, .. } => output_name,
            Instruction::Rename { new_name, .. } => new_name,
        }
    }

    /// Every source file this instruction will fetch.
    pub fn source_files(&self) -> Vec<&str> {
        match self {
            Instruction::Merge { source_files, .. } => {
                source_files.iter().map(String::as_str).collect()
            }
            Instruction::DeletePages { source_file, .. }
            | Instruction::Split { source_file, .. }
            | Instruction::Reorder { source_file, .. } => vec![source_file],
            Instruction::Rename { old_name, .. } => vec![old_name],
        }
    }

    /// Structural validation applied at submission time, before a job is
    /// created. Execution-time problems (missing sources, bad page numbers)
    /// are not checked here.
    pub fn validate(&self) -> Result<(), PdfOpError> {
        let blank =
            |name: &str, what: &str| -> Result<(), PdfOpError> {
                if name.trim().is_empty() {
                    Err(PdfOpError::InvalidInstruction(format!("{what} is blank")))
                } else {
                    Ok(())
                }
            };

        match self {
            Instruction::Merge {
                source_files,
                output_name,
            } => {
                if source_files.is_empty() {
                    return Err(PdfOpError::InvalidInstruction(
                        "merge needs at least one source file".into(),
                    ));
                }
                for source in source_files {
                    blank(source, "merge source file")?;
                }
                blank(output_name, "merge output name")
            }
            Instruction::DeletePages {
                source_file,
                output_name,
                ..
            } => {
                blank(source_file, "delete source file")?;
                blank(output_name, "delete output name")
            }
            Instruction::Split {
                source_file,
                page_ranges,
                ..
            } => {
                blank(source_file, "split source file")?;
                if page_ranges.is_empty() {
                    return Err(PdfOpError::InvalidInstruction(
                        "split needs at least one page range".into(),
                    ));
                }
                Ok(())
            }
            Instruction::Reorder {
                source_file,
                output_name,
                ..
            } => {
                blank(source_file, "reorder source file")?;
                blank(output_name, "reorder output name")
            }
            Instruction::Rename { old_name, new_name } => {
                blank(old_name, "rename source name")?;
                blank(new_name, "rename target name")
            }
        }
    }
}

/// Sanitize a user-supplied name before it is used as an archive entry key
/// or storage path segment. Path-traversal sequences are stripped and only
/// alphanumeric characters, `.`, `_` and `-` survive.
pub fn sanitize_name(name: &str) -> String {
    // Filter first, strip second: dropping a separator can push two dots
    // together, so traversal removal has to run on the filtered text.
    let mut cleaned: String = name
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-'))
        .collect();

    while cleaned.contains("..") {
        cleaned = cleaned.replace("..", "");
    }

    if cleaned.is_empty() {
        "unnamed".to_string()
    } else {
        cleaned
    }
}
