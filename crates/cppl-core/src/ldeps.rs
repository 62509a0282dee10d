//! Parsed-imports (`.ldeps`) records.
//!
//! The front-end's parse-imports mode writes one of these per unit; the
//! coordinator decodes them all to build the dependency graph. The record
//! distinguishes ordinary imports (which constrain both the declaration and
//! the definition of the importing unit) from body-only imports (which
//! constrain only the definition and are the language's cycle-breaking
//! mechanism).

use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::error::{CoreError, Result};
use crate::paths::create_dirs_for_file;

const LDEPS_MAGIC: [u8; 4] = *b"CPLD";

/// Per-unit parsed imports, as produced by the front-end.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParsedImports {
    /// The unit's own identifier.
    pub unit_id: String,
    /// Ordinary import targets (declaration and definition edges).
    pub decl_imports: Vec<String>,
    /// Body-only import targets (definition edges only).
    pub body_imports: Vec<String>,
    /// Whether the unit is annotated public.
    pub is_public: bool,
    /// Whether the unit comes from an external library root.
    pub is_external: bool,
}

#[derive(Serialize, Deserialize)]
struct LdepsFile {
    magic: [u8; 4],
    format_version: u32,
    record: ParsedImports,
}

impl ParsedImports {
    pub const FORMAT_VERSION: u32 = 2;

    pub fn new(unit_id: impl Into<String>) -> Self {
        Self {
            unit_id: unit_id.into(),
            ..Default::default()
        }
    }

    /// Load a record; `Ok(None)` when the file does not exist.
    pub fn load(path: &Path) -> Result<Option<Self>> {
        let bytes = match std::fs::read(path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(CoreError::io(path, e)),
        };

        let file: LdepsFile = bincode::deserialize(&bytes)
            .map_err(|e| CoreError::corrupt(path, e.to_string()))?;

        if file.magic != LDEPS_MAGIC {
            return Err(CoreError::corrupt(path, "bad magic"));
        }
        if file.format_version != Self::FORMAT_VERSION {
            return Err(CoreError::FormatVersion {
                path: path.to_path_buf(),
                found: file.format_version,
                expected: Self::FORMAT_VERSION,
            });
        }

        Ok(Some(file.record))
    }

    /// Write the record atomically.
    pub fn save(&self, path: &Path) -> Result<()> {
        create_dirs_for_file(path)?;

        let file = LdepsFile {
            magic: LDEPS_MAGIC,
            format_version: Self::FORMAT_VERSION,
            record: self.clone(),
        };
        let bytes = bincode::serialize(&file)
            .map_err(|e| CoreError::corrupt(path, e.to_string()))?;

        let tmp = path.with_extension("ldeps.tmp");
        std::fs::write(&tmp, bytes).map_err(|e| CoreError::io(&tmp, e))?;
        std::fs::rename(&tmp, path).map_err(|e| CoreError::io(path, e))?;
        Ok(())
    }
}
