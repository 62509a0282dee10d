//! Child-process command assembly.
//!
//! One constructor per build phase, each producing a fixed argv template
//! with structured slots. Arguments keep their quote characters while the
//! command is carried around and rendered for logging; quotes are stripped
//! only when the argv is handed to the exec primitive.

use std::path::{Path, PathBuf};

use crate::config::DriverConfig;
use crate::files::FilesInfo;

/// Phase flags understood by the front-end.
pub const PHASE_PREAMBLE: &str = "-cppl-preamble";
pub const PHASE_IMPORT: &str = "-cppl-import";
pub const PHASE_DECL: &str = "-cppl-decl";
pub const PHASE_OBJ: &str = "-cppl-obj";

/// Passed to a decl compile when the same unit will also be compiled for a
/// definition, so diagnostics are not reported twice.
pub const SUPPRESS_WARNINGS: &str = "-cppl-suppress-warnings";

/// An assembled child command: program plus argv.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandInfo {
    program: PathBuf,
    args: Vec<String>,
}

impl CommandInfo {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
        }
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    /// `key=value` in a single token.
    pub fn kv_eq(mut self, key: &str, value: impl std::fmt::Display) -> Self {
        self.args.push(format!("{key}={value}"));
        self
    }

    /// `key=value` when the value is present.
    pub fn kv_eq_opt(self, key: &str, value: Option<impl std::fmt::Display>) -> Self {
        match value {
            Some(value) => self.kv_eq(key, value),
            None => self,
        }
    }

    /// `key=value` once per value.
    pub fn kv_eq_each<I, V>(mut self, key: &str, values: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: std::fmt::Display,
    {
        for value in values {
            self.args.push(format!("{key}={value}"));
        }
        self
    }

    /// `key value` as two tokens.
    pub fn kv_space(mut self, key: &str, value: impl Into<String>) -> Self {
        self.args.push(key.to_string());
        self.args.push(value.into());
        self
    }

    pub fn program(&self) -> &Path {
        &self.program
    }

    pub fn argv(&self) -> &[String] {
        &self.args
    }

    /// The argv as handed to the exec primitive: bounding quotes stripped.
    pub fn exec_args(&self) -> Vec<String> {
        self.args
            .iter()
            .map(|a| strip_bounding_quotes(a).to_string())
            .collect()
    }

    /// Space-joined rendering for logs and dry runs.
    pub fn render(&self) -> String {
        let mut out = self.program.display().to_string();
        for arg in &self.args {
            out.push(' ');
            out.push_str(arg);
        }
        out
    }
}

/// Program + common flags every compile-ish phase shares.
fn frontend_base(config: &DriverConfig) -> CommandInfo {
    CommandInfo::new(config.frontend_path())
        .kv_eq_opt("-stdlib", config.stdlib.as_deref())
        .args(
            config
                .include_dirs
                .iter()
                .map(|dir| format!("-I{}", dir.display())),
        )
}

/// Precompile the preamble.
pub fn preamble(config: &DriverConfig, source: &Path, out: &Path, meta: &Path) -> CommandInfo {
    frontend_base(config)
        .arg(PHASE_PREAMBLE)
        .kv_eq("-cppl-src-root", config.sources_root.display())
        .kv_eq("-cppl-meta", meta.display())
        .args(config.extra_preamble_args.iter().cloned())
        .arg(source.display().to_string())
        .kv_space("-o", out.display().to_string())
}

/// Extract a unit's imports.
pub fn parse_import(config: &DriverConfig, files: &FilesInfo) -> CommandInfo {
    frontend_base(config)
        .arg(PHASE_IMPORT)
        .kv_eq("-cppl-src-root", files.src_root.display())
        .kv_eq("-cppl-unit-id", &files.unit_id)
        .kv_eq("-cppl-meta", files.ldeps_meta.display())
        .args(config.extra_parse_args.iter().cloned())
        .arg(files.source.display().to_string())
        .kv_space("-o", files.ldeps.display().to_string())
}

/// Compile a unit's declaration AST.
pub fn build_decl(
    config: &DriverConfig,
    files: &FilesInfo,
    dependencies: &[PathBuf],
    suppress_warnings: bool,
) -> CommandInfo {
    let mut cmd = frontend_base(config)
        .arg(PHASE_DECL)
        .kv_eq("-cppl-src-root", files.src_root.display())
        .kv_eq("-cppl-unit-id", &files.unit_id)
        .kv_eq("-cppl-meta", files.decl_ast_meta.display());

    if suppress_warnings {
        cmd = cmd.arg(SUPPRESS_WARNINGS);
    }

    cmd.kv_eq_opt(
        "-cppl-include-preamble",
        config
            .preamble_requested()
            .then(|| config.preamble_output().display().to_string()),
    )
    .kv_eq_each(
        "-cppl-include-dependency",
        dependencies.iter().map(|d| d.display()),
    )
    .args(config.extra_parse_args.iter().cloned())
    .arg(files.source.display().to_string())
    .kv_space("-o", files.decl_ast.display().to_string())
}

/// Compile a unit's object.
pub fn build_obj(config: &DriverConfig, files: &FilesInfo, dependencies: &[PathBuf]) -> CommandInfo {
    frontend_base(config)
        .arg(PHASE_OBJ)
        .kv_eq("-cppl-src-root", files.src_root.display())
        .kv_eq("-cppl-unit-id", &files.unit_id)
        .kv_eq("-cppl-meta", files.object_meta.display())
        .kv_eq_opt(
            "-cppl-include-preamble",
            config
                .preamble_requested()
                .then(|| config.preamble_output().display().to_string()),
        )
        .kv_eq_each(
            "-cppl-include-dependency",
            dependencies.iter().map(|d| d.display()),
        )
        .args(config.extra_parse_args.iter().cloned())
        .args(config.extra_codegen_args.iter().cloned())
        .arg(files.source.display().to_string())
        .kv_space("-o", files.object.display().to_string())
}

/// Link project objects into the output executable.
pub fn link(config: &DriverConfig, objects: &[PathBuf], out: &Path) -> CommandInfo {
    CommandInfo::new(config.frontend_path())
        .kv_eq_opt("-stdlib", config.stdlib.as_deref())
        .args(config.extra_link_args.iter().cloned())
        .args(objects.iter().map(|o| o.display().to_string()))
        .kv_space("-o", out.display().to_string())
}

/// Split an extra-args string the way a shell would, keeping quote
/// characters in the tokens.
///
/// Spaces split tokens; single and double quotes group; a backslash
/// escapes the next character (the backslash itself is dropped). Quote
/// characters remain in the produced tokens and are stripped when the
/// argv is handed to the exec primitive.
pub fn tokenize_args(input: &str) -> Vec<String> {
    #[derive(PartialEq)]
    enum Quote {
        None,
        Single,
        Double,
    }

    let mut tokens = Vec::new();
    let mut current = String::new();
    let mut quote = Quote::None;
    let mut escaped = false;

    for ch in input.chars() {
        if escaped {
            current.push(ch);
            escaped = false;
            continue;
        }

        match ch {
            '\\' => escaped = true,
            '\'' if quote == Quote::None => {
                quote = Quote::Single;
                current.push(ch);
            }
            '\'' if quote == Quote::Single => {
                quote = Quote::None;
                current.push(ch);
            }
            '"' if quote == Quote::None => {
                quote = Quote::Double;
                current.push(ch);
            }
            '"' if quote == Quote::Double => {
                quote = Quote::None;
                current.push(ch);
            }
            ' ' if quote == Quote::None => {
                if !current.is_empty() {
                    tokens.push(std::mem::take(&mut current));
                }
            }
            _ => current.push(ch),
        }
    }

    if !current.is_empty() {
        tokens.push(current);
    }
    tokens
}

/// Strip one pair of matching bounding quotes, if present.
pub fn strip_bounding_quotes(token: &str) -> &str {
    let bytes = token.as_bytes();
    if bytes.len() >= 2 {
        let (first, last) = (bytes[0], bytes[bytes.len() - 1]);
        if first == last && (first == b'\'' || first == b'"') {
            return &token[1..token.len() - 1];
        }
    }
    token
}
