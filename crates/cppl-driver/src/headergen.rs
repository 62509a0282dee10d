//! Header and declaration-surrogate generation.
//!
//! A public unit's exported surface is produced by replaying the source
//! file through the fragment list its decl compile recorded: function
//! bodies get skipped or collapsed to `;`, file-scope variables gain
//! `extern`, and the unit's name scope is opened and closed in whichever
//! style the output asks for. Header output wraps scopes in nested
//! namespaces and pulls dependencies in with `#include`; declaration
//! surrogates keep the unit syntax and reference dependencies with
//! `#import`.

use std::path::{Path, PathBuf};

use cppl_core::{Fragment, FragmentAction};

use crate::error::{DriverError, Result};

/// Which exported surface is being produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputMode {
    Header,
    DeclSurrogate,
}

/// A dependency of the unit being exported.
#[derive(Debug, Clone)]
pub struct DependencyRef {
    /// The dependency's unit identifier (`pkg::Dep`).
    pub unit_id: String,
    /// Its header path relative to the headers output dir (`pkg/Dep.h`).
    pub include_path: PathBuf,
}

/// Everything needed to generate one output file.
#[derive(Debug)]
pub struct GeneratorInput<'a> {
    pub mode: OutputMode,
    pub unit_id: &'a str,
    pub source: &'a [u8],
    pub fragments: &'a [Fragment],
    pub dependencies: &'a [DependencyRef],
    /// Included directly when the unit has no dependencies.
    pub preamble_source: Option<&'a Path>,
    /// Identifies the fragment list origin in error messages.
    pub origin: &'a Path,
}

/// Apply the fragment list and emit the transformed file contents.
pub fn generate(input: &GeneratorInput<'_>) -> Result<Vec<u8>> {
    validate_fragments(input)?;

    let mut out = Vec::with_capacity(input.source.len() / 2 + 128);
    emit_prelude(input, &mut out);

    let mut cursor = 0usize;
    for fragment in input.fragments {
        let start = fragment.start as usize;
        let end = fragment.end as usize;
        out.extend_from_slice(&input.source[cursor..start]);
        cursor = end;

        match fragment.action {
            FragmentAction::Skip => {}
            FragmentAction::SkipInHeaderOnly => {
                if input.mode == OutputMode::DeclSurrogate {
                    out.extend_from_slice(&input.source[start..end]);
                }
            }
            FragmentAction::ReplaceWithSemicolon => out.extend_from_slice(b";"),
            FragmentAction::PutExtern => {
                // Zero-width anchor: the insertion happens regardless of
                // any surrounding skip decisions.
                out.extend_from_slice(b"extern ");
                out.extend_from_slice(&input.source[start..end]);
            }
            FragmentAction::StartUnit | FragmentAction::StartUnitFirstDecl => {
                emit_scope_open(input, &mut out);
            }
            FragmentAction::EndUnit | FragmentAction::EndUnitEOF => {
                emit_scope_close(input, &mut out);
            }
        }
    }
    out.extend_from_slice(&input.source[cursor..]);

    Ok(out)
}

/// Generate and write the output file, creating parent directories.
pub fn write_output(input: &GeneratorInput<'_>, out_path: &Path) -> Result<()> {
    let bytes = generate(input)?;
    cppl_core::paths::create_dirs_for_file(out_path)?;
    std::fs::write(out_path, bytes).map_err(|e| {
        DriverError::Core(cppl_core::CoreError::Io {
            path: out_path.to_path_buf(),
            source: e,
        })
    })
}

fn validate_fragments(input: &GeneratorInput<'_>) -> Result<()> {
    let mut prev_end = 0u32;
    for fragment in input.fragments {
        if fragment.start > fragment.end {
            return Err(malformed(input, "range start past end"));
        }
        if fragment.start < prev_end {
            return Err(malformed(input, "ranges unsorted or overlapping"));
        }
        if fragment.end as usize > input.source.len() {
            return Err(malformed(input, "range past end of source"));
        }
        prev_end = fragment.end;
    }
    Ok(())
}

fn malformed(input: &GeneratorInput<'_>, reason: &str) -> DriverError {
    DriverError::MalformedFragments {
        path: input.origin.to_path_buf(),
        reason: reason.to_string(),
    }
}

fn emit_prelude(input: &GeneratorInput<'_>, out: &mut Vec<u8>) {
    if input.mode == OutputMode::Header {
        out.extend_from_slice(b"#pragma once\n");
    }

    if input.dependencies.is_empty() {
        if let Some(preamble) = input.preamble_source {
            let line = format!("#include \"{}\"\n", preamble.display());
            out.extend_from_slice(line.as_bytes());
        }
    } else {
        for dep in input.dependencies {
            let line = match input.mode {
                OutputMode::Header => {
                    format!("#include \"{}\"\n", dep.include_path.display())
                }
                OutputMode::DeclSurrogate => format!("#import {};\n", dep.unit_id),
            };
            out.extend_from_slice(line.as_bytes());
        }
    }
    out.push(b'\n');
}

fn emit_scope_open(input: &GeneratorInput<'_>, out: &mut Vec<u8>) {
    match input.mode {
        OutputMode::Header => {
            for component in input.unit_id.split("::") {
                let open = format!("namespace {component} {{ ");
                out.extend_from_slice(open.as_bytes());
            }
            out.push(b'\n');
        }
        OutputMode::DeclSurrogate => {
            let line = format!("unit {};\n", input.unit_id);
            out.extend_from_slice(line.as_bytes());
        }
    }
}

fn emit_scope_close(input: &GeneratorInput<'_>, out: &mut Vec<u8>) {
    if input.mode == OutputMode::Header {
        let depth = input.unit_id.split("::").count();
        out.extend_from_slice("}".repeat(depth).as_bytes());
        out.push(b'\n');
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fragment(start: u32, end: u32, action: FragmentAction) -> Fragment {
        Fragment { start, end, action }
    }

    fn input<'a>(
        mode: OutputMode,
        source: &'a [u8],
        fragments: &'a [Fragment],
        dependencies: &'a [DependencyRef],
    ) -> GeneratorInput<'a> {
        GeneratorInput {
            mode,
            unit_id: "pkg::UnitA",
            source,
            fragments,
            dependencies,
            preamble_source: None,
            origin: Path::new("pkg/UnitA.decl-ast.meta"),
        }
    }

    #[test]
    fn skip_removes_bodies() {
        let source = b"void f() { body(); }\nint x;\n";
        let fragments = [fragment(8, 20, FragmentAction::Skip)];
        let out = generate(&input(OutputMode::Header, source, &fragments, &[])).unwrap();
        let text = String::from_utf8(out).unwrap();
        assert!(text.contains("void f()"));
        assert!(!text.contains("body()"));
        assert!(text.contains("int x;"));
    }

    #[test]
    fn replace_with_semicolon_collapses_range() {
        let source = b"int g() { return 1; }";
        let fragments = [fragment(7, 21, FragmentAction::ReplaceWithSemicolon)];
        let out = generate(&input(OutputMode::Header, source, &fragments, &[])).unwrap();
        assert!(String::from_utf8(out).unwrap().ends_with("int g();"));
    }

    #[test]
    fn skip_in_header_only_survives_surrogates() {
        let source = b"AB";
        let fragments = [fragment(0, 1, FragmentAction::SkipInHeaderOnly)];

        let header = generate(&input(OutputMode::Header, source, &fragments, &[])).unwrap();
        assert!(String::from_utf8(header).unwrap().ends_with('B'));

        let surrogate =
            generate(&input(OutputMode::DeclSurrogate, source, &fragments, &[])).unwrap();
        assert!(String::from_utf8(surrogate).unwrap().ends_with("AB"));
    }

    #[test]
    fn put_extern_inserts_at_anchor() {
        let source = b"int counter;";
        let fragments = [fragment(0, 0, FragmentAction::PutExtern)];
        let out = generate(&input(OutputMode::Header, source, &fragments, &[])).unwrap();
        assert!(String::from_utf8(out)
            .unwrap()
            .contains("extern int counter;"));
    }

    #[test]
    fn unit_scope_wrapping_differs_per_mode() {
        // "unit pkg::UnitA;" spans bytes 0..16 and is replaced by the
        // scope opening; EOF close is a zero-width fragment at the end.
        let source = b"unit pkg::UnitA;\nint x;\n";
        let fragments = [
            fragment(0, 16, FragmentAction::StartUnit),
            fragment(24, 24, FragmentAction::EndUnitEOF),
        ];

        let header =
            generate(&input(OutputMode::Header, source, &fragments, &[])).unwrap();
        let header = String::from_utf8(header).unwrap();
        assert!(header.starts_with("#pragma once\n"));
        assert!(header.contains("namespace pkg { namespace UnitA {"));
        assert!(header.trim_end().ends_with("}}"));

        let surrogate =
            generate(&input(OutputMode::DeclSurrogate, source, &fragments, &[])).unwrap();
        let surrogate = String::from_utf8(surrogate).unwrap();
        assert!(surrogate.contains("unit pkg::UnitA;"));
        assert!(!surrogate.contains("namespace"));
    }

    #[test]
    fn dependencies_become_includes_or_imports() {
        let deps = [DependencyRef {
            unit_id: "pkg::Dep".into(),
            include_path: PathBuf::from("pkg/Dep.h"),
        }];
        let source = b"int x;\n";

        let header = generate(&input(OutputMode::Header, source, &[], &deps)).unwrap();
        assert!(String::from_utf8(header)
            .unwrap()
            .contains("#include \"pkg/Dep.h\""));

        let surrogate =
            generate(&input(OutputMode::DeclSurrogate, source, &[], &deps)).unwrap();
        assert!(String::from_utf8(surrogate)
            .unwrap()
            .contains("#import pkg::Dep;"));
    }

    #[test]
    fn no_dependencies_includes_preamble() {
        let source = b"int x;\n";
        let mut gen = input(OutputMode::Header, source, &[], &[]);
        gen.preamble_source = Some(Path::new("preamble.hpp"));
        let out = generate(&gen).unwrap();
        assert!(String::from_utf8(out)
            .unwrap()
            .contains("#include \"preamble.hpp\""));
    }

    #[test]
    fn out_of_bounds_fragment_is_rejected() {
        let source = b"short";
        let fragments = [fragment(2, 99, FragmentAction::Skip)];
        let err = generate(&input(OutputMode::Header, source, &fragments, &[])).unwrap_err();
        assert!(matches!(err, DriverError::MalformedFragments { .. }));
    }

    #[test]
    fn overlapping_fragments_are_rejected() {
        let source = b"0123456789";
        let fragments = [
            fragment(0, 5, FragmentAction::Skip),
            fragment(3, 7, FragmentAction::Skip),
        ];
        let err = generate(&input(OutputMode::Header, source, &fragments, &[])).unwrap_err();
        assert!(matches!(err, DriverError::MalformedFragments { .. }));
    }
}
