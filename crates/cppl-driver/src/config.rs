//! Driver configuration and defaults.

use std::path::{Path, PathBuf};
use tracing::debug;

use cppl_core::paths::{LIBS_SUBDIR, PREAMBLE_OUT};

/// Default values applied when the CLI leaves an option unset.
pub mod defaults {
    /// Project source root.
    pub const SOURCES_ROOT: &str = ".";
    /// Build root; artifacts and records live under it.
    pub const BUILD_ROOT: &str = "./build";
    /// Output executable when linking.
    pub const OUTPUT_EXECUTABLE: &str = "a.out";
    /// Front-end binary name when none is configured.
    pub const FRONTEND_BIN: &str = "cpplc";
}

/// Everything a build run needs to know, fully resolved.
#[derive(Debug, Clone)]
pub struct DriverConfig {
    pub sources_root: PathBuf,
    pub build_root: PathBuf,
    /// Output executable path; `None` means the default.
    pub output: Option<PathBuf>,
    /// `false` disables the link phase (`-c`); headers/surrogates emitted
    /// during codegen are then the build output.
    pub link: bool,
    /// Enables header generation for public declarations.
    pub headers_dir: Option<PathBuf>,
    /// Enables declaration-surrogate generation for public declarations.
    pub decls_dir: Option<PathBuf>,
    /// Enables the preamble phase; path of the PCH source.
    pub preamble_source: Option<PathBuf>,
    pub jobs: usize,
    pub stdlib: Option<String>,
    /// External library source roots; their units contribute declaration
    /// nodes only.
    pub lib_roots: Vec<PathBuf>,
    /// Include search paths forwarded to every front-end invocation.
    pub include_dirs: Vec<PathBuf>,
    /// Front-end binary; `None` resolves `cpplc` next to the running
    /// binary, falling back to `PATH`.
    pub frontend: Option<PathBuf>,
    pub extra_preamble_args: Vec<String>,
    pub extra_parse_args: Vec<String>,
    pub extra_codegen_args: Vec<String>,
    pub extra_link_args: Vec<String>,
    pub verbose: bool,
    /// Print every command without executing anything.
    pub dry_run: bool,
}

impl Default for DriverConfig {
    fn default() -> Self {
        Self {
            sources_root: PathBuf::from(defaults::SOURCES_ROOT),
            build_root: PathBuf::from(defaults::BUILD_ROOT),
            output: None,
            link: true,
            headers_dir: None,
            decls_dir: None,
            preamble_source: None,
            jobs: num_cpus::get(),
            stdlib: None,
            lib_roots: Vec::new(),
            include_dirs: Vec::new(),
            frontend: None,
            extra_preamble_args: Vec::new(),
            extra_parse_args: Vec::new(),
            extra_codegen_args: Vec::new(),
            extra_link_args: Vec::new(),
            verbose: false,
            dry_run: false,
        }
    }
}

impl DriverConfig {
    pub fn preamble_requested(&self) -> bool {
        self.preamble_source.is_some()
    }

    pub fn headers_requested(&self) -> bool {
        self.headers_dir.is_some()
    }

    pub fn decls_requested(&self) -> bool {
        self.decls_dir.is_some()
    }

    /// The resolved link output path.
    pub fn output_path(&self) -> PathBuf {
        self.output
            .clone()
            .unwrap_or_else(|| PathBuf::from(defaults::OUTPUT_EXECUTABLE))
    }

    /// Where the compiled preamble lands.
    pub fn preamble_output(&self) -> PathBuf {
        self.build_root.join(PREAMBLE_OUT)
    }

    pub fn preamble_meta(&self) -> PathBuf {
        let mut name = PREAMBLE_OUT.to_string();
        name.push_str(".meta");
        self.build_root.join(name)
    }

    /// Root of external-library artifacts under the build root.
    pub fn libs_root(&self) -> PathBuf {
        self.build_root.join(LIBS_SUBDIR)
    }

    /// Resolve the front-end binary: explicit setting, else a sibling of
    /// the running executable, else the bare name for `PATH` lookup.
    pub fn frontend_path(&self) -> PathBuf {
        if let Some(frontend) = &self.frontend {
            return frontend.clone();
        }
        if let Ok(current) = std::env::current_exe() {
            if let Some(dir) = current.parent() {
                let sibling = dir.join(defaults::FRONTEND_BIN);
                if sibling.exists() {
                    return sibling;
                }
            }
        }
        PathBuf::from(defaults::FRONTEND_BIN)
    }

    /// The build root path to exclude while collecting project sources,
    /// when it is nested inside the project root.
    pub fn build_root_within_sources(&self) -> Option<&Path> {
        self.build_root
            .starts_with(&self.sources_root)
            .then_some(self.build_root.as_path())
    }

    /// Log the resolved parameters at debug level.
    pub fn dump_parameters(&self) {
        debug!(
            sources_root = %self.sources_root.display(),
            build_root = %self.build_root.display(),
            output = %self.output_path().display(),
            jobs = self.jobs,
            link = self.link,
            preamble = ?self.preamble_source,
            headers = ?self.headers_dir,
            decls = ?self.decls_dir,
            lib_roots = ?self.lib_roots,
            dry_run = self.dry_run,
            "driver parameters"
        );
    }
}
