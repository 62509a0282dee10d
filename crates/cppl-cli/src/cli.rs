//! Command-line interface definition.

use clap::Parser;
use std::path::PathBuf;

use cppl_driver::commands::tokenize_args;
use cppl_driver::DriverConfig;

/// cppl-build - build coordinator for the cppl toolchain
#[derive(Parser, Debug)]
#[command(
    name = "cppl-build",
    version,
    about = "Coordinates incremental builds of cppl unit projects",
    long_about = "cppl-build discovers the project's unit sources, extracts their \
                  imports through the front-end, schedules per-unit declaration and \
                  object compiles with bounded parallelism, and links the result or \
                  emits library headers. Rebuilds are driven by content hashes, so \
                  an unchanged tree builds nothing."
)]
pub struct Cli {
    /// Project source root
    #[arg(short = 'r', long, default_value = ".")]
    pub root: PathBuf,

    /// Build root; artifacts and dependency records live here
    #[arg(long, default_value = "./build")]
    pub build_root: PathBuf,

    /// Preamble source; enables the precompiled-preamble phase
    #[arg(long)]
    pub preamble: Option<PathBuf>,

    /// Output executable path (`a.out` by default)
    #[arg(short = 'o', long)]
    pub output: Option<PathBuf>,

    /// Compile without linking; headers/surrogates become the output
    #[arg(short = 'c', long = "no-link")]
    pub no_link: bool,

    /// Generate headers for public declarations into this directory
    #[arg(long)]
    pub headers_out: Option<PathBuf>,

    /// Generate declaration surrogates for public units into this directory
    #[arg(long)]
    pub decl_out: Option<PathBuf>,

    /// Parallel jobs (`-j4` also accepted); defaults to the CPU count
    #[arg(short = 'j', long)]
    pub jobs: Option<usize>,

    /// stdlib identifier forwarded to the front-end
    #[arg(long)]
    pub stdlib: Option<String>,

    /// External library source root (repeatable)
    #[arg(long = "lib-root")]
    pub lib_roots: Vec<PathBuf>,

    /// Include search path forwarded to the front-end (repeatable)
    #[arg(short = 'I', long = "include")]
    pub includes: Vec<PathBuf>,

    /// Front-end binary (default: `cpplc` next to this binary, then PATH)
    #[arg(long)]
    pub frontend: Option<PathBuf>,

    /// Extra front-end arguments for the preamble phase (quoted string)
    #[arg(long, allow_hyphen_values = true)]
    pub preamble_args: Option<String>,

    /// Extra front-end arguments for parse phases (quoted string)
    #[arg(long, allow_hyphen_values = true)]
    pub parse_args: Option<String>,

    /// Extra front-end arguments for codegen phases (quoted string)
    #[arg(long, allow_hyphen_values = true)]
    pub codegen_args: Option<String>,

    /// Extra linker arguments (quoted string)
    #[arg(long, allow_hyphen_values = true)]
    pub link_args: Option<String>,

    /// Debug-level logging
    #[arg(long, conflicts_with = "trace")]
    pub verbose: bool,

    /// Trace-level logging (includes the dependency graph dump)
    #[arg(long)]
    pub trace: bool,

    /// Print every command without executing anything
    #[arg(long)]
    pub dry_run: bool,
}

impl Cli {
    /// Resolve the parsed arguments into a driver configuration.
    pub fn into_config(self) -> DriverConfig {
        let tokenized = |s: Option<String>| s.map(|s| tokenize_args(&s)).unwrap_or_default();

        DriverConfig {
            sources_root: self.root,
            build_root: self.build_root,
            output: self.output,
            link: !self.no_link,
            headers_dir: self.headers_out,
            decls_dir: self.decl_out,
            preamble_source: self.preamble,
            jobs: self.jobs.unwrap_or_else(num_jobs_default).max(1),
            stdlib: self.stdlib,
            lib_roots: self.lib_roots,
            include_dirs: self.includes,
            frontend: self.frontend,
            extra_preamble_args: tokenized(self.preamble_args),
            extra_parse_args: tokenized(self.parse_args),
            extra_codegen_args: tokenized(self.codegen_args),
            extra_link_args: tokenized(self.link_args),
            verbose: self.verbose,
            dry_run: self.dry_run,
        }
    }
}

fn num_jobs_default() -> usize {
    DriverConfig::default().jobs
}
