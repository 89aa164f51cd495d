use std::path::{Path, PathBuf};

use clap::Parser;
use cmod_codegen::DEFAULT_SMALL_INT_BITS;

#[derive(Parser, Debug)]
#[command(name = "mpy-cmod", version)]
#[command(about = "MicroPython C code generator", long_about = None)]
pub struct Cli {
    /// Python file to parse
    #[arg(short = 'f', long)]
    pub filename: PathBuf,

    /// Directory for the C module (defaults to the module name)
    #[arg(short = 'd', long)]
    pub directory: Option<PathBuf>,

    /// Remove the existing module directory first
    #[arg(long)]
    pub clear: bool,

    /// Do nothing if the module directory exists
    #[arg(long)]
    pub make: bool,

    /// Python module to generate (defaults to the file name without extension)
    #[arg(long)]
    pub modulename: Option<String>,

    /// Print the C unit instead of writing the module directory
    #[arg(long)]
    pub stdout: bool,

    /// Print the compile result as JSON instead of writing files
    #[arg(long, conflicts_with = "stdout")]
    pub json: bool,

    /// Preprocessor flag gating the unit (default MODULE_<NAME>_ENABLED)
    #[arg(long, value_name = "FLAG")]
    pub enable_flag: Option<String>,

    /// Also write qstrdefs.<module>.h
    #[arg(long)]
    pub qstrdefs: bool,

    /// Date text written into the file header
    #[arg(long, value_name = "TEXT")]
    pub timestamp: Option<String>,

    /// Width of a small int in bits, sign included
    #[arg(long, value_name = "BITS", default_value_t = DEFAULT_SMALL_INT_BITS,
          value_parser = clap::value_parser!(u32).range(2..=64))]
    pub small_int_bits: u32,
}

impl Cli {
    /// `--modulename`, or the file name without its extension.
    pub fn module_name(&self) -> String {
        match &self.modulename {
            Some(name) => name.clone(),
            None => self
                .filename
                .file_stem()
                .map(|s| s.to_string_lossy().into_owned())
                .unwrap_or_default(),
        }
    }

    /// `--directory`, or a directory named after the module.
    pub fn module_directory(&self) -> PathBuf {
        match &self.directory {
            Some(dir) => dir.clone(),
            None => Path::new(&self.module_name()).to_path_buf(),
        }
    }

    /// Whether the run writes into the module directory.
    pub fn writes_files(&self) -> bool {
        !self.stdout && !self.json
    }
}
