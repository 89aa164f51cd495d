//! C code generator for MicroPython native modules.
//!
//! # Architecture
//!
//! The generator takes a [`ModuleSpec`] (an ordered list of bindings plus the
//! constant objects they point at) and produces one self-contained C
//! translation unit that registers the module with the firmware:
//!
//! 1. [`layout::build`] validates the description and settles every size,
//!    name, and ordering decision into a [`layout::Unit`].
//! 2. [`emit::render`] serializes the unit as C text.
//! 3. [`makefile::render`] writes the matching `micropython.mk` fragment.
//!
//! ## Emitted objects
//! - `<name>_tuple`: `mp_rom_obj_tuple_t`
//! - `<name>_dict_table` / `<name>_dict`: fixed, ordered map and its dict
//! - `<name>_float`: boxed `mp_obj_float_t`
//! - `<module>_module_globals_table` / `<module>_module_globals`
//! - `<module>_user_cmodule` plus `MP_REGISTER_MODULE`
//!
//! Everything except the `#include` is wrapped in
//! `#if defined(<FLAG>) && <FLAG>`.

pub mod emit;
pub mod error;
pub mod layout;
pub mod makefile;
pub mod source_map;
pub mod spec;
pub mod symbol;
pub mod writer;

use serde::{Deserialize, Serialize};

pub use error::{CodegenError, CodegenResult};
pub use layout::{default_enable_flag, Unit};
pub use source_map::SourceMap;
pub use spec::{Binding, ConstObject, DictKey, ModuleSpec, NativeKind, NativeRef, ObjectDef, ValueRef};
pub use symbol::{qstr_escape, Symbol, SymbolTable};

/// Width of a MicroPython small int on 32-bit ports.
pub const DEFAULT_SMALL_INT_BITS: u32 = 31;

/// Knobs of a single generation run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmitOptions {
    /// Overrides [`ModuleSpec::name`].
    #[serde(default)]
    pub module_name: Option<String>,
    /// Preprocessor flag gating the unit; defaults to `MODULE_<NAME>_ENABLED`.
    #[serde(default)]
    pub enable_flag: Option<String>,
    /// Bits of a small int including the sign; integers outside are rejected.
    #[serde(default = "default_small_int_bits")]
    pub small_int_bits: u32,
    /// Written as `@date` in the header. Omitted when `None`, which keeps
    /// the output byte-identical across runs.
    #[serde(default)]
    pub timestamp: Option<String>,
    /// Description file named in the header comment.
    #[serde(default)]
    pub source_name: Option<String>,
}

fn default_small_int_bits() -> u32 {
    DEFAULT_SMALL_INT_BITS
}

impl Default for EmitOptions {
    fn default() -> Self {
        Self {
            module_name: None,
            enable_flag: None,
            small_int_bits: DEFAULT_SMALL_INT_BITS,
            timestamp: None,
            source_name: None,
        }
    }
}

/// Everything one run produces.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeneratedUnit {
    pub module_name: String,
    /// Feature flag the C unit is gated on.
    pub gate: String,
    /// `<module>.c`
    pub code: String,
    /// `micropython.mk` without the qstrdefs header; see
    /// [`GeneratedUnit::makefile_with_qstrdefs`].
    pub makefile: String,
    /// `Q(...)` lines for every interned symbol, in interning order.
    pub qstrdefs: String,
    pub source_map: SourceMap,
}

impl GeneratedUnit {
    /// File name of the C unit.
    pub fn c_file_name(&self) -> String {
        format!("{}.c", self.module_name)
    }

    /// File name of the qstrdefs header.
    pub fn qstrdefs_file_name(&self) -> String {
        makefile::qstrdefs_file_name(&self.module_name)
    }

    /// `micropython.mk` for a module directory that also holds the qstrdefs
    /// header.
    pub fn makefile_with_qstrdefs(&self) -> String {
        makefile::render(&self.module_name, &self.gate, true)
    }
}

/// Generate the C unit and its build fragment for `spec`.
///
/// Fails without producing any text if the description violates a layout
/// invariant (duplicate symbol or key, cycle, unresolved reference, value
/// out of range, or a symbol that cannot be escaped).
pub fn emit(spec: &ModuleSpec, options: &EmitOptions) -> CodegenResult<GeneratedUnit> {
    let unit = layout::build(spec, options)?;
    let code = emit::render(&unit, options)?;
    Ok(GeneratedUnit {
        makefile: makefile::render(&unit.module_name, &unit.gate, false),
        qstrdefs: unit.symbols.qstrdefs(),
        module_name: unit.module_name,
        gate: unit.gate,
        code,
        source_map: unit.source_map,
    })
}
