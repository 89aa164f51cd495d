//! Constant layout.
//!
//! [`build`] validates a [`ModuleSpec`] and turns it into a [`Unit`]: the
//! tree of static declarations the serializer writes out. All invariants of
//! the emitted data are settled here:
//!
//! - every size field is derived from the vector it describes,
//! - the globals table starts with the synthesized `__name__` entry,
//! - symbols are unique per table and keys unique per dictionary,
//! - objects come after everything they point at, and cycles are rejected,
//! - every symbol is interned before it is referenced.

use std::collections::{HashMap, HashSet};

use crate::error::{CodegenError, CodegenResult};
use crate::source_map::{DeclKind, SourceMap};
use crate::spec::{Binding, ConstObject, DictKey, ModuleSpec, NativeRef, ObjectDef, ValueRef};
use crate::symbol::{require_c_identifier, Symbol, SymbolTable};
use crate::EmitOptions;

/// Owner name used for the module globals in diagnostics.
pub const GLOBALS_TABLE: &str = "module globals";

// ══════════════════════════════════════════════════════════════════════════════
// Declaration Tree
// ══════════════════════════════════════════════════════════════════════════════

/// A value as it appears in ROM: one `mp_rom_obj_t` initializer.
#[derive(Debug, Clone, PartialEq)]
pub enum RomValue {
    Int(i64),
    Qstr(Symbol),
    True,
    False,
    None,
    /// Address of a static object.
    Ptr(String),
}

#[derive(Debug, Clone, PartialEq)]
pub struct MapEntry {
    pub key: RomValue,
    pub value: RomValue,
}

/// A fixed, ordered mapping table and the dictionary object wrapping it.
#[derive(Debug, Clone, PartialEq)]
pub struct MapTable {
    /// C name of the `mp_rom_map_elem_t` array.
    pub name: String,
    /// C name of the dictionary object.
    pub wrapper: String,
    /// Binding or object this table belongs to.
    pub owner: String,
    entries: Vec<MapEntry>,
}

impl MapTable {
    /// The table is never resized.
    pub const FIXED: bool = true;
    /// Lookups scan entries in order.
    pub const ORDERED: bool = true;
    /// Kept at 0 even though every globals key is a qstr.
    pub const ALL_KEYS_ARE_QSTRS: bool = false;

    fn new(name: String, wrapper: String, owner: &str) -> Self {
        Self {
            name,
            wrapper,
            owner: owner.to_string(),
            entries: Vec::new(),
        }
    }

    pub fn entries(&self) -> &[MapEntry] {
        &self.entries
    }

    pub fn used(&self) -> usize {
        self.entries.len()
    }

    pub fn alloc(&self) -> usize {
        self.entries.len()
    }
}

/// A constant tuple.
#[derive(Debug, Clone, PartialEq)]
pub struct FixedSequence {
    pub name: String,
    pub owner: String,
    items: Vec<RomValue>,
}

impl FixedSequence {
    pub fn items(&self) -> &[RomValue] {
        &self.items
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct FloatObject {
    pub name: String,
    pub value: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Declaration {
    Tuple(FixedSequence),
    Dict(MapTable),
    Float(FloatObject),
}

impl Declaration {
    /// C name other declarations use to point at this one.
    pub fn c_name(&self) -> &str {
        match self {
            Declaration::Tuple(t) => &t.name,
            Declaration::Dict(d) => &d.wrapper,
            Declaration::Float(f) => &f.name,
        }
    }
}

/// `extern const <c_type> <name>;`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Extern {
    pub c_type: &'static str,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModuleObject {
    pub name: String,
    /// Wrapper of the globals table.
    pub globals: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Registration {
    pub symbol: Symbol,
    pub module_object: String,
}

/// A validated translation unit, ready to serialize.
#[derive(Debug, Clone)]
pub struct Unit {
    pub module_name: String,
    /// Preprocessor flag guarding the whole unit.
    pub gate: String,
    pub symbols: SymbolTable,
    pub externs: Vec<Extern>,
    /// Constant objects, each after everything it points at.
    pub objects: Vec<Declaration>,
    pub globals: MapTable,
    pub module: ModuleObject,
    pub registration: Registration,
    pub source_map: SourceMap,
}

impl Unit {
    pub fn uses_float(&self) -> bool {
        self.objects
            .iter()
            .any(|d| matches!(d, Declaration::Float(_)))
    }
}

/// Default gate flag: `MODULE_<NAME>_ENABLED`.
pub fn default_enable_flag(module_name: &str) -> String {
    format!("MODULE_{}_ENABLED", module_name.to_ascii_uppercase())
}

// ══════════════════════════════════════════════════════════════════════════════
// Public API
// ══════════════════════════════════════════════════════════════════════════════

/// Validate `spec` and lay it out as a [`Unit`].
pub fn build(spec: &ModuleSpec, options: &EmitOptions) -> CodegenResult<Unit> {
    Builder::new(spec, options).build()
}

// ══════════════════════════════════════════════════════════════════════════════
// Builder
// ══════════════════════════════════════════════════════════════════════════════

#[derive(Clone, Copy, PartialEq, Eq)]
enum Visit {
    New,
    Active,
    Done,
}

struct Builder<'a> {
    spec: &'a ModuleSpec,
    options: &'a EmitOptions,
    module_name: &'a str,
    symbols: SymbolTable,
    /// Object name → index into `spec.objects`.
    object_index: HashMap<&'a str, usize>,
    /// Every C identifier declared by the unit, with its owner.
    c_names: HashMap<String, String>,
    externs: Vec<Extern>,
    source_map: SourceMap,
}

impl<'a> Builder<'a> {
    fn new(spec: &'a ModuleSpec, options: &'a EmitOptions) -> Self {
        let module_name = options.module_name.as_deref().unwrap_or(&spec.name);
        Self {
            spec,
            options,
            module_name,
            symbols: SymbolTable::new(),
            object_index: HashMap::new(),
            c_names: HashMap::new(),
            externs: Vec::new(),
            source_map: SourceMap::new(),
        }
    }

    fn build(mut self) -> CodegenResult<Unit> {
        let module_name = self.module_name;
        require_c_identifier(module_name)?;
        let gate = match &self.options.enable_flag {
            Some(flag) => flag.clone(),
            None => default_enable_flag(module_name),
        };
        require_c_identifier(&gate)?;

        let name_sym = self.symbols.intern("__name__")?;
        let module_sym = self.symbols.intern(module_name)?;

        let mut globals = MapTable::new(
            format!("{module_name}_module_globals_table"),
            format!("{module_name}_module_globals"),
            GLOBALS_TABLE,
        );
        let module = ModuleObject {
            name: format!("{module_name}_user_cmodule"),
            globals: globals.wrapper.clone(),
        };
        for name in [&globals.name, &globals.wrapper, &module.name] {
            self.claim(name, module_name)?;
        }

        self.index_objects()?;
        let order = self.dependency_order()?;
        let reachable = self.reachable()?;

        let spec = self.spec;
        let mut objects = Vec::new();
        for idx in order {
            if reachable[idx] {
                objects.push(self.lower_object(&spec.objects[idx])?);
            }
        }

        globals.entries.push(MapEntry {
            key: RomValue::Qstr(name_sym),
            value: RomValue::Qstr(module_sym),
        });
        let mut seen = HashSet::from([name_sym]);
        for binding in &spec.bindings {
            if let Some(previous) = self.symbols.clash(&binding.symbol) {
                return Err(CodegenError::DuplicateSymbol {
                    symbol: binding.symbol.clone(),
                    table: format!("{GLOBALS_TABLE} (same qstr as '{previous}')"),
                });
            }
            let entry = self.lower_binding(binding)?;
            if let RomValue::Qstr(sym) = entry.key {
                if !seen.insert(sym) {
                    return Err(CodegenError::DuplicateSymbol {
                        symbol: binding.symbol.clone(),
                        table: GLOBALS_TABLE.to_string(),
                    });
                }
            }
            globals.entries.push(entry);
        }

        Ok(Unit {
            module_name: module_name.to_string(),
            gate,
            symbols: self.symbols,
            externs: self.externs,
            objects,
            globals,
            module: module.clone(),
            registration: Registration {
                symbol: module_sym,
                module_object: module.name,
            },
            source_map: self.source_map,
        })
    }

    // ── Names ────────────────────────────────────────────────────────────────

    /// Reserve a C identifier for `owner`.
    fn claim(&mut self, c_name: &str, owner: &str) -> CodegenResult<()> {
        if let Some(previous) = self.c_names.get(c_name) {
            return Err(CodegenError::DuplicateSymbol {
                symbol: c_name.to_string(),
                table: format!("C declarations (already declared for '{previous}')"),
            });
        }
        self.c_names.insert(c_name.to_string(), owner.to_string());
        Ok(())
    }

    fn index_objects(&mut self) -> CodegenResult<()> {
        let spec = self.spec;
        for (idx, def) in spec.objects.iter().enumerate() {
            require_c_identifier(&def.name)?;
            if self.object_index.insert(def.name.as_str(), idx).is_some() {
                return Err(CodegenError::DuplicateSymbol {
                    symbol: def.name.clone(),
                    table: "constant objects".to_string(),
                });
            }
            self.claim(&object_c_name(def), &def.name)?;
            if matches!(def.object, ConstObject::Dict(_)) {
                self.claim(&format!("{}_dict_table", def.name), &def.name)?;
            }
        }
        Ok(())
    }

    fn lookup(&self, name: &str, context: &str) -> CodegenResult<usize> {
        self.object_index
            .get(name)
            .copied()
            .ok_or_else(|| CodegenError::UnresolvedSymbol {
                name: name.to_string(),
                context: context.to_string(),
            })
    }

    // ── Ordering ─────────────────────────────────────────────────────────────

    /// Depth-first post-order over the reference graph, starting from the
    /// objects in declaration order.
    fn dependency_order(&self) -> CodegenResult<Vec<usize>> {
        let count = self.spec.objects.len();
        let mut state = vec![Visit::New; count];
        let mut path = Vec::new();
        let mut order = Vec::with_capacity(count);
        for idx in 0..count {
            self.visit(idx, &mut state, &mut path, &mut order)?;
        }
        Ok(order)
    }

    fn visit(
        &self,
        idx: usize,
        state: &mut [Visit],
        path: &mut Vec<usize>,
        order: &mut Vec<usize>,
    ) -> CodegenResult<()> {
        match state[idx] {
            Visit::Done => return Ok(()),
            Visit::Active => {
                let start = path.iter().position(|&p| p == idx).unwrap_or(0);
                let mut cycle: Vec<String> = path[start..]
                    .iter()
                    .map(|&p| self.spec.objects[p].name.clone())
                    .collect();
                cycle.push(self.spec.objects[idx].name.clone());
                return Err(CodegenError::CyclicConstant { cycle });
            }
            Visit::New => {}
        }

        state[idx] = Visit::Active;
        path.push(idx);
        let def = &self.spec.objects[idx];
        for name in def.references() {
            let next = self.lookup(name, &def.name)?;
            self.visit(next, state, path, order)?;
        }
        path.pop();
        state[idx] = Visit::Done;
        order.push(idx);
        Ok(())
    }

    /// Objects reachable from the globals. Unreferenced objects are not
    /// emitted: an unused static would break `-Werror` builds.
    fn reachable(&self) -> CodegenResult<Vec<bool>> {
        let mut seen = vec![false; self.spec.objects.len()];
        let mut stack = Vec::new();
        for binding in &self.spec.bindings {
            if let ValueRef::Object(name) = &binding.value {
                stack.push(self.lookup(name, &binding.symbol)?);
            }
        }
        while let Some(idx) = stack.pop() {
            if std::mem::replace(&mut seen[idx], true) {
                continue;
            }
            let def = &self.spec.objects[idx];
            for name in def.references() {
                stack.push(self.lookup(name, &def.name)?);
            }
        }
        Ok(seen)
    }

    // ── Lowering ─────────────────────────────────────────────────────────────

    fn lower_object(&mut self, def: &ObjectDef) -> CodegenResult<Declaration> {
        let owner = def.name.as_str();
        let decl = match &def.object {
            ConstObject::Tuple(items) => {
                let mut seq = FixedSequence {
                    name: object_c_name(def),
                    owner: owner.to_string(),
                    items: Vec::with_capacity(items.len()),
                };
                for item in items {
                    seq.items.push(self.lower_value(item, owner)?);
                }
                Declaration::Tuple(seq)
            }
            ConstObject::Dict(entries) => {
                let mut table = MapTable::new(
                    format!("{owner}_dict_table"),
                    object_c_name(def),
                    owner,
                );
                let mut seen = HashSet::new();
                for (key, value) in entries {
                    if !seen.insert(key) {
                        return Err(CodegenError::DuplicateKey {
                            key: key.to_string(),
                            table: owner.to_string(),
                        });
                    }
                    let key = match key {
                        DictKey::Int(n) => RomValue::Int(self.check_int(*n, owner)?),
                        DictKey::Qstr(text) => {
                            if let Some(previous) = self.symbols.clash(text) {
                                return Err(CodegenError::DuplicateKey {
                                    key: format!("{key} (same qstr as '{previous}')"),
                                    table: owner.to_string(),
                                });
                            }
                            RomValue::Qstr(self.symbols.intern(text)?)
                        }
                    };
                    let value = self.lower_value(value, owner)?;
                    table.entries.push(MapEntry { key, value });
                }
                Declaration::Dict(table)
            }
            ConstObject::Float(value) => {
                if !value.is_finite() {
                    return Err(CodegenError::NonFiniteFloat {
                        object: owner.to_string(),
                    });
                }
                Declaration::Float(FloatObject {
                    name: object_c_name(def),
                    value: *value,
                })
            }
        };
        if let Some(span) = def.origin {
            let kind = match def.object {
                ConstObject::Tuple(_) => DeclKind::Tuple,
                ConstObject::Dict(_) => DeclKind::Dict,
                ConstObject::Float(_) => DeclKind::Float,
            };
            self.source_map.push(decl.c_name(), kind, span);
        }
        Ok(decl)
    }

    fn lower_binding(&mut self, binding: &Binding) -> CodegenResult<MapEntry> {
        let key = RomValue::Qstr(self.symbols.intern(&binding.symbol)?);
        let value = self.lower_value(&binding.value, &binding.symbol)?;
        if let Some(span) = binding.origin {
            self.source_map.push(&binding.symbol, DeclKind::Global, span);
        }
        Ok(MapEntry { key, value })
    }

    fn lower_value(&mut self, value: &ValueRef, owner: &str) -> CodegenResult<RomValue> {
        Ok(match value {
            ValueRef::Int(n) => RomValue::Int(self.check_int(*n, owner)?),
            ValueRef::Qstr(text) => RomValue::Qstr(self.symbols.intern(text)?),
            ValueRef::Bool(true) => RomValue::True,
            ValueRef::Bool(false) => RomValue::False,
            ValueRef::None => RomValue::None,
            ValueRef::Object(name) => {
                let idx = self.lookup(name, owner)?;
                RomValue::Ptr(object_c_name(&self.spec.objects[idx]))
            }
            ValueRef::Native(native) => {
                self.declare_extern(native, owner)?;
                RomValue::Ptr(native.c_name.clone())
            }
        })
    }

    fn declare_extern(&mut self, native: &NativeRef, owner: &str) -> CodegenResult<()> {
        require_c_identifier(&native.c_name)?;
        let c_type = native.c_type();
        if let Some(existing) = self.externs.iter().find(|e| e.name == native.c_name) {
            if existing.c_type == c_type {
                return Ok(());
            }
            return Err(CodegenError::DuplicateSymbol {
                symbol: native.c_name.clone(),
                table: "extern declarations".to_string(),
            });
        }
        self.claim(&native.c_name, owner)?;
        self.externs.push(Extern {
            c_type,
            name: native.c_name.clone(),
        });
        Ok(())
    }

    /// Integers are stored as small ints, which hold `bits` bits including
    /// the sign.
    fn check_int(&self, value: i64, owner: &str) -> CodegenResult<i64> {
        let bits = self.options.small_int_bits.clamp(2, 64);
        let max = (1i128 << (bits - 1)) - 1;
        let min = -(1i128 << (bits - 1));
        if (min..=max).contains(&(value as i128)) {
            Ok(value)
        } else {
            Err(CodegenError::IntegerOutOfRange {
                value,
                bits,
                context: owner.to_string(),
            })
        }
    }
}

/// C name of the object other declarations point at.
fn object_c_name(def: &ObjectDef) -> String {
    format!("{}_{}", def.name, def.object.kind_name())
}
