//! C serialization of a laid-out [`Unit`].
//!
//! Output order inside the feature gate:
//! 1. helper types and macros, only those the unit needs
//! 2. `extern` declarations of native function objects
//! 3. constant objects (dependency order)
//! 4. the globals table and its dictionary
//! 5. the module object
//! 6. the registration record

use crate::error::{CodegenError, CodegenResult};
use crate::layout::{Declaration, FixedSequence, FloatObject, MapTable, RomValue, Unit};
use crate::writer::CWriter;
use crate::EmitOptions;

/// Render `unit` as one C translation unit.
pub fn render(unit: &Unit, options: &EmitOptions) -> CodegenResult<String> {
    let mut emitter = Emitter {
        unit,
        options,
        w: CWriter::new(),
    };
    emitter.emit_unit()?;
    Ok(emitter.w.finish())
}

/// The flag test shared by `#if` and the closing `#endif` comment.
fn gate_condition(gate: &str) -> String {
    format!("defined({gate}) && {gate}")
}

struct Emitter<'a> {
    unit: &'a Unit,
    options: &'a EmitOptions,
    w: CWriter,
}

impl Emitter<'_> {
    fn emit_unit(&mut self) -> CodegenResult<()> {
        let condition = gate_condition(&self.unit.gate);

        self.emit_header();
        self.w.emit_line("#include \"py/runtime.h\"");
        self.w.blank_line();
        self.w.emit_line(&format!("#if {condition}"));
        self.w.blank_line();

        self.emit_helpers();
        self.emit_externs();
        for decl in &self.unit.objects {
            match decl {
                Declaration::Tuple(seq) => self.emit_tuple(seq)?,
                Declaration::Dict(table) => {
                    self.emit_map_table(table)?;
                    self.w.emit_line(&format!(
                        "static MP_DEFINE_DICT({}, {});",
                        table.wrapper, table.name
                    ));
                }
                Declaration::Float(float) => self.emit_float(float),
            }
            self.w.blank_line();
        }

        let globals = &self.unit.globals;
        self.emit_map_table(globals)?;
        self.w.emit_line(&format!(
            "static MP_DEFINE_CONST_DICT({}, {});",
            globals.wrapper, globals.name
        ));
        self.w.blank_line();

        self.emit_module();
        self.w.blank_line();

        let registration = &self.unit.registration;
        self.w.emit_line(&format!(
            "MP_REGISTER_MODULE({}, {});",
            self.unit.symbols.c_name(registration.symbol),
            registration.module_object
        ));
        self.w.blank_line();
        self.w.emit_line(&format!("#endif /* {condition} */"));
        Ok(())
    }

    // ── Preamble ─────────────────────────────────────────────────────────────

    fn emit_header(&mut self) {
        let source = match &self.options.source_name {
            Some(name) => name.as_str(),
            None => "a python file",
        };
        self.w.emit_line("/** -*- mode: c-mode -*-");
        self.w
            .emit_line(&format!(" * @file   {}.c", self.unit.module_name));
        if let Some(timestamp) = &self.options.timestamp {
            self.w.emit_line(&format!(" * @date   {timestamp}"));
        }
        self.w.emit_line(" * @brief  generated");
        self.w.emit_line(" *");
        self.w
            .emit_line(&format!(" * This code was automatically generated from {source}."));
        self.w.emit_line(" *");
        self.w.emit_line(" * DO NOT MODIFY THIS FILE BY HAND.");
        self.w.emit_line(" */");
    }

    fn emit_helpers(&mut self) {
        if self.unit.uses_float() {
            self.w.emit_lines(FLOAT_TYPEDEF);
            self.w.blank_line();
        }
        let objects = &self.unit.objects;
        if objects.iter().any(|d| matches!(d, Declaration::Tuple(_))) {
            self.w.emit_lines(TUPLE_MACRO);
            self.w.blank_line();
        }
        if objects.iter().any(|d| matches!(d, Declaration::Dict(_))) {
            self.w.emit_lines(&dict_macro());
            self.w.blank_line();
        }
    }

    fn emit_externs(&mut self) {
        if self.unit.externs.is_empty() {
            return;
        }
        for ext in &self.unit.externs {
            self.w
                .emit_line(&format!("extern const {} {};", ext.c_type, ext.name));
        }
        self.w.blank_line();
    }

    // ── Objects ──────────────────────────────────────────────────────────────

    fn emit_tuple(&mut self, seq: &FixedSequence) -> CodegenResult<()> {
        let items: Vec<String> = seq.items().iter().map(|v| self.rom_value(v)).collect();
        check_size(&seq.owner, seq.len(), items.len())?;

        if items.is_empty() {
            self.w
                .emit_line(&format!("static MP_DEFINE_TUPLE({}, 0, );", seq.name));
            return Ok(());
        }
        self.w
            .emit_line(&format!("static MP_DEFINE_TUPLE({}, {},", seq.name, seq.len()));
        self.w.indent();
        let last = items.len() - 1;
        for (i, item) in items.iter().enumerate() {
            if i == last {
                self.w.emit_line(&format!("{item});"));
            } else {
                self.w.emit_line(&format!("{item},"));
            }
        }
        self.w.dedent();
        Ok(())
    }

    fn emit_map_table(&mut self, table: &MapTable) -> CodegenResult<()> {
        let rows: Vec<String> = table
            .entries()
            .iter()
            .map(|e| format!("{{ {}, {} }},", self.rom_value(&e.key), self.rom_value(&e.value)))
            .collect();
        check_size(&table.owner, table.used(), rows.len())?;
        check_size(&table.owner, table.alloc(), rows.len())?;

        self.w.emit_line(&format!(
            "static const mp_rom_map_elem_t {}[] = {{",
            table.name
        ));
        self.w.indent();
        for row in &rows {
            self.w.emit_line(row);
        }
        self.w.dedent();
        self.w.emit_line("};");
        Ok(())
    }

    fn emit_float(&mut self, float: &FloatObject) {
        self.w.emit_line(&format!(
            "static const mp_obj_float_t {} = {{{{&mp_type_float}}, (mp_float_t){:?}}};",
            float.name, float.value
        ));
    }

    // ── Module ───────────────────────────────────────────────────────────────

    fn emit_module(&mut self) {
        let module = &self.unit.module;
        self.w
            .emit_line(&format!("const mp_obj_module_t {} = {{", module.name));
        self.w.indent();
        self.w.emit_line(".base = { &mp_type_module },");
        self.w
            .emit_line(&format!(".globals = (mp_obj_dict_t *)&{},", module.globals));
        self.w.dedent();
        self.w.emit_line("};");
    }

    fn rom_value(&self, value: &RomValue) -> String {
        match value {
            RomValue::Int(n) => format!("MP_ROM_INT({n})"),
            RomValue::Qstr(sym) => format!("MP_ROM_QSTR({})", self.unit.symbols.c_name(*sym)),
            RomValue::True => "MP_ROM_TRUE".to_string(),
            RomValue::False => "MP_ROM_FALSE".to_string(),
            RomValue::None => "MP_ROM_NONE".to_string(),
            RomValue::Ptr(name) => format!("MP_ROM_PTR(&{name})"),
        }
    }
}

fn check_size(table: &str, declared: usize, actual: usize) -> CodegenResult<()> {
    if declared == actual {
        Ok(())
    } else {
        Err(CodegenError::SizeInvariant {
            table: table.to_string(),
            declared,
            actual,
        })
    }
}

// ══════════════════════════════════════════════════════════════════════════════
// Helper Definitions
// ══════════════════════════════════════════════════════════════════════════════

const FLOAT_TYPEDEF: &str = "\
typedef struct _mp_obj_float_t {
    mp_obj_base_t base;
    mp_float_t value;
} mp_obj_float_t;
";

const TUPLE_MACRO: &str = "\
/**
 * Constant tuple, adapted from MP_DEFINE_ATTRTUPLE in py/objtuple.h.
 */
#define MP_DEFINE_TUPLE(tuple_obj_name, nitems, ...) \\
    const mp_rom_obj_tuple_t tuple_obj_name = { \\
        .base = {&mp_type_tuple}, \\
        .len = nitems, \\
        .items = { __VA_ARGS__ } \\
    }
";

fn dict_macro() -> String {
    let flag = |b: bool| u8::from(b);
    format!(
        "\
/**
 * Constant dictionary over a fixed, ordered map.
 */
#define MP_DEFINE_DICT(dict_name, table_name) \\
    const mp_obj_dict_t dict_name = {{ \\
        .base = {{&mp_type_dict}}, \\
        .map = {{ \\
            .all_keys_are_qstrs = {keys}, \\
            .is_fixed = {fixed}, \\
            .is_ordered = {ordered}, \\
            .used = MP_ARRAY_SIZE(table_name), \\
            .alloc = MP_ARRAY_SIZE(table_name), \\
            .table = (mp_map_elem_t *)(mp_rom_map_elem_t *)table_name, \\
        }}, \\
    }}
",
        keys = flag(MapTable::ALL_KEYS_ARE_QSTRS),
        fixed = flag(MapTable::FIXED),
        ordered = flag(MapTable::ORDERED),
    )
}
