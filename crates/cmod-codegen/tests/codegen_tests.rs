//! Integration tests for the C code generator.
//!
//! Tests validate:
//! - Globals table shape (`__name__` first, declaration order, sizes)
//! - Constant tuples, dictionaries, and floats
//! - Feature gate and header
//! - Deterministic output (same input → same bytes)
//! - Layout errors abort generation

use cmod_codegen::{
    emit, CodegenError, ConstObject, DictKey, EmitOptions, GeneratedUnit, ModuleSpec, NativeKind,
    NativeRef, ValueRef,
};
use cmod_types::Span;

// ══════════════════════════════════════════════════════════════════════════════
// Helpers
// ══════════════════════════════════════════════════════════════════════════════

/// Generate with default options (panics on error).
fn generate(spec: &ModuleSpec) -> GeneratedUnit {
    emit(spec, &EmitOptions::default()).unwrap_or_else(|e| panic!("codegen failed: {e}"))
}

fn native(c_name: &str, kind: NativeKind) -> ValueRef {
    ValueRef::Native(NativeRef::new(c_name, kind))
}

fn object(name: &str) -> ValueRef {
    ValueRef::Object(name.to_string())
}

/// Index of the first line equal to `line`.
fn line_index(code: &str, line: &str) -> usize {
    code.lines()
        .position(|l| l == line)
        .unwrap_or_else(|| panic!("line not found: {line}\n---\n{code}"))
}

/// The `mymod` example: one native function and one integer.
fn mymod() -> ModuleSpec {
    ModuleSpec::new("mymod")
        .bind("foo", native("mymod_foo_obj", NativeKind::Fixed(0)))
        .bind("BAR", ValueRef::Int(42))
}

/// A board description touching every object kind.
fn board() -> ModuleSpec {
    ModuleSpec::new("board")
        .object(
            "PINS",
            ConstObject::Dict(vec![
                (DictKey::Qstr("led".into()), ValueRef::Int(25)),
                (DictKey::Qstr("button".into()), ValueRef::Int(14)),
                (DictKey::Int(0), object("UART")),
            ]),
        )
        .object(
            "UART",
            ConstObject::Tuple(vec![ValueRef::Int(0), ValueRef::Int(1)]),
        )
        .object("SCALE", ConstObject::Float(2.5))
        .bind("LED_PIN", ValueRef::Int(25))
        .bind("NAME", ValueRef::Qstr("pico".into()))
        .bind("DEBUG", ValueRef::Bool(false))
        .bind("FAST", ValueRef::Bool(true))
        .bind("NOTHING", ValueRef::None)
        .bind("PINS", object("PINS"))
        .bind("SCALE", object("SCALE"))
        .bind("blink", native("board_blink_obj", NativeKind::Fixed(1)))
        .bind("configure", native("board_configure_obj", NativeKind::Var))
}

// ══════════════════════════════════════════════════════════════════════════════
// Module Globals
// ══════════════════════════════════════════════════════════════════════════════

#[test]
fn test_mymod_globals_block() {
    let unit = generate(&mymod());
    let expected = "\
static const mp_rom_map_elem_t mymod_module_globals_table[] = {
    { MP_ROM_QSTR(MP_QSTR___name__), MP_ROM_QSTR(MP_QSTR_mymod) },
    { MP_ROM_QSTR(MP_QSTR_foo), MP_ROM_PTR(&mymod_foo_obj) },
    { MP_ROM_QSTR(MP_QSTR_BAR), MP_ROM_INT(42) },
};
static MP_DEFINE_CONST_DICT(mymod_module_globals, mymod_module_globals_table);

const mp_obj_module_t mymod_user_cmodule = {
    .base = { &mp_type_module },
    .globals = (mp_obj_dict_t *)&mymod_module_globals,
};

MP_REGISTER_MODULE(MP_QSTR_mymod, mymod_user_cmodule);

#endif /* defined(MODULE_MYMOD_ENABLED) && MODULE_MYMOD_ENABLED */
";
    assert!(
        unit.code.ends_with(expected),
        "unexpected tail:\n{}",
        unit.code
    );
    assert!(unit
        .code
        .contains("extern const mp_obj_fun_builtin_fixed_t mymod_foo_obj;\n"));
}

#[test]
fn test_empty_module() {
    let unit = generate(&ModuleSpec::new("empty"));
    let table_start = line_index(
        &unit.code,
        "static const mp_rom_map_elem_t empty_module_globals_table[] = {",
    );
    let lines: Vec<&str> = unit.code.lines().collect();
    assert_eq!(
        lines[table_start + 1],
        "    { MP_ROM_QSTR(MP_QSTR___name__), MP_ROM_QSTR(MP_QSTR_empty) },"
    );
    assert_eq!(lines[table_start + 2], "};");
    assert!(!unit.code.contains("extern "));
    assert!(!unit.code.contains("#define MP_DEFINE_TUPLE"));
    assert!(!unit.code.contains("#define MP_DEFINE_DICT"));
}

#[test]
fn test_globals_follow_binding_order() {
    let unit = generate(&board());
    let order = [
        "MP_QSTR___name__",
        "MP_QSTR_LED_PIN",
        "MP_QSTR_NAME",
        "MP_QSTR_DEBUG",
        "MP_QSTR_FAST",
        "MP_QSTR_NOTHING",
        "MP_QSTR_PINS",
        "MP_QSTR_SCALE",
        "MP_QSTR_blink",
        "MP_QSTR_configure",
    ];
    let positions: Vec<usize> = order
        .iter()
        .map(|q| {
            let row = format!("    {{ MP_ROM_QSTR({q}), ");
            unit.code
                .lines()
                .position(|l| l.starts_with(&row))
                .unwrap_or_else(|| panic!("missing globals row for {q}"))
        })
        .collect();
    assert!(positions.windows(2).all(|w| w[0] + 1 == w[1]));
}

#[test]
fn test_scalar_values() {
    let unit = generate(&board());
    let code = &unit.code;
    assert!(code.contains("{ MP_ROM_QSTR(MP_QSTR_LED_PIN), MP_ROM_INT(25) },"));
    assert!(code.contains("{ MP_ROM_QSTR(MP_QSTR_NAME), MP_ROM_QSTR(MP_QSTR_pico) },"));
    assert!(code.contains("{ MP_ROM_QSTR(MP_QSTR_DEBUG), MP_ROM_FALSE },"));
    assert!(code.contains("{ MP_ROM_QSTR(MP_QSTR_FAST), MP_ROM_TRUE },"));
    assert!(code.contains("{ MP_ROM_QSTR(MP_QSTR_NOTHING), MP_ROM_NONE },"));
}

#[test]
fn test_negative_int() {
    let unit = generate(&ModuleSpec::new("m").bind("OFFSET", ValueRef::Int(-5)));
    assert!(unit
        .code
        .contains("{ MP_ROM_QSTR(MP_QSTR_OFFSET), MP_ROM_INT(-5) },"));
}

#[test]
fn test_natives_by_arity() {
    let unit = generate(&board());
    assert!(unit
        .code
        .contains("extern const mp_obj_fun_builtin_fixed_t board_blink_obj;"));
    assert!(unit
        .code
        .contains("extern const mp_obj_fun_builtin_var_t board_configure_obj;"));
    assert!(unit
        .code
        .contains("{ MP_ROM_QSTR(MP_QSTR_blink), MP_ROM_PTR(&board_blink_obj) },"));
}

// ══════════════════════════════════════════════════════════════════════════════
// Constant Objects
// ══════════════════════════════════════════════════════════════════════════════

#[test]
fn test_tuple_declaration() {
    let unit = generate(&board());
    let expected = "\
static MP_DEFINE_TUPLE(UART_tuple, 2,
    MP_ROM_INT(0),
    MP_ROM_INT(1));
";
    assert!(unit.code.contains(expected), "{}", unit.code);
}

#[test]
fn test_empty_tuple() {
    let spec = ModuleSpec::new("m")
        .object("NONE_YET", ConstObject::Tuple(vec![]))
        .bind("NONE_YET", object("NONE_YET"));
    let unit = generate(&spec);
    assert!(unit
        .code
        .contains("static MP_DEFINE_TUPLE(NONE_YET_tuple, 0, );\n"));
    assert!(unit
        .code
        .contains("{ MP_ROM_QSTR(MP_QSTR_NONE_YET), MP_ROM_PTR(&NONE_YET_tuple) },"));
}

#[test]
fn test_dict_declaration() {
    let unit = generate(&board());
    let expected = "\
static const mp_rom_map_elem_t PINS_dict_table[] = {
    { MP_ROM_QSTR(MP_QSTR_led), MP_ROM_INT(25) },
    { MP_ROM_QSTR(MP_QSTR_button), MP_ROM_INT(14) },
    { MP_ROM_INT(0), MP_ROM_PTR(&UART_tuple) },
};
static MP_DEFINE_DICT(PINS_dict, PINS_dict_table);
";
    assert!(unit.code.contains(expected), "{}", unit.code);
    assert!(unit
        .code
        .contains("{ MP_ROM_QSTR(MP_QSTR_PINS), MP_ROM_PTR(&PINS_dict) },"));
}

#[test]
fn test_dict_macro_uses_fixed_ordered_map() {
    let unit = generate(&board());
    assert!(unit.code.contains("#define MP_DEFINE_DICT(dict_name, table_name)"));
    assert!(unit.code.contains(".is_fixed = 1,"));
    assert!(unit.code.contains(".is_ordered = 1,"));
    assert!(unit.code.contains(".used = MP_ARRAY_SIZE(table_name),"));
    assert!(unit.code.contains(".alloc = MP_ARRAY_SIZE(table_name),"));
}

#[test]
fn test_referenced_object_declared_first() {
    let unit = generate(&board());
    let uart = line_index(&unit.code, "static MP_DEFINE_TUPLE(UART_tuple, 2,");
    let pins = line_index(&unit.code, "static const mp_rom_map_elem_t PINS_dict_table[] = {");
    assert!(uart < pins);
}

#[test]
fn test_float_object_and_typedef() {
    let unit = generate(&board());
    assert!(unit.code.contains("typedef struct _mp_obj_float_t {"));
    assert!(unit.code.contains(
        "static const mp_obj_float_t SCALE_float = {{&mp_type_float}, (mp_float_t)2.5};"
    ));
    assert!(unit
        .code
        .contains("{ MP_ROM_QSTR(MP_QSTR_SCALE), MP_ROM_PTR(&SCALE_float) },"));

    let no_float = generate(&mymod());
    assert!(!no_float.code.contains("mp_obj_float_t"));
}

#[test]
fn test_float_literal_keeps_decimal_point() {
    let spec = ModuleSpec::new("m")
        .object("ONE", ConstObject::Float(1.0))
        .bind("ONE", object("ONE"));
    let unit = generate(&spec);
    assert!(unit.code.contains("(mp_float_t)1.0};"));
}

// ══════════════════════════════════════════════════════════════════════════════
// Gate & Header
// ══════════════════════════════════════════════════════════════════════════════

#[test]
fn test_gate_wraps_all_declarations() {
    let unit = generate(&board());
    let open = line_index(
        &unit.code,
        "#if defined(MODULE_BOARD_ENABLED) && MODULE_BOARD_ENABLED",
    );
    let close = line_index(
        &unit.code,
        "#endif /* defined(MODULE_BOARD_ENABLED) && MODULE_BOARD_ENABLED */",
    );
    let include = line_index(&unit.code, "#include \"py/runtime.h\"");
    assert!(include < open);
    for (i, line) in unit.code.lines().enumerate() {
        let is_decl = line.starts_with("static ")
            || line.starts_with("extern ")
            || line.starts_with("const ")
            || line.starts_with("typedef ")
            || line.starts_with("#define ")
            || line.starts_with("MP_REGISTER_MODULE");
        if is_decl {
            assert!(open < i && i < close, "outside gate: {line}");
        }
    }
    assert_eq!(unit.code.lines().last(), unit.code.lines().nth(close));
}

#[test]
fn test_custom_enable_flag() {
    let options = EmitOptions {
        enable_flag: Some("HAVE_MYMOD".into()),
        ..EmitOptions::default()
    };
    let unit = emit(&mymod(), &options).unwrap();
    assert_eq!(unit.gate, "HAVE_MYMOD");
    assert!(unit.code.contains("#if defined(HAVE_MYMOD) && HAVE_MYMOD\n"));
    assert!(unit.makefile.contains("-DHAVE_MYMOD=1"));
}

#[test]
fn test_header_without_timestamp() {
    let unit = generate(&mymod());
    assert!(unit.code.starts_with("/** -*- mode: c-mode -*-\n * @file   mymod.c\n"));
    assert!(!unit.code.contains("@date"));
    assert!(unit
        .code
        .contains(" * This code was automatically generated from a python file.\n"));
    assert!(unit.code.contains(" * DO NOT MODIFY THIS FILE BY HAND.\n"));
}

#[test]
fn test_header_with_timestamp_and_source() {
    let options = EmitOptions {
        timestamp: Some("2024-03-01 12:00".into()),
        source_name: Some("mymod.py".into()),
        ..EmitOptions::default()
    };
    let unit = emit(&mymod(), &options).unwrap();
    assert!(unit.code.contains(" * @date   2024-03-01 12:00\n"));
    assert!(unit
        .code
        .contains(" * This code was automatically generated from mymod.py.\n"));
}

#[test]
fn test_module_name_override() {
    let options = EmitOptions {
        module_name: Some("renamed".into()),
        ..EmitOptions::default()
    };
    let unit = emit(&mymod(), &options).unwrap();
    assert_eq!(unit.module_name, "renamed");
    assert_eq!(unit.c_file_name(), "renamed.c");
    assert!(unit
        .code
        .contains("MP_REGISTER_MODULE(MP_QSTR_renamed, renamed_user_cmodule);"));
}

// ══════════════════════════════════════════════════════════════════════════════
// Side Outputs
// ══════════════════════════════════════════════════════════════════════════════

#[test]
fn test_makefile_fragment() {
    let unit = generate(&mymod());
    assert!(unit.makefile.contains("MYMOD_MOD_DIR := $(USERMOD_DIR)\n"));
    assert!(unit
        .makefile
        .contains("SRC_USERMOD += $(MYMOD_MOD_DIR)/mymod.c\n"));
    assert!(unit.makefile.contains("-DMODULE_MYMOD_ENABLED=1"));
}

#[test]
fn test_qstrdefs_in_interning_order() {
    let unit = generate(&mymod());
    assert_eq!(unit.qstrdefs, "Q(__name__)\nQ(mymod)\nQ(foo)\nQ(BAR)\n");
}

#[test]
fn test_source_map_from_origins() {
    let mut spec = ModuleSpec::new("m")
        .object("T", ConstObject::Tuple(vec![ValueRef::Int(1)]))
        .bind("T", object("T"));
    spec.objects[0].origin = Some(Span::new(3, 1, 3, 9));
    spec.bindings[0].origin = Some(Span::new(3, 1, 3, 9));

    let unit = generate(&spec);
    assert_eq!(unit.source_map.entries.len(), 2);
    assert_eq!(
        unit.source_map.find("T_tuple").map(|e| e.span),
        Some(Span::new(3, 1, 3, 9))
    );
    assert!(unit.source_map.find("T").is_some());
}

#[test]
fn test_emit_from_json_description() {
    let json = r#"{
        "name": "cfg",
        "bindings": [
            {"symbol": "MODES", "value": {"kind": "object", "value": "MODES"}}
        ],
        "objects": [
            {"name": "MODES", "object": {"kind": "tuple", "value": [
                {"kind": "qstr", "value": "fast"},
                {"kind": "qstr", "value": "slow"}
            ]}}
        ]
    }"#;
    let spec: ModuleSpec = serde_json::from_str(json).unwrap();
    let unit = generate(&spec);
    assert!(unit.code.contains("static MP_DEFINE_TUPLE(MODES_tuple, 2,"));
    assert!(unit.code.contains("    MP_ROM_QSTR(MP_QSTR_slow));"));
}

// ══════════════════════════════════════════════════════════════════════════════
// Determinism
// ══════════════════════════════════════════════════════════════════════════════

#[test]
fn test_determinism_100_iterations() {
    let first = generate(&board());
    for i in 0..100 {
        let again = generate(&board());
        assert_eq!(first.code, again.code, "C output differs at iteration {i}");
        assert_eq!(first.qstrdefs, again.qstrdefs);
        assert_eq!(first.makefile, again.makefile);
    }
}

// ══════════════════════════════════════════════════════════════════════════════
// Errors
// ══════════════════════════════════════════════════════════════════════════════

#[test]
fn test_duplicate_binding_fails() {
    let spec = mymod().bind("BAR", ValueRef::Int(1));
    assert!(matches!(
        emit(&spec, &EmitOptions::default()),
        Err(CodegenError::DuplicateSymbol { symbol, .. }) if symbol == "BAR"
    ));
}

#[test]
fn test_cycle_fails() {
    let spec = ModuleSpec::new("m")
        .object("A", ConstObject::Tuple(vec![object("B")]))
        .object("B", ConstObject::Tuple(vec![object("A")]))
        .bind("A", object("A"));
    let err = emit(&spec, &EmitOptions::default()).unwrap_err();
    assert_eq!(err.to_string(), "cyclic constant: A -> B -> A");
}

#[test]
fn test_unescapable_symbol_fails() {
    let spec = ModuleSpec::new("m").bind("GREEK", ValueRef::Qstr("α".into()));
    assert!(matches!(
        emit(&spec, &EmitOptions::default()),
        Err(CodegenError::InvalidSymbol { .. })
    ));
}

#[test]
fn test_out_of_range_int_fails() {
    let spec = ModuleSpec::new("m").bind("BIG", ValueRef::Int(1 << 40));
    let err = emit(&spec, &EmitOptions::default()).unwrap_err();
    assert_eq!(err.subject(), Some("BIG"));
}
