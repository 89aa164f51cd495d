//! `micropython.mk` fragment for the `USER_C_MODULES` build.

/// Header listing every qstr of the unit, written next to `<module>.c`.
pub fn qstrdefs_file_name(module_name: &str) -> String {
    format!("qstrdefs.{module_name}.h")
}

/// Render the make fragment that adds `<module>.c` to the firmware build and
/// defines `gate` so the unit is compiled in.
///
/// With `with_qstrdefs` the fragment also hands the qstrdefs header to the
/// qstr generator. The automatic `MP_QSTR_` scan reads an escaped name such
/// as `MP_QSTR_a_space_b` as the literal text `a_space_b`; the header carries
/// the real text.
pub fn render(module_name: &str, gate: &str, with_qstrdefs: bool) -> String {
    let dir_var = format!("{}_MOD_DIR", module_name.to_ascii_uppercase());
    let mut out = format!(
        "\
# Generated alongside {module_name}.c. DO NOT MODIFY THIS FILE BY HAND.
{dir_var} := $(USERMOD_DIR)

SRC_USERMOD += $({dir_var})/{module_name}.c
CFLAGS_USERMOD += -I$({dir_var}) -D{gate}=1
"
    );
    if with_qstrdefs {
        out.push_str(&format!(
            "QSTR_DEFS += $({dir_var})/{}\n",
            qstrdefs_file_name(module_name)
        ));
    }
    out
}
