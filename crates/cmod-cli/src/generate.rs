//! The generator run behind `mpy-cmod`.

use std::fs;
use std::io::Write;

use anyhow::{Context, Result};
use cmod_codegen::EmitOptions;
use cmod_compiler::{clear_module, compile, compile_to_result, module_exists, write_module, Options};

use crate::args::Cli;
use crate::report;

/// Execute one invocation. `out` receives generated text, `diag` receives
/// diagnostics. Returns whether the run succeeded.
pub fn run(cli: &Cli, out: &mut dyn Write, diag: &mut dyn Write) -> Result<bool> {
    let module_name = cli.module_name();
    let directory = cli.module_directory();

    if cli.writes_files() {
        if cli.clear {
            clear_module(&directory, &module_name)
                .with_context(|| format!("failed to clear {}", directory.display()))?;
            if cli.make {
                return Ok(true);
            }
        }
        if cli.make && module_exists(&directory) {
            return Ok(true);
        }
    }

    let filename = cli.filename.display().to_string();
    let source = fs::read_to_string(&cli.filename)
        .with_context(|| format!("failed to read {filename}"))?;
    let options = options(cli, module_name);

    if cli.json {
        let result = compile_to_result(&source, &filename, &options);
        writeln!(out, "{}", result.to_json()?)?;
        return Ok(result.success);
    }

    let compiled = match compile(&source, &filename, &options) {
        Ok(compiled) => compiled,
        Err(errors) => {
            write!(diag, "{}", report::render_all(&errors))?;
            writeln!(
                diag,
                "error: could not generate module from {filename} due to {} previous error(s)",
                errors.total_errors
            )?;
            return Ok(false);
        }
    };
    write!(diag, "{}", report::render_all(&compiled.diagnostics))?;

    if cli.stdout {
        write!(out, "{}", compiled.unit.code)?;
        return Ok(true);
    }

    match write_module(&directory, &compiled.unit, cli.qstrdefs) {
        Ok(paths) => {
            for path in paths {
                writeln!(diag, "wrote {}", path.display())?;
            }
            Ok(true)
        }
        Err(e) => {
            write!(diag, "{}", report::render(&e.to_diagnostic()))?;
            Ok(false)
        }
    }
}

fn options(cli: &Cli, module_name: String) -> Options {
    Options {
        emit: EmitOptions {
            module_name: Some(module_name),
            enable_flag: cli.enable_flag.clone(),
            small_int_bits: cli.small_int_bits,
            timestamp: cli.timestamp.clone(),
            source_name: None,
        },
        qstrdefs: cli.qstrdefs,
    }
}

#[cfg(test)]
mod tests {
    use std::path::Path;

    use clap::Parser;

    use super::*;

    const BOARD: &str = "LED = const(25)\nNAME = 'pico'\ndef blink(n): ...\n";

    struct Run {
        ok: bool,
        out: String,
        diag: String,
    }

    fn run_with(args: &[&str]) -> Run {
        let cli = Cli::try_parse_from(std::iter::once("mpy-cmod").chain(args.iter().copied()))
            .unwrap_or_else(|e| panic!("{e}"));
        let mut out = Vec::new();
        let mut diag = Vec::new();
        let ok = run(&cli, &mut out, &mut diag).expect("run failed");
        Run {
            ok,
            out: String::from_utf8(out).unwrap(),
            diag: String::from_utf8(diag).unwrap(),
        }
    }

    fn write_source(dir: &Path, name: &str, text: &str) -> String {
        let path = dir.join(name);
        fs::write(&path, text).unwrap();
        path.display().to_string()
    }

    fn path_str(path: &Path) -> String {
        path.display().to_string()
    }

    #[test]
    fn writes_module_directory() {
        let tmp = tempfile::tempdir().unwrap();
        let src = write_source(tmp.path(), "board.py", BOARD);
        let dir = tmp.path().join("board");

        let r = run_with(&["-f", &src, "-d", &path_str(&dir)]);
        assert!(r.ok, "{}", r.diag);
        assert!(dir.join("board.c").exists());
        assert!(dir.join("micropython.mk").exists());
        assert!(r.diag.contains("wrote "));
        assert!(r.out.is_empty());
    }

    #[test]
    fn existing_module_is_an_error() {
        let tmp = tempfile::tempdir().unwrap();
        let src = write_source(tmp.path(), "board.py", BOARD);
        let dir = path_str(&tmp.path().join("board"));

        assert!(run_with(&["-f", &src, "-d", &dir]).ok);
        let r = run_with(&["-f", &src, "-d", &dir]);
        assert!(!r.ok);
        assert!(r.diag.contains("error[E401]"), "{}", r.diag);
    }

    #[test]
    fn make_skips_existing_module() {
        let tmp = tempfile::tempdir().unwrap();
        let src = write_source(tmp.path(), "board.py", BOARD);
        let dir = tmp.path().join("board");
        fs::create_dir(&dir).unwrap();

        let r = run_with(&["-f", &src, "-d", &path_str(&dir), "--make"]);
        assert!(r.ok);
        assert!(!dir.join("board.c").exists());
    }

    #[test]
    fn clear_regenerates() {
        let tmp = tempfile::tempdir().unwrap();
        let src = write_source(tmp.path(), "board.py", BOARD);
        let dir = path_str(&tmp.path().join("board"));

        assert!(run_with(&["-f", &src, "-d", &dir]).ok);
        let r = run_with(&["-f", &src, "-d", &dir, "--clear"]);
        assert!(r.ok, "{}", r.diag);
    }

    #[test]
    fn clear_with_make_only_clears() {
        let tmp = tempfile::tempdir().unwrap();
        let src = write_source(tmp.path(), "board.py", BOARD);
        let dir = tmp.path().join("board");

        assert!(run_with(&["-f", &src, "-d", &path_str(&dir)]).ok);
        let r = run_with(&["-f", &src, "-d", &path_str(&dir), "--clear", "--make"]);
        assert!(r.ok);
        assert!(!dir.exists());
    }

    #[test]
    fn stdout_prints_unit() {
        let tmp = tempfile::tempdir().unwrap();
        let src = write_source(tmp.path(), "board.py", BOARD);

        let r = run_with(&["-f", &src, "--stdout", "--timestamp", "12:00 on 01 03 2024"]);
        assert!(r.ok);
        assert!(r.out.contains("MP_REGISTER_MODULE(MP_QSTR_board, board_user_cmodule);"));
        assert!(r.out.contains(" * @date   12:00 on 01 03 2024\n"));
        assert!(r.out.contains("extern const mp_obj_fun_builtin_fixed_t board_blink_obj;"));
    }

    #[test]
    fn json_reports_failure() {
        let tmp = tempfile::tempdir().unwrap();
        let src = write_source(tmp.path(), "board.py", "A = [1]\n");

        let r = run_with(&["-f", &src, "--json"]);
        assert!(!r.ok);
        assert!(r.out.contains("\"success\": false"));
    }

    #[test]
    fn errors_are_rendered() {
        let tmp = tempfile::tempdir().unwrap();
        let src = write_source(tmp.path(), "board.py", "A = 1\nA = 2\n");

        let r = run_with(&["-f", &src, "--stdout"]);
        assert!(!r.ok);
        assert!(r.out.is_empty());
        assert!(r.diag.contains("error[E200]: 'A' is already defined on line 1"));
        assert!(r.diag.contains("due to 1 previous error(s)"));
    }

    #[test]
    fn missing_file_is_an_error() {
        let cli = Cli::try_parse_from(["mpy-cmod", "-f", "/nonexistent/board.py", "--stdout"]).unwrap();
        let err = run(&cli, &mut Vec::new(), &mut Vec::new()).unwrap_err();
        assert!(err.to_string().contains("failed to read"));
    }

    #[test]
    fn enable_flag_and_module_name() {
        let tmp = tempfile::tempdir().unwrap();
        let src = write_source(tmp.path(), "board.py", BOARD);

        let r = run_with(&[
            "-f",
            &src,
            "--stdout",
            "--modulename",
            "pico",
            "--enable-flag",
            "HAVE_PICO",
        ]);
        assert!(r.ok);
        assert!(r.out.contains("#if defined(HAVE_PICO) && HAVE_PICO\n"));
        assert!(r.out.contains("pico_blink_obj"));
    }
}
