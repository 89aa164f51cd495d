//! Binding collector: walks a parsed description file and builds the
//! [`ModuleSpec`] handed to the code generator.
//!
//! Entry point: [`collect`].
//!
//! Error codes emitted:
//! - E102: `const()` argument is not an integer
//! - E200: name defined twice
//! - E201: name used as a value cannot be resolved
//! - E202: string cannot be spelled as a qstr, unsupported dictionary key
//! - E203: dictionary key repeated
//! - E301: names that alias each other in a loop

use std::collections::{HashMap, HashSet};

use cmod_codegen::{
    qstr_escape, Binding, ConstObject, DictKey, ModuleSpec, NativeKind, NativeRef, ObjectDef,
    ValueRef,
};
use cmod_types::ast::*;
use cmod_types::{CmodError, CompileErrors, ErrorCode, SourceFile, Span};

/// Output of [`collect`].
#[derive(Debug, Clone)]
pub struct Collected {
    pub spec: ModuleSpec,
    /// Declaration span of every binding and constant object, by name.
    pub spans: HashMap<String, Span>,
}

/// Collect the bindings of `program` for module `module_name`.
///
/// Globals are ordered constants first, then the remaining definitions in
/// source order. Problems are pushed to `errors`; the returned spec is only
/// meaningful when no error was recorded.
pub fn collect(
    program: &Program,
    module_name: &str,
    source: &SourceFile,
    errors: &mut CompileErrors,
) -> Collected {
    let mut collector = Collector::new(module_name, source, errors);
    collector.index(program);
    collector.lower(program);
    Collected {
        spec: collector.spec,
        spans: collector.spans,
    }
}

// ══════════════════════════════════════════════════════════════════════════════
// Collector
// ══════════════════════════════════════════════════════════════════════════════

/// What a top-level name stands for.
#[derive(Debug, Clone)]
enum DefKind<'p> {
    /// `NAME = const(<int>)`
    Constant(i64),
    /// `NAME = <int>`
    Int(i64),
    /// `NAME = <float | dict | tuple>`: becomes a named object.
    Object,
    /// `NAME = OTHER`
    Alias(&'p str),
    Function(NativeRef),
    /// String, bool or `None` variable.
    Scalar(&'static str),
    /// Definition that already produced an error.
    Invalid,
}

#[derive(Debug, Clone)]
struct Def<'p> {
    kind: DefKind<'p>,
    span: Span,
}

struct Collector<'a, 'p> {
    module_name: &'a str,
    source: &'a SourceFile,
    errors: &'a mut CompileErrors,
    defs: HashMap<&'p str, Def<'p>>,
    spec: ModuleSpec,
    spans: HashMap<String, Span>,
    /// Shared by every anonymous object of the compilation.
    unnamed_counter: usize,
}

impl<'a, 'p> Collector<'a, 'p> {
    fn new(module_name: &'a str, source: &'a SourceFile, errors: &'a mut CompileErrors) -> Self {
        Self {
            module_name,
            source,
            errors,
            defs: HashMap::new(),
            spec: ModuleSpec::new(module_name),
            spans: HashMap::new(),
            unnamed_counter: 0,
        }
    }

    // ── Pass 1: names ────────────────────────────────────────────────────────

    fn index(&mut self, program: &'p Program) {
        for stmt in &program.statements {
            let (name, kind) = match stmt {
                Stmt::Assign(assign) => (&assign.target, self.classify(&assign.value)),
                Stmt::Function(func) => (&func.name, DefKind::Function(self.native(func))),
                Stmt::Import(_) | Stmt::Docstring(_) => continue,
            };
            if let Some(previous) = self.defs.get(name.name.as_str()) {
                let line = previous.span.start_line;
                self.error_with_suggestion(
                    ErrorCode::DUPLICATE_SYMBOL,
                    format!("'{}' is already defined on line {line}", name.name),
                    name.span,
                    "every module attribute can be defined only once",
                );
                continue;
            }
            self.defs.insert(
                name.name.as_str(),
                Def {
                    kind,
                    span: stmt.span(),
                },
            );
        }
    }

    fn classify(&mut self, value: &'p Expr) -> DefKind<'p> {
        match &value.kind {
            ExprKind::Const(inner) => match self.const_int(inner) {
                Some(n) => DefKind::Constant(n),
                None => DefKind::Invalid,
            },
            ExprKind::Int(n) => DefKind::Int(*n),
            ExprKind::Float(_) | ExprKind::Tuple(_) | ExprKind::Dict(_) => DefKind::Object,
            ExprKind::Name(target) => DefKind::Alias(target.as_str()),
            other => DefKind::Scalar(other.describe()),
        }
    }

    /// Argument of `const()`: an integer literal or an earlier constant.
    fn const_int(&mut self, inner: &Expr) -> Option<i64> {
        match &inner.kind {
            ExprKind::Int(n) => Some(*n),
            ExprKind::Name(name) => match self.defs.get(name.as_str()).map(|d| &d.kind) {
                Some(DefKind::Constant(n)) => Some(*n),
                Some(DefKind::Invalid) => None,
                _ => {
                    self.error(
                        ErrorCode::UNRESOLVED_SYMBOL,
                        format!("'{name}' is not a constant defined before this line"),
                        inner.span,
                    );
                    None
                }
            },
            other => {
                self.error_with_suggestion(
                    ErrorCode::INVALID_LITERAL,
                    format!("const() takes an integer, found {}", other.describe()),
                    inner.span,
                    "assign non-integer values without const()",
                );
                None
            }
        }
    }

    fn native(&self, func: &FunctionDecl) -> NativeRef {
        let kind = match u8::try_from(func.params.len()) {
            Ok(n) if func.is_fixed_arity() => NativeKind::Fixed(n),
            _ => NativeKind::Var,
        };
        NativeRef::new(format!("{}_{}_obj", self.module_name, func.name.name), kind)
    }

    // ── Pass 2: bindings ─────────────────────────────────────────────────────

    fn lower(&mut self, program: &'p Program) {
        let mut seen = HashSet::new();
        let (constants, rest): (Vec<&Stmt>, Vec<&Stmt>) = program
            .statements
            .iter()
            .partition(|s| matches!(s, Stmt::Assign(a) if matches!(a.value.kind, ExprKind::Const(_))));

        for stmt in constants.into_iter().chain(rest) {
            let name = match stmt {
                Stmt::Assign(assign) => &assign.target,
                Stmt::Function(func) => &func.name,
                Stmt::Import(_) | Stmt::Docstring(_) => continue,
            };
            // duplicates were reported by the index pass
            if !seen.insert(name.name.as_str()) {
                continue;
            }
            let value = match stmt {
                Stmt::Assign(assign) => self.lower_assign(assign),
                Stmt::Function(func) => Some(ValueRef::Native(self.native(func))),
                Stmt::Import(_) | Stmt::Docstring(_) => None,
            };
            let Some(value) = value else { continue };
            self.spans.insert(name.name.clone(), stmt.span());
            self.spec.bindings.push(Binding {
                symbol: name.name.clone(),
                value,
                origin: Some(stmt.span()),
            });
        }
    }

    fn lower_assign(&mut self, assign: &Assign) -> Option<ValueRef> {
        let name = assign.target.name.as_str();
        let value = &assign.value;
        match &value.kind {
            ExprKind::Const(_) => match self.defs.get(name).map(|d| &d.kind) {
                Some(DefKind::Constant(n)) => Some(ValueRef::Int(*n)),
                _ => None,
            },
            ExprKind::Float(_) | ExprKind::Tuple(_) | ExprKind::Dict(_) => {
                let object = self.lower_object(value, name)?;
                self.push_object(name.to_string(), object, value.span);
                Some(ValueRef::Object(name.to_string()))
            }
            _ => self.lower_value(value, name),
        }
    }

    /// Lower a value in a slot. `parent` is the top-level binding the value
    /// belongs to; it names anonymous objects.
    fn lower_value(&mut self, value: &Expr, parent: &str) -> Option<ValueRef> {
        match &value.kind {
            ExprKind::Int(n) => Some(ValueRef::Int(*n)),
            ExprKind::Str(text) => self.qstr(text, value.span).map(ValueRef::Qstr),
            ExprKind::Bool(b) => Some(ValueRef::Bool(*b)),
            ExprKind::None => Some(ValueRef::None),
            ExprKind::Name(name) => self.resolve(name, value.span),
            ExprKind::Const(inner) => self.const_int(inner).map(ValueRef::Int),
            ExprKind::Float(_) | ExprKind::Tuple(_) | ExprKind::Dict(_) => {
                let name = format!("unnamed_{parent}_{}", self.unnamed_counter);
                self.unnamed_counter += 1;
                let object = self.lower_object(value, parent)?;
                self.push_object(name.clone(), object, value.span);
                Some(ValueRef::Object(name))
            }
        }
    }

    fn lower_object(&mut self, value: &Expr, parent: &str) -> Option<ConstObject> {
        match &value.kind {
            ExprKind::Float(f) => Some(ConstObject::Float(*f)),
            ExprKind::Tuple(items) => {
                let lowered: Vec<Option<ValueRef>> = items
                    .iter()
                    .map(|item| self.lower_value(item, parent))
                    .collect();
                lowered.into_iter().collect::<Option<Vec<_>>>().map(ConstObject::Tuple)
            }
            ExprKind::Dict(entries) => {
                let mut keys = HashMap::new();
                let mut ok = true;
                let mut pairs = Vec::with_capacity(entries.len());
                for entry in entries {
                    let key = self.dict_key(&entry.key);
                    let value = self.lower_value(&entry.value, parent);
                    let Some(key) = key else {
                        ok = false;
                        continue;
                    };
                    if let Some(first) = keys.insert(key.clone(), entry.key.span) {
                        self.error_with_suggestion(
                            ErrorCode::DUPLICATE_KEY,
                            format!(
                                "duplicate key {key} in dictionary (first used on line {})",
                                first.start_line
                            ),
                            entry.key.span,
                            "remove one of the entries",
                        );
                        ok = false;
                    }
                    match value {
                        Some(value) => pairs.push((key, value)),
                        None => ok = false,
                    }
                }
                ok.then_some(ConstObject::Dict(pairs))
            }
            _ => None,
        }
    }

    fn dict_key(&mut self, key: &Expr) -> Option<DictKey> {
        match &key.kind {
            ExprKind::Str(text) => self.qstr(text, key.span).map(DictKey::Qstr),
            ExprKind::Int(n) => Some(DictKey::Int(*n)),
            ExprKind::Const(inner) => self.const_int(inner).map(DictKey::Int),
            ExprKind::Name(name) => match self.resolve(name, key.span)? {
                ValueRef::Int(n) => Some(DictKey::Int(n)),
                _ => {
                    self.error(
                        ErrorCode::INVALID_SYMBOL,
                        format!("dictionary key '{name}' does not name an integer"),
                        key.span,
                    );
                    None
                }
            },
            other => {
                self.error_with_suggestion(
                    ErrorCode::INVALID_SYMBOL,
                    format!("{} cannot be used as a dictionary key", other.describe()),
                    key.span,
                    "use a string, an integer or a const() name",
                );
                None
            }
        }
    }

    /// Resolve a name used as a value.
    fn resolve(&mut self, name: &str, span: Span) -> Option<ValueRef> {
        let mut current = name;
        let mut chain: Vec<&str> = vec![name];
        loop {
            let Some(def) = self.defs.get(current) else {
                self.error(
                    ErrorCode::UNRESOLVED_SYMBOL,
                    format!("unresolved name '{current}'"),
                    span,
                );
                return None;
            };
            match &def.kind {
                DefKind::Constant(n) | DefKind::Int(n) => return Some(ValueRef::Int(*n)),
                DefKind::Object => return Some(ValueRef::Object(current.to_string())),
                DefKind::Function(native) => return Some(ValueRef::Native(native.clone())),
                DefKind::Invalid => return None,
                DefKind::Scalar(kind) => {
                    let kind = *kind;
                    self.error_with_suggestion(
                        ErrorCode::UNRESOLVED_SYMBOL,
                        format!("'{current}' is a {kind} variable and cannot be referenced"),
                        span,
                        "repeat the value or refer to a const() integer",
                    );
                    return None;
                }
                DefKind::Alias(target) => {
                    let target = *target;
                    if chain.contains(&target) {
                        chain.push(target);
                        self.error(
                            ErrorCode::CYCLIC_CONSTANT,
                            format!("names refer to each other: {}", chain.join(" -> ")),
                            span,
                        );
                        return None;
                    }
                    chain.push(target);
                    current = target;
                }
            }
        }
    }

    // ── Helpers ──────────────────────────────────────────────────────────────

    fn push_object(&mut self, name: String, object: ConstObject, span: Span) {
        self.spans.insert(name.clone(), span);
        self.spec.objects.push(ObjectDef {
            name,
            object,
            origin: Some(span),
        });
    }

    fn qstr(&mut self, text: &str, span: Span) -> Option<String> {
        match qstr_escape(text) {
            Ok(_) => Some(text.to_string()),
            Err(e) => {
                self.error(ErrorCode::INVALID_SYMBOL, e.to_string(), span);
                None
            }
        }
    }

    fn diagnostic(&self, code: ErrorCode, message: String, span: Span) -> CmodError {
        let source_line = self.source.line(span.start_line).unwrap_or("").to_string();
        CmodError::new(&self.source.name, code, message, span, source_line)
    }

    fn error(&mut self, code: ErrorCode, message: String, span: Span) {
        let err = self.diagnostic(code, message, span);
        self.errors.push_error(err);
    }

    fn error_with_suggestion(
        &mut self,
        code: ErrorCode,
        message: String,
        span: Span,
        suggestion: &str,
    ) {
        let err = self.diagnostic(code, message, span).with_suggestion(suggestion);
        self.errors.push_error(err);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cmod_lexer::Lexer;
    use cmod_parser::Parser;

    fn run(source: &str) -> (Collected, CompileErrors) {
        let sf = SourceFile::new("board.py", source);
        let lex = Lexer::new(&sf).lex();
        let parsed = Parser::new(lex.tokens, &sf).parse();
        assert!(!parsed.errors.has_errors(), "parse errors: {:?}", parsed.errors.errors);
        let mut errors = CompileErrors::empty();
        let collected = collect(&parsed.program, "board", &sf, &mut errors);
        (collected, errors)
    }

    fn symbols(spec: &ModuleSpec) -> Vec<&str> {
        spec.bindings.iter().map(|b| b.symbol.as_str()).collect()
    }

    #[test]
    fn test_constants_come_first() {
        let (c, errs) = run("A = 1\nB = const(2)\ndef f(): ...\nC = const(3)\n");
        assert!(!errs.has_errors());
        assert_eq!(symbols(&c.spec), vec!["B", "C", "A", "f"]);
        assert_eq!(c.spec.bindings[0].value, ValueRef::Int(2));
    }

    #[test]
    fn test_native_arity() {
        let (c, _) = run("def a(): ...\ndef b(x, y): ...\ndef c(x=1): ...\ndef d(*args): ...\n");
        let kinds: Vec<_> = c
            .spec
            .bindings
            .iter()
            .map(|b| match &b.value {
                ValueRef::Native(n) => (n.c_name.as_str(), n.kind),
                other => panic!("expected native, got {other:?}"),
            })
            .collect();
        assert_eq!(
            kinds,
            vec![
                ("board_a_obj", NativeKind::Fixed(0)),
                ("board_b_obj", NativeKind::Fixed(2)),
                ("board_c_obj", NativeKind::Var),
                ("board_d_obj", NativeKind::Var),
            ]
        );
    }

    #[test]
    fn test_nested_objects_are_named_after_binding() {
        let (c, errs) = run("PINS = {'uart': (0, 1), 'spi': {'sck': 2}}\n");
        assert!(!errs.has_errors());
        let names: Vec<&str> = c.spec.objects.iter().map(|o| o.name.as_str()).collect();
        assert_eq!(names, vec!["unnamed_PINS_0", "unnamed_PINS_1", "PINS"]);
        assert_eq!(c.spans["unnamed_PINS_0"].start_col, 17);
    }

    #[test]
    fn test_counter_is_shared_across_bindings() {
        let (c, _) = run("A = ((1,),)\nB = ((2,),)\n");
        let names: Vec<&str> = c.spec.objects.iter().map(|o| o.name.as_str()).collect();
        assert_eq!(names, vec!["unnamed_A_0", "A", "unnamed_B_1", "B"]);
    }

    #[test]
    fn test_names_resolve() {
        let src = "\
LED = const(25)
RATE = 9600
SCALE = 0.5
MODES = ('a',)
def blink(): ...
T = (LED, RATE, SCALE, MODES, blink)
";
        let (c, errs) = run(src);
        assert!(!errs.has_errors(), "{:?}", errs.errors);
        let t = c.spec.objects.iter().find(|o| o.name == "T").unwrap();
        assert_eq!(
            t.object,
            ConstObject::Tuple(vec![
                ValueRef::Int(25),
                ValueRef::Int(9600),
                ValueRef::Object("SCALE".into()),
                ValueRef::Object("MODES".into()),
                ValueRef::Native(NativeRef::new("board_blink_obj", NativeKind::Fixed(0))),
            ])
        );
    }

    #[test]
    fn test_constant_dict_keys() {
        let (c, errs) = run("K = const(7)\nD = {K: 'seven', 'x': 1, 2: None}\n");
        assert!(!errs.has_errors());
        let d = c.spec.objects.iter().find(|o| o.name == "D").unwrap();
        assert_eq!(
            d.object,
            ConstObject::Dict(vec![
                (DictKey::Int(7), ValueRef::Qstr("seven".into())),
                (DictKey::Qstr("x".into()), ValueRef::Int(1)),
                (DictKey::Int(2), ValueRef::None),
            ])
        );
    }

    #[test]
    fn test_duplicate_definition() {
        let (_, errs) = run("A = 1\nA = 2\n");
        assert_eq!(errs.total_errors, 1);
        assert_eq!(errs.errors[0].code, ErrorCode::DUPLICATE_SYMBOL);
        assert_eq!(errs.errors[0].span.start_line, 2);
        assert!(errs.errors[0].message.contains("line 1"));
    }

    #[test]
    fn test_duplicate_key() {
        let (_, errs) = run("D = {'a': 1, 'a': 2}\n");
        assert_eq!(errs.errors[0].code, ErrorCode::DUPLICATE_KEY);
        assert_eq!(errs.errors[0].span, Span::new(1, 14, 1, 16));
    }

    #[test]
    fn test_unresolved_name() {
        let (_, errs) = run("T = (MISSING,)\n");
        assert_eq!(errs.errors[0].code, ErrorCode::UNRESOLVED_SYMBOL);
        assert_eq!(errs.errors[0].message, "unresolved name 'MISSING'");
    }

    #[test]
    fn test_string_variable_not_referenceable() {
        let (_, errs) = run("NAME = 'x'\nT = (NAME,)\n");
        assert_eq!(errs.errors[0].code, ErrorCode::UNRESOLVED_SYMBOL);
        assert!(errs.errors[0].suggestion.is_some());
    }

    #[test]
    fn test_alias_loop() {
        let (_, errs) = run("A = B\nB = A\n");
        assert!(errs
            .errors
            .iter()
            .all(|e| e.code == ErrorCode::CYCLIC_CONSTANT));
        assert!(errs.has_errors());
    }

    #[test]
    fn test_const_needs_integer() {
        let (_, errs) = run("X = const('a')\n");
        assert_eq!(errs.errors[0].code, ErrorCode::INVALID_LITERAL);
    }

    #[test]
    fn test_unescapable_string() {
        let (_, errs) = run("X = 'α'\n");
        assert_eq!(errs.errors[0].code, ErrorCode::INVALID_SYMBOL);
    }
}
