//! Input of the code generator: an ordered description of a module.
//!
//! A [`ModuleSpec`] is what a binding collector hands over. Everything in it
//! is plain data; validation happens in [`crate::layout::build`].

use cmod_types::Span;
use serde::{Deserialize, Serialize};

/// A module to generate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModuleSpec {
    /// Module name; also the prefix of every module-level C identifier.
    pub name: String,
    /// Globals in the order they must appear, `__name__` excluded.
    pub bindings: Vec<Binding>,
    /// Composite constants that values may refer to by name.
    #[serde(default)]
    pub objects: Vec<ObjectDef>,
}

impl ModuleSpec {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            bindings: Vec::new(),
            objects: Vec::new(),
        }
    }

    pub fn bind(mut self, symbol: impl Into<String>, value: ValueRef) -> Self {
        self.bindings.push(Binding::new(symbol, value));
        self
    }

    pub fn object(mut self, name: impl Into<String>, object: ConstObject) -> Self {
        self.objects.push(ObjectDef::new(name, object));
        self
    }
}

/// One `symbol -> value` entry of the module globals.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Binding {
    pub symbol: String,
    pub value: ValueRef,
    /// Where the binding was declared, for diagnostics.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub origin: Option<Span>,
}

impl Binding {
    pub fn new(symbol: impl Into<String>, value: ValueRef) -> Self {
        Self {
            symbol: symbol.into(),
            value,
            origin: None,
        }
    }
}

/// A value stored in a table or tuple slot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum ValueRef {
    /// `MP_ROM_INT(n)`
    Int(i64),
    /// `MP_ROM_QSTR(MP_QSTR_...)`: an interned string.
    Qstr(String),
    Bool(bool),
    None,
    /// A constant object described in [`ModuleSpec::objects`].
    Object(String),
    /// A callable implemented in another C unit.
    Native(NativeRef),
}

/// A natively implemented function object.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NativeRef {
    /// C identifier of the function object, e.g. `mymod_blink_obj`.
    pub c_name: String,
    pub kind: NativeKind,
}

impl NativeRef {
    pub fn new(c_name: impl Into<String>, kind: NativeKind) -> Self {
        Self {
            c_name: c_name.into(),
            kind,
        }
    }

    /// C type of the function object.
    pub fn c_type(&self) -> &'static str {
        match self.kind {
            NativeKind::Fixed(n) if n <= 3 => "mp_obj_fun_builtin_fixed_t",
            _ => "mp_obj_fun_builtin_var_t",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NativeKind {
    /// Exactly this many positional arguments.
    Fixed(u8),
    /// Variable or keyword arguments.
    Var,
}

/// A named composite constant.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ObjectDef {
    pub name: String,
    pub object: ConstObject,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub origin: Option<Span>,
}

impl ObjectDef {
    pub fn new(name: impl Into<String>, object: ConstObject) -> Self {
        Self {
            name: name.into(),
            object,
            origin: None,
        }
    }

    /// Object names this definition points at, in slot order.
    pub fn references(&self) -> impl Iterator<Item = &str> {
        let values: Box<dyn Iterator<Item = &ValueRef> + '_> = match &self.object {
            ConstObject::Tuple(items) => Box::new(items.iter()),
            ConstObject::Dict(entries) => Box::new(entries.iter().map(|(_, v)| v)),
            ConstObject::Float(_) => Box::new(std::iter::empty()),
        };
        values.filter_map(|v| match v {
            ValueRef::Object(name) => Some(name.as_str()),
            _ => None,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum ConstObject {
    /// `mp_rom_obj_tuple_t`
    Tuple(Vec<ValueRef>),
    /// Fixed, ordered `mp_obj_dict_t`.
    Dict(Vec<(DictKey, ValueRef)>),
    /// Boxed `mp_obj_float_t`.
    Float(f64),
}

impl ConstObject {
    /// Short noun used in C names and diagnostics.
    pub fn kind_name(&self) -> &'static str {
        match self {
            ConstObject::Tuple(_) => "tuple",
            ConstObject::Dict(_) => "dict",
            ConstObject::Float(_) => "float",
        }
    }
}

/// Key of a constant dictionary entry.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum DictKey {
    Int(i64),
    Qstr(String),
}

impl std::fmt::Display for DictKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DictKey::Int(n) => write!(f, "{n}"),
            DictKey::Qstr(s) => write!(f, "'{s}'"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_native_c_type_by_arity() {
        assert_eq!(
            NativeRef::new("m_f_obj", NativeKind::Fixed(0)).c_type(),
            "mp_obj_fun_builtin_fixed_t"
        );
        assert_eq!(
            NativeRef::new("m_f_obj", NativeKind::Fixed(3)).c_type(),
            "mp_obj_fun_builtin_fixed_t"
        );
        assert_eq!(
            NativeRef::new("m_f_obj", NativeKind::Fixed(4)).c_type(),
            "mp_obj_fun_builtin_var_t"
        );
        assert_eq!(
            NativeRef::new("m_f_obj", NativeKind::Var).c_type(),
            "mp_obj_fun_builtin_var_t"
        );
    }

    #[test]
    fn test_references_in_slot_order() {
        let def = ObjectDef::new(
            "T",
            ConstObject::Tuple(vec![
                ValueRef::Object("B".into()),
                ValueRef::Int(1),
                ValueRef::Object("A".into()),
            ]),
        );
        assert_eq!(def.references().collect::<Vec<_>>(), vec!["B", "A"]);
    }

    #[test]
    fn test_spec_from_json() {
        let json = r#"{
            "name": "mymod",
            "bindings": [
                {"symbol": "foo", "value": {"kind": "native", "value": {"c_name": "mymod_foo_obj", "kind": {"fixed": 1}}}},
                {"symbol": "BAR", "value": {"kind": "int", "value": 42}},
                {"symbol": "T", "value": {"kind": "object", "value": "T"}}
            ],
            "objects": [
                {"name": "T", "object": {"kind": "tuple", "value": [{"kind": "none"}]}}
            ]
        }"#;
        let spec: ModuleSpec = serde_json::from_str(json).unwrap();
        assert_eq!(spec.bindings.len(), 3);
        assert_eq!(spec.bindings[1].value, ValueRef::Int(42));
        assert_eq!(spec.objects[0].object, ConstObject::Tuple(vec![ValueRef::None]));
    }
}
