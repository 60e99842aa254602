//! Runtime values of Cup programs.

use std::cell::RefCell;
use std::collections::HashMap;
use std::fmt;
use std::rc::Rc;

use cup_ast::ast::{ClassDecl, FnDecl};
use serde::ser::{Error as _, SerializeMap, SerializeSeq};
use serde::{Serialize, Serializer};

use crate::error::RuntimeError;
use crate::natives::NativeFn;

/// Runtime values in Cup
///
/// Lists, dicts and objects are shared: copying the value aliases the same
/// storage, so mutation through one name is visible through every other.
#[derive(Debug, Clone)]
pub enum Value {
    Int(i64),
    Float(f64),
    Bool(bool),
    Str(String),
    Null,
    List(Rc<RefCell<Vec<Value>>>),
    /// Immutable tuple: (a, b, c)
    Shell(Rc<Vec<Value>>),
    Dict(Rc<RefCell<Dict>>),
    Function(Rc<FnDecl>),
    Class(Rc<ClassDecl>),
    /// Class instance: the bindings left by running the class body
    Object(Rc<RefCell<Object>>),
    Builtin(Rc<NativeFn>),
}

impl Value {
    pub fn list(items: Vec<Value>) -> Self {
        Value::List(Rc::new(RefCell::new(items)))
    }

    pub fn shell(items: Vec<Value>) -> Self {
        Value::Shell(Rc::new(items))
    }

    pub fn dict(dict: Dict) -> Self {
        Value::Dict(Rc::new(RefCell::new(dict)))
    }

    pub fn str(s: impl Into<String>) -> Self {
        Value::Str(s.into())
    }

    /// Name reported by `?` and `typeof`.
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Int(_) => "integer",
            Value::Float(_) => "decimal",
            Value::Bool(_) => "logic",
            Value::Str(_) => "string",
            Value::Null => "null",
            Value::List(_) => "list",
            Value::Shell(_) => "shell",
            Value::Dict(_) => "dict",
            Value::Function(_) => "function",
            Value::Class(_) => "class",
            Value::Object(_) => "object",
            Value::Builtin(_) => "builtin",
        }
    }

    pub fn truthy(&self) -> bool {
        match self {
            Value::Int(v) => *v != 0,
            Value::Float(v) => *v != 0.0,
            Value::Bool(b) => *b,
            Value::Str(s) => !s.is_empty(),
            Value::Null => false,
            Value::List(items) => !items.borrow().is_empty(),
            Value::Shell(items) => !items.is_empty(),
            Value::Dict(d) => !d.borrow().is_empty(),
            Value::Function(_) | Value::Class(_) | Value::Object(_) | Value::Builtin(_) => true,
        }
    }

    /// Scalars and shells of scalars may key a dict.
    pub fn is_hashable(&self) -> bool {
        match self {
            Value::Int(_) | Value::Float(_) | Value::Bool(_) | Value::Str(_) | Value::Null => true,
            Value::Shell(items) => items.iter().all(Value::is_hashable),
            _ => false,
        }
    }

    /// Elements visited by `for`, in order: a snapshot of a list, the items
    /// of a shell, the characters of a string, or the keys of a dict.
    pub fn iter_values(&self) -> Result<Vec<Value>, RuntimeError> {
        match self {
            Value::List(items) => Ok(items.borrow().clone()),
            Value::Shell(items) => Ok(items.as_ref().clone()),
            Value::Str(s) => Ok(s.chars().map(|c| Value::Str(c.to_string())).collect()),
            Value::Dict(d) => Ok(d.borrow().keys()),
            other => Err(RuntimeError::Type(format!(
                "'{}' object is not iterable",
                other.type_name()
            ))),
        }
    }

    pub fn as_number(&self) -> Option<f64> {
        match self {
            Value::Int(v) => Some(*v as f64),
            Value::Float(v) => Some(*v),
            Value::Bool(b) => Some(f64::from(u8::from(*b))),
            _ => None,
        }
    }

    /// Quoted form used for elements nested inside collections.
    pub fn repr(&self) -> String {
        match self {
            Value::Str(s) => format!("'{}'", s.replace('\\', "\\\\").replace('\'', "\\'")),
            other => other.to_string(),
        }
    }
}

// ============================================================================
// Cycle guard
// ============================================================================

/// Which recursive walk a container is taking part in.
#[derive(Clone, Copy, PartialEq, Eq)]
enum Walk {
    Display,
    Serialize,
    Equal,
}

thread_local! {
    static ACTIVE: RefCell<Vec<(Walk, usize, usize)>> = const { RefCell::new(Vec::new()) };
}

/// Marks a container as entered for one walk; dropping it unmarks.
/// `enter` returns `None` when the same container is already on the way
/// down, which means the structure loops back on itself.
struct Visit((Walk, usize, usize));

impl Visit {
    fn enter(walk: Walk, a: usize, b: usize) -> Option<Visit> {
        ACTIVE.with(|active| {
            let mut active = active.borrow_mut();
            let key = (walk, a, b);
            if active.contains(&key) {
                None
            } else {
                active.push(key);
                Some(Visit(key))
            }
        })
    }
}

impl Drop for Visit {
    fn drop(&mut self) {
        ACTIVE.with(|active| {
            let mut active = active.borrow_mut();
            if let Some(i) = active.iter().rposition(|k| *k == self.0) {
                active.remove(i);
            }
        });
    }
}

fn addr<T>(rc: &Rc<T>) -> usize {
    Rc::as_ptr(rc) as *const () as usize
}

/// Exact: a decimal equals an integer only when it holds that integer.
fn int_eq_float(a: i64, b: f64) -> bool {
    // i64::MIN is exactly representable; i64::MAX is not
    b.fract() == 0.0 && b >= i64::MIN as f64 && b < -(i64::MIN as f64) && b as i64 == a
}

fn fmt_float(v: f64, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    if v.is_nan() {
        write!(f, "nan")
    } else if v.is_infinite() {
        write!(f, "{}", if v > 0.0 { "inf" } else { "-inf" })
    } else if v.fract() == 0.0 && v.abs() < 1e16 {
        write!(f, "{v:.1}")
    } else {
        write!(f, "{v}")
    }
}

fn fmt_items(f: &mut fmt::Formatter<'_>, items: &[Value]) -> fmt::Result {
    for (i, item) in items.iter().enumerate() {
        if i > 0 {
            write!(f, ", ")?;
        }
        write!(f, "{}", item.repr())?;
    }
    Ok(())
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Int(v) => write!(f, "{v}"),
            Value::Float(v) => fmt_float(*v, f),
            Value::Bool(b) => write!(f, "{b}"),
            Value::Str(s) => write!(f, "{s}"),
            Value::Null => write!(f, "null"),
            Value::List(items) => {
                let Some(_visit) = Visit::enter(Walk::Display, addr(items), 0) else {
                    return write!(f, "[...]");
                };
                write!(f, "[")?;
                fmt_items(f, &items.borrow())?;
                write!(f, "]")
            }
            Value::Shell(items) => {
                write!(f, "(")?;
                fmt_items(f, items)?;
                if items.len() == 1 {
                    write!(f, ",")?;
                }
                write!(f, ")")
            }
            Value::Dict(d) => {
                let Some(_visit) = Visit::enter(Walk::Display, addr(d), 0) else {
                    return write!(f, "{{...}}");
                };
                write!(f, "{{")?;
                for (i, (k, v)) in d.borrow().entries.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}: {}", k.repr(), v.repr())?;
                }
                write!(f, "}}")
            }
            Value::Function(decl) => write!(f, "<function {}>", decl.name.text),
            Value::Class(decl) => write!(f, "<class {}>", decl.name.text),
            Value::Object(obj) => {
                let Some(_visit) = Visit::enter(Walk::Display, addr(obj), 0) else {
                    return write!(f, "{}(...)", obj.borrow().class.name.text);
                };
                let obj = obj.borrow();
                write!(f, "{}(", obj.class.name.text)?;
                // Sort fields for deterministic output
                let mut fields: Vec<_> = obj.fields.iter().collect();
                fields.sort_by_key(|(k, _)| *k);
                for (i, (name, value)) in fields.into_iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}={}", name, value.repr())?;
                }
                write!(f, ")")
            }
            Value::Builtin(native) => write!(f, "<builtin {}>", native.name),
        }
    }
}

/// Structural equality; integers and decimals compare numerically, callables
/// and objects by identity. Two containers met again while already being
/// compared are taken as equal, so cyclic structures terminate.
impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Int(a), Value::Int(b)) => a == b,
            (Value::Int(a), Value::Float(b)) | (Value::Float(b), Value::Int(a)) => {
                int_eq_float(*a, *b)
            }
            (Value::Float(a), Value::Float(b)) => a == b,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Str(a), Value::Str(b)) => a == b,
            (Value::Null, Value::Null) => true,
            (Value::List(a), Value::List(b)) => {
                if Rc::ptr_eq(a, b) {
                    return true;
                }
                match Visit::enter(Walk::Equal, addr(a), addr(b)) {
                    Some(_visit) => *a.borrow() == *b.borrow(),
                    None => true,
                }
            }
            (Value::Shell(a), Value::Shell(b)) => a == b,
            (Value::Dict(a), Value::Dict(b)) => {
                if Rc::ptr_eq(a, b) {
                    return true;
                }
                match Visit::enter(Walk::Equal, addr(a), addr(b)) {
                    Some(_visit) => *a.borrow() == *b.borrow(),
                    None => true,
                }
            }
            (Value::Function(a), Value::Function(b)) => Rc::ptr_eq(a, b),
            (Value::Class(a), Value::Class(b)) => Rc::ptr_eq(a, b),
            (Value::Object(a), Value::Object(b)) => Rc::ptr_eq(a, b),
            (Value::Builtin(a), Value::Builtin(b)) => Rc::ptr_eq(a, b),
            _ => false,
        }
    }
}

/// JSON view used by `cup run --format json`.
impl Serialize for Value {
    fn serialize<S: Serializer>(&self, s: S) -> Result<S::Ok, S::Error> {
        match self {
            Value::Int(v) => s.serialize_i64(*v),
            Value::Float(v) => s.serialize_f64(*v),
            Value::Bool(b) => s.serialize_bool(*b),
            Value::Str(v) => s.serialize_str(v),
            Value::Null => s.serialize_unit(),
            Value::List(items) => {
                let _visit = Visit::enter(Walk::Serialize, addr(items), 0)
                    .ok_or_else(|| S::Error::custom("cannot serialize a cyclic list"))?;
                let items = items.borrow();
                let mut seq = s.serialize_seq(Some(items.len()))?;
                for item in items.iter() {
                    seq.serialize_element(item)?;
                }
                seq.end()
            }
            Value::Shell(items) => {
                let mut seq = s.serialize_seq(Some(items.len()))?;
                for item in items.iter() {
                    seq.serialize_element(item)?;
                }
                seq.end()
            }
            Value::Dict(d) => {
                let _visit = Visit::enter(Walk::Serialize, addr(d), 0)
                    .ok_or_else(|| S::Error::custom("cannot serialize a cyclic dict"))?;
                let d = d.borrow();
                let mut map = s.serialize_map(Some(d.len()))?;
                for (k, v) in &d.entries {
                    map.serialize_entry(&k.to_string(), v)?;
                }
                map.end()
            }
            Value::Object(obj) => {
                let _visit = Visit::enter(Walk::Serialize, addr(obj), 0)
                    .ok_or_else(|| S::Error::custom("cannot serialize a cyclic object"))?;
                let obj = obj.borrow();
                let mut fields: Vec<_> = obj.fields.iter().collect();
                fields.sort_by_key(|(k, _)| *k);
                let mut map = s.serialize_map(Some(fields.len() + 1))?;
                map.serialize_entry("class", &obj.class.name.text)?;
                for (k, v) in fields {
                    map.serialize_entry(k, v)?;
                }
                map.end()
            }
            Value::Function(_) | Value::Class(_) | Value::Builtin(_) => {
                s.serialize_str(&self.to_string())
            }
        }
    }
}

/// Insertion-ordered map with value keys.
#[derive(Debug, Clone, Default)]
pub struct Dict {
    entries: Vec<(Value, Value)>,
}

impl Dict {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, key: &Value) -> Option<&Value> {
        self.entries.iter().find(|(k, _)| k == key).map(|(_, v)| v)
    }

    pub fn contains_key(&self, key: &Value) -> bool {
        self.get(key).is_some()
    }

    /// Insert or overwrite; a new key goes to the end.
    pub fn insert(&mut self, key: Value, value: Value) -> Result<(), RuntimeError> {
        if !key.is_hashable() {
            return Err(RuntimeError::Type(format!(
                "unhashable type: '{}'",
                key.type_name()
            )));
        }
        match self.entries.iter_mut().find(|(k, _)| *k == key) {
            Some((_, slot)) => *slot = value,
            None => self.entries.push((key, value)),
        }
        Ok(())
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn keys(&self) -> Vec<Value> {
        self.entries.iter().map(|(k, _)| k.clone()).collect()
    }

    pub fn values(&self) -> Vec<Value> {
        self.entries.iter().map(|(_, v)| v.clone()).collect()
    }

    pub fn entries(&self) -> &[(Value, Value)] {
        &self.entries
    }
}

/// Order-insensitive: same keys mapped to equal values.
impl PartialEq for Dict {
    fn eq(&self, other: &Self) -> bool {
        self.len() == other.len()
            && self
                .entries
                .iter()
                .all(|(k, v)| other.get(k).is_some_and(|w| v == w))
    }
}

#[derive(Debug, Clone)]
pub struct Object {
    pub class: Rc<ClassDecl>,
    pub fields: HashMap<String, Value>,
}

impl Object {
    pub fn new(class: Rc<ClassDecl>, fields: HashMap<String, Value>) -> Value {
        Value::Object(Rc::new(RefCell::new(Object { class, fields })))
    }
}
