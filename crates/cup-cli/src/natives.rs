//! Native function registry and the standard built-in table.
//!
//! A native is a named callable with a fixed parameter list. The evaluator
//! checks arity, binds the evaluated arguments to the parameter names and
//! hands the resulting [`NativeArgs`] to the implementation together with the
//! calling environment. No scope is pushed for a native call.

use std::cmp::Ordering;
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::io::{self, BufRead, Write};
use std::rc::Rc;

use cup_ast::ast::{BinOp, Node};

use crate::env::Env;
use crate::error::RuntimeError;
use crate::eval;
use crate::ops;
use crate::value::{Dict, Value};

/// Signature of every native implementation.
pub type NativeImpl = fn(&NativeArgs, &mut Env) -> Result<Value, RuntimeError>;

/// A built-in callable installed under `name`.
pub struct NativeFn {
    pub name: String,
    pub params: Vec<String>,
    pub imp: NativeImpl,
}

impl fmt::Debug for NativeFn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NativeFn")
            .field("name", &self.name)
            .field("params", &self.params)
            .finish()
    }
}

/// Arguments of one native call, keyed by parameter name.
#[derive(Debug)]
pub struct NativeArgs {
    name: String,
    values: HashMap<String, Value>,
}

impl NativeArgs {
    pub fn new(name: impl Into<String>, values: HashMap<String, Value>) -> Self {
        Self {
            name: name.into(),
            values,
        }
    }

    pub fn get(&self, param: &str) -> Result<&Value, RuntimeError> {
        self.values.get(param).ok_or_else(|| {
            RuntimeError::Internal(format!("{}: no argument bound to '{param}'", self.name))
        })
    }

    fn expected(&self, param: &str, what: &str, got: &Value) -> RuntimeError {
        RuntimeError::Type(format!(
            "{}() argument '{param}' must be {what}, not '{}'",
            self.name,
            got.type_name()
        ))
    }

    pub fn int(&self, param: &str) -> Result<i64, RuntimeError> {
        match self.get(param)? {
            Value::Int(n) => Ok(*n),
            other => Err(self.expected(param, "integer", other)),
        }
    }

    /// Integer, or `None` for `null`.
    pub fn opt_int(&self, param: &str) -> Result<Option<i64>, RuntimeError> {
        match self.get(param)? {
            Value::Null => Ok(None),
            Value::Int(n) => Ok(Some(*n)),
            other => Err(self.expected(param, "integer or null", other)),
        }
    }

    pub fn num(&self, param: &str) -> Result<f64, RuntimeError> {
        let v = self.get(param)?;
        v.as_number()
            .ok_or_else(|| self.expected(param, "a number", v))
    }

    pub fn str(&self, param: &str) -> Result<&str, RuntimeError> {
        match self.get(param)? {
            Value::Str(s) => Ok(s),
            other => Err(self.expected(param, "string", other)),
        }
    }
}

/// Name → native table.
#[derive(Default)]
pub struct NativeRegistry {
    natives: BTreeMap<String, Rc<NativeFn>>,
}

impl fmt::Debug for NativeRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names: Vec<_> = self.natives.keys().collect();
        f.debug_struct("NativeRegistry")
            .field("natives", &names)
            .finish()
    }
}

impl NativeRegistry {
    /// Empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry holding the standard built-in table.
    pub fn with_defaults() -> Self {
        let mut reg = Self::new();

        // I/O
        reg.register("read", &["inp"], native_read);
        reg.register("say", &["out"], native_say);

        // collections and strings
        reg.register("size", &["obj"], native_size);
        reg.register("cut", &["obj", "start", "stop", "step"], native_cut);
        reg.register("swap", &["obj", "obj1", "obj2"], native_swap);
        reg.register("invert", &["obj"], native_invert);
        reg.register("sort", &["obj"], native_sort);
        reg.register("add", &["obj1", "obj"], native_add);
        reg.register("find", &["obj1", "obj"], native_find);
        reg.register("count", &["obj1", "obj"], native_count);
        reg.register("erase", &["obj1", "obj"], native_erase);
        reg.register("clear", &["obj"], native_clear);
        reg.register("upcase", &["str"], native_upcase);
        reg.register("lowcase", &["str"], native_lowcase);
        reg.register("isupcase", &["str"], native_isupcase);
        reg.register("islowcase", &["str"], native_islowcase);
        reg.register("title", &["str"], native_title);
        reg.register("istitle", &["str"], native_istitle);
        reg.register("isalpha", &["str"], native_isalpha);
        reg.register("isdigit", &["str"], native_isdigit);
        reg.register("isascii", &["str"], native_isascii);
        reg.register("keys", &["obj"], native_keys);
        reg.register("values", &["obj"], native_values);
        reg.register("items", &["obj"], native_items);
        reg.register("copy", &["obj"], native_copy);
        reg.register("join", &["txt", "obj"], native_join);
        reg.register("split", &["txt", "obj"], native_split);

        // conversion
        for name in ["ordinal", "ord"] {
            reg.register(name, &["obj"], native_ord);
        }
        for name in ["string", "str"] {
            reg.register(name, &["obj"], native_str);
        }
        for name in ["char", "chr"] {
            reg.register(name, &["obj"], native_chr);
        }
        for name in ["integer", "int"] {
            reg.register(name, &["obj"], native_int);
        }
        for name in ["decimal", "dec"] {
            reg.register(name, &["obj"], native_dec);
        }
        for name in ["logic", "bool"] {
            reg.register(name, &["obj"], native_logic);
        }
        reg.register("list", &["iter"], native_list);
        reg.register("shell", &["iter"], native_shell);
        reg.register("dict", &["iter"], native_dict);
        reg.register("bin", &["obj"], native_bin);
        reg.register("hex", &["obj"], native_hex);
        reg.register("oct", &["obj"], native_oct);

        // math
        reg.register("round", &["obj"], native_round);
        reg.register("abs", &["obj"], native_abs);
        reg.register("sqrt", &["obj"], native_sqrt);
        reg.register("cbrt", &["obj"], native_cbrt);
        reg.register("pow", &["obj", "obj1"], native_pow);
        reg.register("max", &["obj"], native_max);
        reg.register("min", &["obj"], native_min);
        reg.register("lcm", &["obj"], native_lcm);
        reg.register("gcd", &["obj"], native_gcd);
        reg.register("sum", &["obj"], native_sum);
        reg.register("prod", &["obj"], native_prod);
        reg.register("ceil", &["obj"], native_ceil);
        reg.register("floor", &["obj"], native_floor);
        reg.register("factorial", &["obj"], native_factorial);
        reg.register("log", &["base", "obj"], native_log);
        reg.register("sin", &["obj"], native_sin);
        reg.register("cos", &["obj"], native_cos);
        reg.register("tan", &["obj"], native_tan);
        reg.register("sinh", &["obj"], native_sinh);
        reg.register("cosh", &["obj"], native_cosh);
        reg.register("tanh", &["obj"], native_tanh);
        reg.register("asin", &["obj"], native_asin);
        reg.register("acos", &["obj"], native_acos);
        reg.register("atan", &["obj"], native_atan);
        reg.register("asinh", &["obj"], native_asinh);
        reg.register("acosh", &["obj"], native_acosh);
        reg.register("atanh", &["obj"], native_atanh);
        reg.register("deg", &["obj"], native_deg);
        reg.register("rad", &["obj"], native_rad);

        // other
        reg.register("limit", &["start", "stop", "step"], native_limit);
        reg.register("typeof", &["obj"], native_typeof);
        reg.register("enum", &["obj"], native_enum);
        reg.register("all", &["obj"], native_all);
        reg.register("any", &["obj"], native_any);
        reg.register("merge", &["obj1", "obj2"], native_merge);
        reg.register("filter", &["obj", "cond"], native_filter);
        reg.register("run", &["code"], native_run);
        reg.register("solve", &["obj"], native_solve);

        reg
    }

    /// Add or replace a native.
    pub fn register(&mut self, name: &str, params: &[&str], imp: NativeImpl) {
        let native = NativeFn {
            name: name.to_string(),
            params: params.iter().map(|p| p.to_string()).collect(),
            imp,
        };
        self.natives.insert(name.to_string(), Rc::new(native));
    }

    pub fn get(&self, name: &str) -> Option<Rc<NativeFn>> {
        self.natives.get(name).cloned()
    }

    pub fn len(&self) -> usize {
        self.natives.len()
    }

    pub fn is_empty(&self) -> bool {
        self.natives.is_empty()
    }

    /// Bind every native in the innermost scope of `env`.
    pub fn install(&self, env: &mut Env) {
        for (name, native) in &self.natives {
            env.define(name.clone(), Value::Builtin(Rc::clone(native)));
        }
    }
}

// ============================================================================
// Helpers
// ============================================================================

fn not_supported(name: &str, v: &Value) -> RuntimeError {
    RuntimeError::Type(format!(
        "{name}() is not supported for '{}'",
        v.type_name()
    ))
}

fn domain_error() -> RuntimeError {
    RuntimeError::Value("math domain error".into())
}

/// Decimal result; NaN from a non-NaN input is a domain error.
fn float_result(input: f64, out: f64) -> Result<Value, RuntimeError> {
    if out.is_nan() && !input.is_nan() {
        return Err(domain_error());
    }
    Ok(Value::Float(out))
}

/// Positions selected by a slice, with negative bounds counted from the end.
fn slice_indices(
    len: usize,
    start: Option<i64>,
    stop: Option<i64>,
    step: Option<i64>,
) -> Result<Vec<usize>, RuntimeError> {
    let step = step.unwrap_or(1);
    if step == 0 {
        return Err(RuntimeError::Value("slice step cannot be zero".into()));
    }
    let len = i64::try_from(len).map_err(|_| RuntimeError::Value("sequence too long".into()))?;
    let norm = |v: i64| if v < 0 { v.saturating_add(len) } else { v };
    let mut out = Vec::new();
    if step > 0 {
        let mut i = start.map_or(0, |s| norm(s).clamp(0, len));
        let stop = stop.map_or(len, |s| norm(s).clamp(0, len));
        while i < stop {
            out.push(i as usize);
            match i.checked_add(step) {
                Some(next) => i = next,
                None => break,
            }
        }
    } else {
        let mut i = start.map_or(len - 1, |s| norm(s).clamp(-1, len - 1));
        let stop = stop.map_or(-1, |s| norm(s).clamp(-1, len - 1));
        while i > stop {
            out.push(i as usize);
            match i.checked_add(step) {
                Some(next) => i = next,
                None => break,
            }
        }
    }
    Ok(out)
}

/// Stable merge sort with a fallible comparison.
fn sort_values(mut items: Vec<Value>) -> Result<Vec<Value>, RuntimeError> {
    if items.len() < 2 {
        return Ok(items);
    }
    let right = items.split_off(items.len() / 2);
    let left = sort_values(items)?;
    let right = sort_values(right)?;

    let mut merged = Vec::with_capacity(left.len() + right.len());
    let mut left = left.into_iter().peekable();
    let mut right = right.into_iter().peekable();
    while let (Some(l), Some(r)) = (left.peek(), right.peek()) {
        let take_right = ops::compare(r, l)? == Some(Ordering::Less);
        let next = if take_right { right.next() } else { left.next() };
        merged.extend(next);
    }
    merged.extend(left);
    merged.extend(right);
    Ok(merged)
}

fn extreme(name: &str, args: &NativeArgs, wanted: Ordering) -> Result<Value, RuntimeError> {
    let mut items = args.get("obj")?.iter_values()?.into_iter();
    let mut best = items
        .next()
        .ok_or_else(|| RuntimeError::Value(format!("{name}() arg is an empty sequence")))?;
    for item in items {
        if ops::compare(&item, &best)? == Some(wanted) {
            best = item;
        }
    }
    Ok(best)
}

fn int_items(name: &str, v: &Value) -> Result<Vec<i64>, RuntimeError> {
    v.iter_values()?
        .into_iter()
        .map(|item| match item {
            Value::Int(n) => Ok(n),
            other => Err(RuntimeError::Type(format!(
                "{name}() expects integers, got '{}'",
                other.type_name()
            ))),
        })
        .collect()
}

fn gcd_u64(mut a: u64, mut b: u64) -> u64 {
    while b != 0 {
        (a, b) = (b, a % b);
    }
    a
}

fn to_int(v: u64) -> Result<Value, RuntimeError> {
    i64::try_from(v)
        .map(Value::Int)
        .map_err(|_| RuntimeError::Value("integer overflow".into()))
}

fn radix(args: &NativeArgs, prefix: &str, digits: fn(u64) -> String) -> Result<Value, RuntimeError> {
    let n = args.int("obj")?;
    let sign = if n < 0 { "-" } else { "" };
    Ok(Value::Str(format!("{sign}{prefix}{}", digits(n.unsigned_abs()))))
}

fn title_case(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut prev_cased = false;
    for c in s.chars() {
        if prev_cased {
            out.extend(c.to_lowercase());
        } else {
            out.extend(c.to_uppercase());
        }
        prev_cased = c.is_alphabetic();
    }
    out
}

fn is_title(s: &str) -> bool {
    let mut cased = false;
    let mut prev_cased = false;
    for c in s.chars() {
        if c.is_uppercase() {
            if prev_cased {
                return false;
            }
            prev_cased = true;
            cased = true;
        } else if c.is_lowercase() {
            if !prev_cased {
                return false;
            }
            prev_cased = true;
            cased = true;
        } else {
            prev_cased = false;
        }
    }
    cased
}

/// At least one cased character and none of the other case.
fn all_cased(s: &str, upper: bool) -> bool {
    let mut cased = false;
    for c in s.chars() {
        if (upper && c.is_lowercase()) || (!upper && c.is_uppercase()) {
            return false;
        }
        cased |= c.is_uppercase() || c.is_lowercase();
    }
    cased
}

fn char_index(haystack: &str, byte: usize) -> i64 {
    haystack[..byte].chars().count() as i64
}

// ============================================================================
// I/O
// ============================================================================

fn native_read(args: &NativeArgs, _env: &mut Env) -> Result<Value, RuntimeError> {
    let prompt = args.get("inp")?;
    let mut stdout = io::stdout();
    write!(stdout, "{prompt}")
        .and_then(|_| stdout.flush())
        .map_err(|e| RuntimeError::Io(format!("read: {e}")))?;

    let mut line = String::new();
    let n = io::stdin()
        .lock()
        .read_line(&mut line)
        .map_err(|e| RuntimeError::Io(format!("read: {e}")))?;
    if n == 0 {
        return Err(RuntimeError::Io("read: end of input".into()));
    }
    let trimmed = line.trim_end_matches(['\n', '\r']);
    Ok(Value::str(trimmed))
}

fn native_say(args: &NativeArgs, _env: &mut Env) -> Result<Value, RuntimeError> {
    let out = args.get("out")?;
    let mut stdout = io::stdout();
    writeln!(stdout, "{out}").map_err(|e| RuntimeError::Io(format!("say: {e}")))?;
    Ok(Value::Null)
}

// ============================================================================
// Collections and strings
// ============================================================================

fn native_size(args: &NativeArgs, _env: &mut Env) -> Result<Value, RuntimeError> {
    let len = match args.get("obj")? {
        Value::Str(s) => s.chars().count(),
        Value::List(items) => items.borrow().len(),
        Value::Shell(items) => items.len(),
        Value::Dict(d) => d.borrow().len(),
        other => return Err(not_supported("size", other)),
    };
    Ok(Value::Int(len as i64))
}

fn native_cut(args: &NativeArgs, _env: &mut Env) -> Result<Value, RuntimeError> {
    let start = args.opt_int("start")?;
    let stop = args.opt_int("stop")?;
    let step = args.opt_int("step")?;
    match args.get("obj")? {
        Value::Str(s) => {
            let chars: Vec<char> = s.chars().collect();
            let picked = slice_indices(chars.len(), start, stop, step)?;
            Ok(Value::Str(picked.into_iter().map(|i| chars[i]).collect()))
        }
        Value::List(items) => {
            let items = items.borrow();
            let picked = slice_indices(items.len(), start, stop, step)?;
            Ok(Value::list(picked.into_iter().map(|i| items[i].clone()).collect()))
        }
        Value::Shell(items) => {
            let picked = slice_indices(items.len(), start, stop, step)?;
            Ok(Value::shell(picked.into_iter().map(|i| items[i].clone()).collect()))
        }
        other => Err(not_supported("cut", other)),
    }
}

fn native_swap(args: &NativeArgs, _env: &mut Env) -> Result<Value, RuntimeError> {
    let old = args.get("obj1")?;
    let new = args.get("obj2")?;
    match args.get("obj")? {
        Value::Str(s) => match (old, new) {
            (Value::Str(old), Value::Str(new)) => Ok(Value::Str(s.replace(old.as_str(), new))),
            _ => Err(RuntimeError::Type(
                "swap() on a string needs string arguments".into(),
            )),
        },
        Value::List(items) => {
            let swapped = items
                .borrow()
                .iter()
                .map(|v| if v == old { new.clone() } else { v.clone() })
                .collect();
            Ok(Value::list(swapped))
        }
        other => Err(not_supported("swap", other)),
    }
}

fn native_invert(args: &NativeArgs, _env: &mut Env) -> Result<Value, RuntimeError> {
    match args.get("obj")? {
        Value::Str(s) => Ok(Value::Str(s.chars().rev().collect())),
        Value::List(items) => Ok(Value::list(items.borrow().iter().rev().cloned().collect())),
        Value::Shell(items) => Ok(Value::shell(items.iter().rev().cloned().collect())),
        other => Err(not_supported("invert", other)),
    }
}

fn native_sort(args: &NativeArgs, _env: &mut Env) -> Result<Value, RuntimeError> {
    let items = args.get("obj")?.iter_values()?;
    Ok(Value::list(sort_values(items)?))
}

fn native_add(args: &NativeArgs, _env: &mut Env) -> Result<Value, RuntimeError> {
    let item = args.get("obj1")?.clone();
    match args.get("obj")? {
        Value::List(items) => {
            items.borrow_mut().push(item);
            Ok(Value::Null)
        }
        other => Err(not_supported("add", other)),
    }
}

fn native_find(args: &NativeArgs, _env: &mut Env) -> Result<Value, RuntimeError> {
    let needle = args.get("obj1")?;
    let pos = match (args.get("obj")?, needle) {
        (Value::Str(s), Value::Str(sub)) => s.find(sub.as_str()).map(|b| char_index(s, b)),
        (Value::Str(_), other) => {
            return Err(RuntimeError::Type(format!(
                "must be string, not '{}'",
                other.type_name()
            )))
        }
        (Value::List(items), _) => items.borrow().iter().position(|v| v == needle).map(|i| i as i64),
        (Value::Shell(items), _) => items.iter().position(|v| v == needle).map(|i| i as i64),
        (other, _) => return Err(not_supported("find", other)),
    };
    Ok(Value::Int(pos.unwrap_or(-1)))
}

fn native_count(args: &NativeArgs, _env: &mut Env) -> Result<Value, RuntimeError> {
    let needle = args.get("obj1")?;
    let n = match (args.get("obj")?, needle) {
        (Value::Str(s), Value::Str(sub)) if sub.is_empty() => s.chars().count() + 1,
        (Value::Str(s), Value::Str(sub)) => s.matches(sub.as_str()).count(),
        (Value::Str(_), other) => {
            return Err(RuntimeError::Type(format!(
                "must be string, not '{}'",
                other.type_name()
            )))
        }
        (Value::List(items), _) => items.borrow().iter().filter(|v| *v == needle).count(),
        (Value::Shell(items), _) => items.iter().filter(|v| *v == needle).count(),
        (other, _) => return Err(not_supported("count", other)),
    };
    Ok(Value::Int(n as i64))
}

fn native_erase(args: &NativeArgs, _env: &mut Env) -> Result<Value, RuntimeError> {
    let needle = args.get("obj1")?;
    match args.get("obj")? {
        Value::List(items) => {
            // the needle may be this very list, so search before borrowing mutably
            let pos = items
                .borrow()
                .iter()
                .position(|v| v == needle)
                .ok_or_else(|| RuntimeError::Value("erase(x): x not in list".into()))?;
            items.borrow_mut().remove(pos);
            Ok(Value::Null)
        }
        other => Err(not_supported("erase", other)),
    }
}

fn native_clear(args: &NativeArgs, _env: &mut Env) -> Result<Value, RuntimeError> {
    match args.get("obj")? {
        Value::List(items) => items.borrow_mut().clear(),
        Value::Dict(d) => d.borrow_mut().clear(),
        other => return Err(not_supported("clear", other)),
    }
    Ok(Value::Null)
}

fn native_upcase(args: &NativeArgs, _env: &mut Env) -> Result<Value, RuntimeError> {
    Ok(Value::str(args.str("str")?.to_uppercase()))
}

fn native_lowcase(args: &NativeArgs, _env: &mut Env) -> Result<Value, RuntimeError> {
    Ok(Value::str(args.str("str")?.to_lowercase()))
}

fn native_isupcase(args: &NativeArgs, _env: &mut Env) -> Result<Value, RuntimeError> {
    Ok(Value::Bool(all_cased(args.str("str")?, true)))
}

fn native_islowcase(args: &NativeArgs, _env: &mut Env) -> Result<Value, RuntimeError> {
    Ok(Value::Bool(all_cased(args.str("str")?, false)))
}

fn native_title(args: &NativeArgs, _env: &mut Env) -> Result<Value, RuntimeError> {
    Ok(Value::str(title_case(args.str("str")?)))
}

fn native_istitle(args: &NativeArgs, _env: &mut Env) -> Result<Value, RuntimeError> {
    Ok(Value::Bool(is_title(args.str("str")?)))
}

fn native_isalpha(args: &NativeArgs, _env: &mut Env) -> Result<Value, RuntimeError> {
    let s = args.str("str")?;
    Ok(Value::Bool(!s.is_empty() && s.chars().all(char::is_alphabetic)))
}

fn native_isdigit(args: &NativeArgs, _env: &mut Env) -> Result<Value, RuntimeError> {
    let s = args.str("str")?;
    Ok(Value::Bool(!s.is_empty() && s.chars().all(|c| c.is_ascii_digit())))
}

fn native_isascii(args: &NativeArgs, _env: &mut Env) -> Result<Value, RuntimeError> {
    Ok(Value::Bool(args.str("str")?.is_ascii()))
}

fn native_keys(args: &NativeArgs, _env: &mut Env) -> Result<Value, RuntimeError> {
    match args.get("obj")? {
        Value::Dict(d) => Ok(Value::list(d.borrow().keys())),
        other => Err(not_supported("keys", other)),
    }
}

fn native_values(args: &NativeArgs, _env: &mut Env) -> Result<Value, RuntimeError> {
    match args.get("obj")? {
        Value::Dict(d) => Ok(Value::list(d.borrow().values())),
        other => Err(not_supported("values", other)),
    }
}

fn native_items(args: &NativeArgs, _env: &mut Env) -> Result<Value, RuntimeError> {
    match args.get("obj")? {
        Value::Dict(d) => Ok(Value::list(
            d.borrow()
                .entries()
                .iter()
                .map(|(k, v)| Value::shell(vec![k.clone(), v.clone()]))
                .collect(),
        )),
        other => Err(not_supported("items", other)),
    }
}

/// Shallow copy: a fresh list or dict holding the same elements.
fn native_copy(args: &NativeArgs, _env: &mut Env) -> Result<Value, RuntimeError> {
    Ok(match args.get("obj")? {
        Value::List(items) => Value::list(items.borrow().clone()),
        Value::Dict(d) => Value::dict(d.borrow().clone()),
        other => other.clone(),
    })
}

fn native_join(args: &NativeArgs, _env: &mut Env) -> Result<Value, RuntimeError> {
    let sep = args.str("obj")?;
    let parts = args
        .get("txt")?
        .iter_values()?
        .into_iter()
        .enumerate()
        .map(|(i, item)| match item {
            Value::Str(s) => Ok(s),
            other => Err(RuntimeError::Type(format!(
                "sequence item {i}: expected string, '{}' found",
                other.type_name()
            ))),
        })
        .collect::<Result<Vec<_>, _>>()?;
    Ok(Value::Str(parts.join(sep)))
}

/// A falsy separator splits on runs of whitespace.
fn native_split(args: &NativeArgs, _env: &mut Env) -> Result<Value, RuntimeError> {
    let text = args.str("txt")?;
    let sep = args.get("obj")?;
    let parts: Vec<Value> = match sep {
        s if !s.truthy() => text.split_whitespace().map(Value::str).collect(),
        Value::Str(sep) => text.split(sep.as_str()).map(Value::str).collect(),
        other => {
            return Err(RuntimeError::Type(format!(
                "split() separator must be string, not '{}'",
                other.type_name()
            )))
        }
    };
    Ok(Value::list(parts))
}

// ============================================================================
// Conversion
// ============================================================================

fn native_ord(args: &NativeArgs, _env: &mut Env) -> Result<Value, RuntimeError> {
    let s = args.str("obj")?;
    let mut chars = s.chars();
    match (chars.next(), chars.next()) {
        (Some(c), None) => Ok(Value::Int(i64::from(u32::from(c)))),
        _ => Err(RuntimeError::Type(format!(
            "ord() expected a character, but string of length {} found",
            s.chars().count()
        ))),
    }
}

fn native_str(args: &NativeArgs, _env: &mut Env) -> Result<Value, RuntimeError> {
    Ok(Value::Str(args.get("obj")?.to_string()))
}

fn native_chr(args: &NativeArgs, _env: &mut Env) -> Result<Value, RuntimeError> {
    let n = args.int("obj")?;
    u32::try_from(n)
        .ok()
        .and_then(char::from_u32)
        .map(|c| Value::Str(c.to_string()))
        .ok_or_else(|| RuntimeError::Value(format!("chr() arg {n} not in range")))
}

fn native_int(args: &NativeArgs, _env: &mut Env) -> Result<Value, RuntimeError> {
    match args.get("obj")? {
        Value::Int(n) => Ok(Value::Int(*n)),
        Value::Bool(b) => Ok(Value::Int(i64::from(*b))),
        Value::Float(f) => ops::float_to_int(f.trunc()).map(Value::Int),
        Value::Str(s) => s.trim().parse::<i64>().map(Value::Int).map_err(|_| {
            RuntimeError::Value(format!("invalid literal for integer(): '{s}'"))
        }),
        other => Err(not_supported("integer", other)),
    }
}

fn native_dec(args: &NativeArgs, _env: &mut Env) -> Result<Value, RuntimeError> {
    ops::to_float(args.get("obj")?).map(Value::Float)
}

fn native_logic(args: &NativeArgs, _env: &mut Env) -> Result<Value, RuntimeError> {
    Ok(Value::Bool(args.get("obj")?.truthy()))
}

fn native_list(args: &NativeArgs, _env: &mut Env) -> Result<Value, RuntimeError> {
    Ok(Value::list(args.get("iter")?.iter_values()?))
}

fn native_shell(args: &NativeArgs, _env: &mut Env) -> Result<Value, RuntimeError> {
    Ok(Value::shell(args.get("iter")?.iter_values()?))
}

/// A dict copies; any other iterable must yield key/value pairs.
fn native_dict(args: &NativeArgs, _env: &mut Env) -> Result<Value, RuntimeError> {
    let source = args.get("iter")?;
    if let Value::Dict(d) = source {
        return Ok(Value::dict(d.borrow().clone()));
    }
    let mut dict = Dict::new();
    for (i, pair) in source.iter_values()?.into_iter().enumerate() {
        let pair = match pair {
            Value::List(_) | Value::Shell(_) => pair.iter_values()?,
            other => {
                return Err(RuntimeError::Type(format!(
                    "dict() element #{i} is a '{}', not a pair",
                    other.type_name()
                )))
            }
        };
        let [key, value]: [Value; 2] = pair.try_into().map_err(|p: Vec<Value>| {
            RuntimeError::Value(format!(
                "dict() element #{i} has length {}; 2 is required",
                p.len()
            ))
        })?;
        dict.insert(key, value)?;
    }
    Ok(Value::dict(dict))
}

fn native_bin(args: &NativeArgs, _env: &mut Env) -> Result<Value, RuntimeError> {
    radix(args, "0b", |n| format!("{n:b}"))
}

fn native_hex(args: &NativeArgs, _env: &mut Env) -> Result<Value, RuntimeError> {
    radix(args, "0x", |n| format!("{n:x}"))
}

fn native_oct(args: &NativeArgs, _env: &mut Env) -> Result<Value, RuntimeError> {
    radix(args, "0o", |n| format!("{n:o}"))
}

// ============================================================================
// Math
// ============================================================================

fn native_round(args: &NativeArgs, _env: &mut Env) -> Result<Value, RuntimeError> {
    ops::round_half_even(args.get("obj")?)
}

fn native_abs(args: &NativeArgs, _env: &mut Env) -> Result<Value, RuntimeError> {
    match args.get("obj")? {
        Value::Int(n) => n
            .checked_abs()
            .map(Value::Int)
            .ok_or_else(|| RuntimeError::Value("integer overflow".into())),
        Value::Float(f) => Ok(Value::Float(f.abs())),
        other => Err(not_supported("abs", other)),
    }
}

fn native_sqrt(args: &NativeArgs, _env: &mut Env) -> Result<Value, RuntimeError> {
    let x = args.num("obj")?;
    float_result(x, x.sqrt())
}

fn native_cbrt(args: &NativeArgs, _env: &mut Env) -> Result<Value, RuntimeError> {
    let x = args.num("obj")?;
    Ok(Value::Float(x.cbrt()))
}

fn native_pow(args: &NativeArgs, _env: &mut Env) -> Result<Value, RuntimeError> {
    ops::binary(BinOp::Pow, args.get("obj")?.clone(), args.get("obj1")?.clone())
}

fn native_max(args: &NativeArgs, _env: &mut Env) -> Result<Value, RuntimeError> {
    extreme("max", args, Ordering::Greater)
}

fn native_min(args: &NativeArgs, _env: &mut Env) -> Result<Value, RuntimeError> {
    extreme("min", args, Ordering::Less)
}

fn native_gcd(args: &NativeArgs, _env: &mut Env) -> Result<Value, RuntimeError> {
    let g = int_items("gcd", args.get("obj")?)?
        .into_iter()
        .fold(0, |acc, n| gcd_u64(acc, n.unsigned_abs()));
    to_int(g)
}

fn native_lcm(args: &NativeArgs, _env: &mut Env) -> Result<Value, RuntimeError> {
    let mut acc: u64 = 1;
    for n in int_items("lcm", args.get("obj")?)? {
        let n = n.unsigned_abs();
        if acc == 0 || n == 0 {
            acc = 0;
            continue;
        }
        acc = (acc / gcd_u64(acc, n))
            .checked_mul(n)
            .ok_or_else(|| RuntimeError::Value("integer overflow".into()))?;
    }
    to_int(acc)
}

fn native_sum(args: &NativeArgs, _env: &mut Env) -> Result<Value, RuntimeError> {
    args.get("obj")?
        .iter_values()?
        .into_iter()
        .try_fold(Value::Int(0), |acc, v| ops::binary(BinOp::Add, acc, v))
}

fn native_prod(args: &NativeArgs, _env: &mut Env) -> Result<Value, RuntimeError> {
    args.get("obj")?
        .iter_values()?
        .into_iter()
        .try_fold(Value::Int(1), |acc, v| ops::binary(BinOp::Mul, acc, v))
}

fn native_ceil(args: &NativeArgs, _env: &mut Env) -> Result<Value, RuntimeError> {
    match args.get("obj")? {
        Value::Int(n) => Ok(Value::Int(*n)),
        Value::Float(f) => ops::float_to_int(f.ceil()).map(Value::Int),
        other => Err(not_supported("ceil", other)),
    }
}

fn native_floor(args: &NativeArgs, _env: &mut Env) -> Result<Value, RuntimeError> {
    match args.get("obj")? {
        Value::Int(n) => Ok(Value::Int(*n)),
        Value::Float(f) => ops::float_to_int(f.floor()).map(Value::Int),
        other => Err(not_supported("floor", other)),
    }
}

fn native_factorial(args: &NativeArgs, _env: &mut Env) -> Result<Value, RuntimeError> {
    let n = args.int("obj")?;
    if n < 0 {
        return Err(RuntimeError::Value(
            "factorial() not defined for negative values".into(),
        ));
    }
    (2..=n)
        .try_fold(1i64, |acc, k| acc.checked_mul(k))
        .map(Value::Int)
        .ok_or_else(|| RuntimeError::Value("integer overflow".into()))
}

fn native_log(args: &NativeArgs, _env: &mut Env) -> Result<Value, RuntimeError> {
    let base = args.num("base")?;
    let x = args.num("obj")?;
    if x <= 0.0 || base <= 0.0 {
        return Err(domain_error());
    }
    if base == 1.0 {
        return Err(RuntimeError::ZeroDivision("float division by zero".into()));
    }
    Ok(Value::Float(x.ln() / base.ln()))
}

macro_rules! float_natives {
    ($($name:ident => $f:path),* $(,)?) => {
        $(
            fn $name(args: &NativeArgs, _env: &mut Env) -> Result<Value, RuntimeError> {
                let x = args.num("obj")?;
                float_result(x, $f(x))
            }
        )*
    };
}

float_natives! {
    native_sin => f64::sin,
    native_cos => f64::cos,
    native_tan => f64::tan,
    native_sinh => f64::sinh,
    native_cosh => f64::cosh,
    native_tanh => f64::tanh,
    native_asin => f64::asin,
    native_acos => f64::acos,
    native_atan => f64::atan,
    native_asinh => f64::asinh,
    native_acosh => f64::acosh,
    native_atanh => f64::atanh,
    native_deg => f64::to_degrees,
    native_rad => f64::to_radians,
}

// ============================================================================
// Other
// ============================================================================

fn native_limit(args: &NativeArgs, _env: &mut Env) -> Result<Value, RuntimeError> {
    let start = args.int("start")?;
    let stop = args.int("stop")?;
    let step = args.int("step")?;
    if step == 0 {
        return Err(RuntimeError::Value("limit() step must not be zero".into()));
    }
    let mut out = Vec::new();
    let mut i = start;
    while (step > 0 && i < stop) || (step < 0 && i > stop) {
        out.push(Value::Int(i));
        match i.checked_add(step) {
            Some(next) => i = next,
            None => break,
        }
    }
    Ok(Value::list(out))
}

fn native_typeof(args: &NativeArgs, _env: &mut Env) -> Result<Value, RuntimeError> {
    Ok(Value::str(args.get("obj")?.type_name()))
}

fn native_enum(args: &NativeArgs, _env: &mut Env) -> Result<Value, RuntimeError> {
    let pairs = args
        .get("obj")?
        .iter_values()?
        .into_iter()
        .enumerate()
        .map(|(i, v)| Value::shell(vec![Value::Int(i as i64), v]))
        .collect();
    Ok(Value::list(pairs))
}

fn native_all(args: &NativeArgs, _env: &mut Env) -> Result<Value, RuntimeError> {
    let items = args.get("obj")?.iter_values()?;
    Ok(Value::Bool(items.iter().all(Value::truthy)))
}

fn native_any(args: &NativeArgs, _env: &mut Env) -> Result<Value, RuntimeError> {
    let items = args.get("obj")?.iter_values()?;
    Ok(Value::Bool(items.iter().any(Value::truthy)))
}

fn native_merge(args: &NativeArgs, _env: &mut Env) -> Result<Value, RuntimeError> {
    let left = args.get("obj1")?.iter_values()?;
    let right = args.get("obj2")?.iter_values()?;
    let pairs = left
        .into_iter()
        .zip(right)
        .map(|(a, b)| Value::shell(vec![a, b]))
        .collect();
    Ok(Value::list(pairs))
}

/// Items for which `cond(item)` is truthy; a `null` condition keeps truthy items.
fn native_filter(args: &NativeArgs, env: &mut Env) -> Result<Value, RuntimeError> {
    let cond = args.get("cond")?.clone();
    let mut kept = Vec::new();
    for item in args.get("obj")?.iter_values()? {
        let keep = match &cond {
            Value::Null => item.truthy(),
            f => eval::call_value(env, f, vec![item.clone()])?.truthy(),
        };
        if keep {
            kept.push(item);
        }
    }
    Ok(Value::list(kept))
}

fn native_run(args: &NativeArgs, env: &mut Env) -> Result<Value, RuntimeError> {
    let code = args.str("code")?.to_string();
    log::debug!("run: {} bytes of source", code.len());
    eval::run_source(&code, env)
}

fn is_expression(node: &Node) -> bool {
    matches!(
        node,
        Node::Lit(..)
            | Node::Ident(_)
            | Node::Binary { .. }
            | Node::Unary { .. }
            | Node::Call { .. }
            | Node::CallClass { .. }
            | Node::List { .. }
            | Node::Shell { .. }
            | Node::Dict { .. }
            | Node::Subscript { .. }
    )
}

/// Evaluate a single expression given as source text.
fn native_solve(args: &NativeArgs, env: &mut Env) -> Result<Value, RuntimeError> {
    let program = cup_parse::parse_str(args.str("obj")?)?;
    match program.body.as_slice() {
        [node] if is_expression(node) => eval::eval_program(&program, env),
        _ => Err(RuntimeError::Value(
            "solve() expects a single expression".into(),
        )),
    }
}
