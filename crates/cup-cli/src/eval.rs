//! Evaluator for Cup programs
//!
//! A tree-walking interpreter over the closed `Node` enum. Non-local exits
//! (`quit`, `continue`, `skip`, `return`, `throw`) travel as `ControlFlow`
//! values, so each construct states which signals it consumes and which it
//! hands to its parent.

use std::cell::Cell;
use std::collections::HashMap;
use std::rc::Rc;

use cup_ast::ast::{ClassDecl, ConditionElif, FnDecl, Ident, Lit, Node, Program, Unless, WhenPattern};
use cup_parse::{parse, parse_str, Lexer};

use crate::env::Env;
use crate::error::{CupError, RuntimeError};
use crate::natives::{NativeArgs, NativeFn};
use crate::ops;
use crate::value::{Dict, Object, Value};

/// Maximum call depth to prevent stack overflow from deep recursion
pub const MAX_CALL_DEPTH: u32 = 1000;

thread_local! {
    /// Current call depth (thread-local for safety)
    static CALL_DEPTH: Cell<u32> = const { Cell::new(0) };
}

/// Outcome of evaluating a node
///
/// Everything except `Value` is a signal travelling outward to the construct
/// that consumes it: loops take `Quit`/`Continue`/`Skip`, calls take
/// `Return`/`Skip`, `do` blocks take `Throw`.
#[derive(Debug, Clone)]
pub enum ControlFlow {
    /// Normal value result
    Value(Value),
    Quit,
    Continue,
    Skip,
    /// Return statement - bubbles up to function boundary
    Return(Value),
    Throw(Value),
}

impl ControlFlow {
    pub fn is_value(&self) -> bool {
        matches!(self, ControlFlow::Value(_))
    }

    /// Keyword that raised the signal.
    pub fn signal_name(&self) -> &'static str {
        match self {
            ControlFlow::Value(_) => "value",
            ControlFlow::Quit => "quit",
            ControlFlow::Continue => "continue",
            ControlFlow::Skip => "skip",
            ControlFlow::Return(_) => "return",
            ControlFlow::Throw(_) => "throw",
        }
    }
}

pub type EvalResult = Result<ControlFlow, RuntimeError>;

/// Evaluate to a plain value, or return early with whatever signal came back.
macro_rules! value_of {
    ($e:expr) => {
        match $e? {
            ControlFlow::Value(v) => v,
            signal => return Ok(signal),
        }
    };
}

fn null() -> ControlFlow {
    ControlFlow::Value(Value::Null)
}

// ============================================================================
// Entry points
// ============================================================================

/// Evaluate source text in a fresh root environment holding the standard natives.
pub fn evaluate(src: &str, verbose: bool) -> Result<Value, CupError> {
    let mut env = Env::with_defaults();
    evaluate_in(src, &mut env, verbose)
}

/// Evaluate source text in a caller-supplied environment.
///
/// Bindings made by the program stay in `env`, which is what lets a REPL
/// carry state from one input to the next.
pub fn evaluate_in(src: &str, env: &mut Env, verbose: bool) -> Result<Value, CupError> {
    let toks = Lexer::new(src).tokenize()?;
    if verbose {
        for tok in &toks {
            log::info!("token {}:{} {:?}", tok.span.line, tok.span.column, tok.kind);
        }
    }

    let program = parse(toks)?;
    if verbose {
        log::info!("ast: {:#?}", program.body);
    }

    let value = eval_program(&program, env)?;
    if verbose {
        // Sort bindings for deterministic output
        let mut bindings: Vec<_> = env
            .globals()
            .iter()
            .filter(|(_, v)| !matches!(v, Value::Builtin(_)))
            .collect();
        bindings.sort_by_key(|(name, _)| *name);
        for (name, v) in bindings {
            log::info!("{name} = {}", v.repr());
        }
    }
    Ok(value)
}

/// Run a parsed program in `env`. A signal that reaches the top is an error.
pub fn eval_program(program: &Program, env: &mut Env) -> Result<Value, RuntimeError> {
    match eval_body(env, &program.body)? {
        ControlFlow::Value(v) => Ok(v),
        ControlFlow::Throw(v) => Err(RuntimeError::Uncaught(v)),
        signal => Err(RuntimeError::UncaughtSignal(signal.signal_name())),
    }
}

/// Parse and run source text in the calling environment (`run`, `solve`).
pub fn run_source(src: &str, env: &mut Env) -> Result<Value, RuntimeError> {
    let program = parse_str(src)?;
    eval_program(&program, env)
}

/// Call a callable value from native code.
pub fn call_value(env: &mut Env, target: &Value, args: Vec<Value>) -> Result<Value, RuntimeError> {
    check_arity(target, args.len())?;
    match invoke(env, target, args)? {
        ControlFlow::Value(v) => Ok(v),
        ControlFlow::Throw(v) => Err(RuntimeError::Uncaught(v)),
        signal => Err(RuntimeError::UncaughtSignal(signal.signal_name())),
    }
}

// ============================================================================
// Statements and expressions
// ============================================================================

/// Evaluate a statement sequence; its value is the last statement's value.
pub fn eval_body(env: &mut Env, body: &[Node]) -> EvalResult {
    let mut last = Value::Null;
    for node in body {
        last = value_of!(eval_node(env, node));
    }
    Ok(ControlFlow::Value(last))
}

/// Body of a clause; `skip` ends it early with `null`.
fn eval_clause(env: &mut Env, body: &[Node]) -> EvalResult {
    match eval_body(env, body)? {
        ControlFlow::Skip => Ok(null()),
        other => Ok(other),
    }
}

pub fn eval_node(env: &mut Env, node: &Node) -> EvalResult {
    match node {
        Node::Lit(lit, _) => Ok(ControlFlow::Value(match lit {
            Lit::Int(v) => Value::Int(*v),
            Lit::Float(v) => Value::Float(*v),
            Lit::Str(s) => Value::Str(s.clone()),
            Lit::Bool(b) => Value::Bool(*b),
            Lit::Null => Value::Null,
        })),

        Node::Ident(id) => match env.get(&id.text) {
            Some(v) => Ok(ControlFlow::Value(v.clone())),
            None => Err(RuntimeError::Name(format!(
                "Name \"{}\" is not defined",
                id.text
            ))),
        },

        Node::Assign { target, value, span } => {
            match target.as_ref() {
                Node::Subscript {
                    target: collection,
                    key,
                    ..
                } => {
                    let collection = value_of!(eval_node(env, collection));
                    let key = value_of!(eval_node(env, key));
                    let value = value_of!(eval_node(env, value));
                    set_item(&collection, key, value)?;
                }
                Node::Ident(id) => {
                    let value = value_of!(eval_node(env, value));
                    env.define(id.text.clone(), value);
                }
                _ => {
                    return Err(RuntimeError::Internal(format!(
                        "invalid assignment target at line {}",
                        span.line
                    )))
                }
            }
            Ok(null())
        }

        Node::Binary { op, lhs, rhs, .. } => {
            // both sides always run, `and`/`or` included
            let l = value_of!(eval_node(env, lhs));
            let r = value_of!(eval_node(env, rhs));
            Ok(ControlFlow::Value(ops::binary(*op, l, r)?))
        }

        Node::Unary { op, expr, .. } => {
            let v = value_of!(eval_node(env, expr));
            Ok(ControlFlow::Value(ops::unary(*op, v)?))
        }

        Node::Function(decl) => {
            env.define(decl.name.text.clone(), Value::Function(Rc::clone(decl)));
            Ok(null())
        }

        Node::Class(decl) => {
            env.define(decl.name.text.clone(), Value::Class(Rc::clone(decl)));
            Ok(null())
        }

        Node::Call { callee, args, .. } | Node::CallClass { callee, args, .. } => {
            eval_call(env, callee, args)
        }

        Node::Condition {
            test,
            if_body,
            elifs,
            else_body,
            ..
        } => eval_condition(env, test, if_body, elifs, else_body.as_deref()),

        Node::Use { obj, library, .. } => {
            log::debug!("use {} of {}: nothing to load", obj.text, library.text);
            Ok(null())
        }

        Node::Do {
            body,
            unlesses,
            last_body,
            ..
        } => eval_do(env, body, unlesses, last_body.as_deref()),

        Node::When {
            test,
            patterns,
            else_body,
            ..
        } => eval_when(env, test, patterns, else_body.as_deref()),

        Node::While {
            test,
            body,
            else_body,
            ..
        } => eval_while(env, test, body, else_body.as_deref()),

        Node::For {
            var,
            collection,
            body,
            ..
        } => eval_for(env, var, collection, body),

        Node::Quit(_) => Ok(ControlFlow::Quit),
        Node::Continue(_) => Ok(ControlFlow::Continue),
        Node::Skip(_) => Ok(ControlFlow::Skip),

        Node::Return { value, .. } => {
            let v = match value {
                Some(e) => value_of!(eval_node(env, e)),
                None => Value::Null,
            };
            Ok(ControlFlow::Return(v))
        }

        Node::Throw { value, .. } => {
            let v = match value {
                Some(e) => value_of!(eval_node(env, e)),
                None => Value::Null,
            };
            Ok(ControlFlow::Throw(v))
        }

        Node::List { items, .. } => {
            let mut out = Vec::with_capacity(items.len());
            for item in items {
                out.push(value_of!(eval_node(env, item)));
            }
            Ok(ControlFlow::Value(Value::list(out)))
        }

        Node::Shell { items, .. } => {
            let mut out = Vec::with_capacity(items.len());
            for item in items {
                out.push(value_of!(eval_node(env, item)));
            }
            Ok(ControlFlow::Value(Value::shell(out)))
        }

        Node::Dict { pairs, .. } => {
            let mut dict = Dict::new();
            for (k, v) in pairs {
                let k = value_of!(eval_node(env, k));
                let v = value_of!(eval_node(env, v));
                dict.insert(k, v)?;
            }
            Ok(ControlFlow::Value(Value::dict(dict)))
        }

        Node::Subscript { target, key, .. } => {
            let target = value_of!(eval_node(env, target));
            let key = value_of!(eval_node(env, key));
            Ok(ControlFlow::Value(get_item(&target, &key)?))
        }
    }
}

fn eval_condition(
    env: &mut Env,
    test: &Node,
    if_body: &[Node],
    elifs: &[ConditionElif],
    else_body: Option<&[Node]>,
) -> EvalResult {
    if value_of!(eval_node(env, test)).truthy() {
        return eval_clause(env, if_body);
    }
    for elif in elifs {
        if value_of!(eval_node(env, &elif.test)).truthy() {
            return eval_clause(env, &elif.body);
        }
    }
    match else_body {
        Some(body) => eval_clause(env, body),
        None => Ok(null()),
    }
}

/// Run the clause whose pattern equals the subject.
fn eval_when(
    env: &mut Env,
    test: &Node,
    patterns: &[WhenPattern],
    else_body: Option<&[Node]>,
) -> EvalResult {
    let subject = value_of!(eval_node(env, test));
    for clause in patterns {
        if value_of!(eval_node(env, &clause.pattern)) == subject {
            return eval_clause(env, &clause.body);
        }
    }
    match else_body {
        Some(body) => eval_clause(env, body),
        None => Ok(null()),
    }
}

fn eval_while(env: &mut Env, test: &Node, body: &[Node], else_body: Option<&[Node]>) -> EvalResult {
    loop {
        if !value_of!(eval_node(env, test)).truthy() {
            break;
        }
        match eval_body(env, body)? {
            ControlFlow::Quit => return Ok(null()),
            ControlFlow::Value(_) | ControlFlow::Continue | ControlFlow::Skip => continue,
            signal => return Ok(signal),
        }
    }

    // runs only when the test turned false, never after `quit`
    match else_body {
        Some(body) => eval_clause(env, body),
        None => Ok(null()),
    }
}

fn eval_for(env: &mut Env, var: &Ident, collection: &Node, body: &[Node]) -> EvalResult {
    let items = value_of!(eval_node(env, collection)).iter_values()?;
    for item in items {
        env.define(var.text.clone(), item);
        match eval_body(env, body)? {
            ControlFlow::Quit => break,
            ControlFlow::Value(_) | ControlFlow::Continue | ControlFlow::Skip => continue,
            signal => return Ok(signal),
        }
    }
    Ok(null())
}

/// `do` / `unless` / `last`
///
/// A `throw` or runtime error from the body is caught when an `unless`
/// condition equals the thrown value (or the error kind name) or is `true`.
/// The `last` body runs in every case; a signal it raises replaces the
/// block's outcome.
fn eval_do(
    env: &mut Env,
    body: &[Node],
    unlesses: &[Unless],
    last_body: Option<&[Node]>,
) -> EvalResult {
    let outcome = eval_clause(env, body);
    let caught = match &outcome {
        Ok(ControlFlow::Throw(v)) => Some(v.clone()),
        Ok(_) => None,
        Err(err) => err.caught_value(),
    };

    let result = match caught {
        Some(caught) => {
            log::debug!("do: caught {}", caught.repr());
            match eval_unless(env, unlesses, &caught) {
                Ok(Some(handled)) => Ok(handled),
                Ok(None) => outcome,
                Err(err) => Err(err),
            }
        }
        None => outcome,
    };

    let Some(last) = last_body else {
        return result;
    };
    match eval_clause(env, last)? {
        ControlFlow::Value(_) => result,
        signal => Ok(signal),
    }
}

/// Run the first matching `unless` clause; `None` when no clause matches.
fn eval_unless(
    env: &mut Env,
    unlesses: &[Unless],
    caught: &Value,
) -> Result<Option<ControlFlow>, RuntimeError> {
    for clause in unlesses {
        let cond = match eval_node(env, &clause.condition)? {
            ControlFlow::Value(v) => v,
            signal => return Ok(Some(signal)),
        };
        if cond == *caught || matches!(cond, Value::Bool(true)) {
            return eval_clause(env, &clause.body).map(Some);
        }
    }
    Ok(None)
}

// ============================================================================
// Calls
// ============================================================================

fn not_callable(v: &Value) -> RuntimeError {
    RuntimeError::Type(format!("'{}' object is not callable", v.type_name()))
}

fn check_arity(target: &Value, given: usize) -> Result<(), RuntimeError> {
    let (name, expected) = match target {
        Value::Function(decl) => (decl.name.text.as_str(), decl.params.len()),
        Value::Class(decl) => (decl.name.text.as_str(), decl.params.len()),
        Value::Builtin(native) => (native.name.as_str(), native.params.len()),
        other => return Err(not_callable(other)),
    };
    if given != expected {
        return Err(RuntimeError::Arity(format!(
            "{name}() takes {expected} argument{} but {given} {} given",
            if expected == 1 { "" } else { "s" },
            if given == 1 { "was" } else { "were" },
        )));
    }
    Ok(())
}

/// Evaluate a call: callee, arity check, then arguments left to right.
fn eval_call(env: &mut Env, callee: &Node, args: &[Node]) -> EvalResult {
    let target = value_of!(eval_node(env, callee));
    check_arity(&target, args.len())?;

    let mut values = Vec::with_capacity(args.len());
    for arg in args {
        values.push(value_of!(eval_node(env, arg)));
    }
    invoke(env, &target, values)
}

/// Call with depth accounting.
fn invoke(env: &mut Env, target: &Value, args: Vec<Value>) -> EvalResult {
    let depth = CALL_DEPTH.with(|d| {
        let current = d.get();
        d.set(current + 1);
        current + 1
    });

    if depth > MAX_CALL_DEPTH {
        CALL_DEPTH.with(|d| d.set(d.get().saturating_sub(1)));
        return Err(RuntimeError::Recursion(MAX_CALL_DEPTH));
    }

    // Ensure we decrement depth even on error/return
    let result = invoke_inner(env, target, args);

    CALL_DEPTH.with(|d| d.set(d.get().saturating_sub(1)));

    result
}

fn invoke_inner(env: &mut Env, target: &Value, args: Vec<Value>) -> EvalResult {
    match target {
        Value::Function(decl) => call_function(env, decl, args),
        Value::Class(decl) => instantiate(env, decl, args),
        Value::Builtin(native) => call_native(env, native, args),
        other => Err(not_callable(other)),
    }
}

fn bind_params(env: &mut Env, params: &[Ident], args: Vec<Value>) {
    for (param, arg) in params.iter().zip(args) {
        env.define(param.text.clone(), arg);
    }
}

/// The callee's scope sits on top of the call-site scope. A `throw` that
/// escapes the body ends the call the way `return` does.
fn call_function(env: &mut Env, decl: &FnDecl, args: Vec<Value>) -> EvalResult {
    log::debug!("call {}/{}", decl.name.text, args.len());
    env.with_scope(|env| {
        bind_params(env, &decl.params, args);
        Ok(match eval_body(env, &decl.body)? {
            ControlFlow::Value(v) | ControlFlow::Return(v) => ControlFlow::Value(v),
            ControlFlow::Throw(v) => {
                log::debug!("{} threw {}", decl.name.text, v.repr());
                ControlFlow::Value(v)
            }
            ControlFlow::Skip => null(),
            signal => signal,
        })
    })
}

/// Run the class body in a fresh scope; its bindings become the object's fields.
fn instantiate(env: &mut Env, decl: &Rc<ClassDecl>, args: Vec<Value>) -> EvalResult {
    log::debug!("instantiate {}", decl.name.text);
    env.push_scope();
    bind_params(env, &decl.params, args);
    let outcome = eval_body(env, &decl.body);
    let fields = env.pop_scope()?;
    match outcome? {
        ControlFlow::Value(_) | ControlFlow::Skip => Ok(ControlFlow::Value(Object::new(
            Rc::clone(decl),
            fields,
        ))),
        signal => Ok(signal),
    }
}

fn call_native(env: &mut Env, native: &NativeFn, args: Vec<Value>) -> EvalResult {
    log::debug!("native {}", native.name);
    let bound: HashMap<String, Value> = native.params.iter().cloned().zip(args).collect();
    let value = (native.imp)(&NativeArgs::new(native.name.as_str(), bound), env)?;
    Ok(ControlFlow::Value(value))
}

// ============================================================================
// Subscripts
// ============================================================================

/// Resolve a possibly negative index against `len`.
fn resolve_index(kind: &str, len: usize, key: &Value) -> Result<usize, RuntimeError> {
    let Value::Int(i) = key else {
        return Err(RuntimeError::Type(format!(
            "{kind} indices must be integers, not '{}'",
            key.type_name()
        )));
    };
    let len = len as i64;
    let idx = if *i < 0 { i + len } else { *i };
    if idx < 0 || idx >= len {
        return Err(RuntimeError::Index(format!("{kind} index out of range")));
    }
    Ok(idx as usize)
}

fn field_name<'a>(key: &'a Value) -> Result<&'a str, RuntimeError> {
    match key {
        Value::Str(s) => Ok(s),
        other => Err(RuntimeError::Type(format!(
            "object field names must be strings, not '{}'",
            other.type_name()
        ))),
    }
}

fn get_item(target: &Value, key: &Value) -> Result<Value, RuntimeError> {
    match target {
        Value::List(items) => {
            let items = items.borrow();
            Ok(items[resolve_index("list", items.len(), key)?].clone())
        }
        Value::Shell(items) => Ok(items[resolve_index("shell", items.len(), key)?].clone()),
        Value::Str(s) => {
            let idx = resolve_index("string", s.chars().count(), key)?;
            s.chars()
                .nth(idx)
                .map(|c| Value::Str(c.to_string()))
                .ok_or_else(|| RuntimeError::Index("string index out of range".into()))
        }
        Value::Dict(d) => d
            .borrow()
            .get(key)
            .cloned()
            .ok_or_else(|| RuntimeError::Key(key.repr())),
        Value::Object(obj) => {
            let name = field_name(key)?;
            obj.borrow()
                .fields
                .get(name)
                .cloned()
                .ok_or_else(|| RuntimeError::Key(key.repr()))
        }
        other => Err(RuntimeError::Type(format!(
            "'{}' object is not subscriptable",
            other.type_name()
        ))),
    }
}

fn set_item(target: &Value, key: Value, value: Value) -> Result<(), RuntimeError> {
    match target {
        Value::List(items) => {
            let mut items = items.borrow_mut();
            let idx = resolve_index("list assignment", items.len(), &key)?;
            items[idx] = value;
            Ok(())
        }
        Value::Dict(d) => d.borrow_mut().insert(key, value),
        Value::Object(obj) => {
            let name = field_name(&key)?.to_string();
            obj.borrow_mut().fields.insert(name, value);
            Ok(())
        }
        other => Err(RuntimeError::Type(format!(
            "'{}' object does not support item assignment",
            other.type_name()
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cup_ast::ast::{BinOp, UnOp};
    use cup_ast::span::Span;

    fn sp() -> Span {
        Span::new(1, 1)
    }

    fn ident(name: &str) -> Ident {
        Ident {
            text: name.to_string(),
            span: sp(),
        }
    }

    fn int(n: i64) -> Node {
        Node::Lit(Lit::Int(n), sp())
    }

    fn string(s: &str) -> Node {
        Node::Lit(Lit::Str(s.to_string()), sp())
    }

    fn name(n: &str) -> Node {
        Node::Ident(ident(n))
    }

    fn assign(target: Node, value: Node) -> Node {
        Node::Assign {
            target: Box::new(target),
            value: Box::new(value),
            span: sp(),
        }
    }

    fn bin(op: BinOp, lhs: Node, rhs: Node) -> Node {
        Node::Binary {
            op,
            lhs: Box::new(lhs),
            rhs: Box::new(rhs),
            span: sp(),
        }
    }

    fn call(callee: &str, args: Vec<Node>) -> Node {
        Node::Call {
            callee: Box::new(name(callee)),
            args,
            span: sp(),
        }
    }

    fn function(n: &str, params: &[&str], body: Vec<Node>) -> Node {
        Node::Function(Rc::new(FnDecl {
            name: ident(n),
            params: params.iter().map(|p| ident(p)).collect(),
            body,
            span: sp(),
        }))
    }

    fn run(body: Vec<Node>) -> Result<Value, RuntimeError> {
        let mut env = Env::new();
        eval_program(&Program { body }, &mut env)
    }

    #[test]
    fn arithmetic_respects_tree_shape() {
        let expr = bin(BinOp::Add, int(1), bin(BinOp::Mul, int(2), int(3)));
        assert_eq!(run(vec![expr]).unwrap(), Value::Int(7));
    }

    #[test]
    fn empty_program_is_null() {
        assert_eq!(run(vec![]).unwrap(), Value::Null);
    }

    #[test]
    fn variable_bound_to_null_is_not_an_error() {
        let body = vec![assign(name("x"), Node::Lit(Lit::Null, sp())), name("x")];
        assert_eq!(run(body).unwrap(), Value::Null);
    }

    #[test]
    fn unbound_name() {
        let err = run(vec![name("y")]).unwrap_err();
        assert_eq!(err.to_string(), "NameError: Name \"y\" is not defined");
    }

    #[test]
    fn statements_yield_null() {
        let body = vec![int(3), assign(name("x"), int(1))];
        assert_eq!(run(body).unwrap(), Value::Null);
    }

    #[test]
    fn callee_sees_the_call_site_scope() {
        // let g(): return local
        // let f(): local = 5; return g()
        let body = vec![
            function(
                "g",
                &[],
                vec![Node::Return {
                    value: Some(Box::new(name("local"))),
                    span: sp(),
                }],
            ),
            function(
                "f",
                &[],
                vec![
                    assign(name("local"), int(5)),
                    Node::Return {
                        value: Some(Box::new(call("g", vec![]))),
                        span: sp(),
                    },
                ],
            ),
            call("f", vec![]),
        ];
        assert_eq!(run(body).unwrap(), Value::Int(5));
    }

    #[test]
    fn call_scope_is_dropped_after_error() {
        let mut env = Env::new();
        let program = Program {
            body: vec![function("f", &["a"], vec![name("missing")]), call("f", vec![int(1)])],
        };
        assert!(eval_program(&program, &mut env).is_err());
        assert_eq!(env.depth(), 1);
        assert!(env.get("a").is_none());
        assert!(env.get("f").is_some());
    }

    #[test]
    fn arity_is_checked_before_arguments_run() {
        let body = vec![function("f", &["a"], vec![name("a")]), call("f", vec![name("nope"), int(2)])];
        let err = run(body).unwrap_err();
        assert_eq!(err.kind(), "ArityError");
    }

    #[test]
    fn skip_in_function_yields_null() {
        let body = vec![
            function("f", &[], vec![Node::Skip(sp()), int(9)]),
            call("f", vec![]),
        ];
        assert_eq!(run(body).unwrap(), Value::Null);
    }

    #[test]
    fn quit_leaves_the_loop_and_skips_else() {
        // i = 0
        // while true:
        //     i = i + 1
        //     if i == 3: quit
        // else: i = 100
        let body = vec![
            assign(name("i"), int(0)),
            Node::While {
                test: Box::new(Node::Lit(Lit::Bool(true), sp())),
                body: vec![
                    assign(name("i"), bin(BinOp::Add, name("i"), int(1))),
                    Node::Condition {
                        test: Box::new(bin(BinOp::Eq, name("i"), int(3))),
                        if_body: vec![Node::Quit(sp())],
                        elifs: vec![],
                        else_body: None,
                        span: sp(),
                    },
                ],
                else_body: Some(vec![assign(name("i"), int(100))]),
                span: sp(),
            },
            name("i"),
        ];
        assert_eq!(run(body).unwrap(), Value::Int(3));
    }

    #[test]
    fn while_else_value_on_exhaustion() {
        let node = Node::While {
            test: Box::new(Node::Lit(Lit::Bool(false), sp())),
            body: vec![],
            else_body: Some(vec![int(42)]),
            span: sp(),
        };
        assert_eq!(run(vec![node]).unwrap(), Value::Int(42));
    }

    #[test]
    fn for_continue_skips_rest_of_iteration() {
        // total = 0
        // for x in [1, 2, 3]:
        //     if x == 2: continue  (continue propagates out of the if)
        //     total = total + x
        let body = vec![
            assign(name("total"), int(0)),
            Node::For {
                var: ident("x"),
                collection: Box::new(Node::List {
                    items: vec![int(1), int(2), int(3)],
                    span: sp(),
                }),
                body: vec![
                    Node::Condition {
                        test: Box::new(bin(BinOp::Eq, name("x"), int(2))),
                        if_body: vec![Node::Continue(sp())],
                        elifs: vec![],
                        else_body: None,
                        span: sp(),
                    },
                    assign(name("total"), bin(BinOp::Add, name("total"), name("x"))),
                ],
                span: sp(),
            },
            name("total"),
        ];
        assert_eq!(run(body).unwrap(), Value::Int(4));
    }

    #[test]
    fn when_picks_the_equal_pattern() {
        let node = Node::When {
            test: Box::new(int(2)),
            patterns: vec![
                WhenPattern {
                    pattern: int(1),
                    body: vec![string("one")],
                    span: sp(),
                },
                WhenPattern {
                    pattern: Node::Lit(Lit::Float(2.0), sp()),
                    body: vec![string("two")],
                    span: sp(),
                },
            ],
            else_body: Some(vec![string("other")]),
            span: sp(),
        };
        assert_eq!(run(vec![node]).unwrap(), Value::str("two"));
    }

    fn do_block(body: Vec<Node>, unlesses: Vec<(Node, Vec<Node>)>, last: Option<Vec<Node>>) -> Node {
        Node::Do {
            body,
            unlesses: unlesses
                .into_iter()
                .map(|(condition, body)| Unless {
                    condition,
                    body,
                    span: sp(),
                })
                .collect(),
            last_body: last,
            span: sp(),
        }
    }

    fn throw(v: Node) -> Node {
        Node::Throw {
            value: Some(Box::new(v)),
            span: sp(),
        }
    }

    #[test]
    fn unless_catches_matching_throw() {
        let body = vec![
            do_block(
                vec![throw(string("boom"))],
                vec![(string("other"), vec![int(0)]), (string("boom"), vec![int(1)])],
                Some(vec![assign(name("cleaned"), Node::Lit(Lit::Bool(true), sp()))]),
            ),
        ];
        let mut env = Env::new();
        let v = eval_program(&Program { body }, &mut env).unwrap();
        assert_eq!(v, Value::Int(1));
        assert_eq!(env.get("cleaned"), Some(&Value::Bool(true)));
    }

    #[test]
    fn unless_sees_runtime_error_kind() {
        let body = vec![do_block(
            vec![name("missing")],
            vec![(string("NameError"), vec![string("handled")])],
            None,
        )];
        assert_eq!(run(body).unwrap(), Value::str("handled"));
    }

    #[test]
    fn unmatched_error_propagates_after_last() {
        let body = vec![do_block(
            vec![bin(BinOp::Div, int(1), int(0))],
            vec![(string("NameError"), vec![int(0)])],
            Some(vec![assign(name("ran"), int(1))]),
        )];
        let mut env = Env::new();
        let err = eval_program(&Program { body }, &mut env).unwrap_err();
        assert_eq!(err.kind(), "ZeroDivisionError");
        assert_eq!(env.get("ran"), Some(&Value::Int(1)));
    }

    #[test]
    fn uncaught_throw_reaches_the_top() {
        let err = run(vec![throw(int(7))]).unwrap_err();
        assert!(matches!(err, RuntimeError::Uncaught(Value::Int(7))));
    }

    #[test]
    fn class_body_bindings_become_fields() {
        // class P(a): b = a + 1
        // p = P(1)
        // p["b"]
        let class = Node::Class(Rc::new(ClassDecl {
            name: ident("P"),
            params: vec![ident("a")],
            body: vec![assign(name("b"), bin(BinOp::Add, name("a"), int(1)))],
            span: sp(),
        }));
        let body = vec![
            class,
            assign(
                name("p"),
                Node::CallClass {
                    callee: Box::new(name("P")),
                    args: vec![int(1)],
                    span: sp(),
                },
            ),
            Node::Subscript {
                target: Box::new(name("p")),
                key: Box::new(string("b")),
                span: sp(),
            },
        ];
        assert_eq!(run(body).unwrap(), Value::Int(2));
    }

    #[test]
    fn subscript_assignment_mutates_shared_list() {
        // xs = [1, 2, 3]; ys = xs; ys[-2] = 9; xs
        let body = vec![
            assign(
                name("xs"),
                Node::List {
                    items: vec![int(1), int(2), int(3)],
                    span: sp(),
                },
            ),
            assign(name("ys"), name("xs")),
            assign(
                Node::Subscript {
                    target: Box::new(name("ys")),
                    key: Box::new(Node::Unary {
                        op: UnOp::Neg,
                        expr: Box::new(int(2)),
                        span: sp(),
                    }),
                    span: sp(),
                },
                int(9),
            ),
            name("xs"),
        ];
        assert_eq!(run(body).unwrap().to_string(), "[1, 9, 3]");
    }

    #[test]
    fn index_out_of_range() {
        let node = Node::Subscript {
            target: Box::new(string("ab")),
            key: Box::new(int(5)),
            span: sp(),
        };
        assert_eq!(run(vec![node]).unwrap_err().kind(), "IndexError");
    }

    #[test]
    fn calling_a_non_callable() {
        let body = vec![assign(name("x"), int(1)), call("x", vec![])];
        let err = run(body).unwrap_err();
        assert_eq!(err.to_string(), "TypeError: 'integer' object is not callable");
    }

    #[test]
    fn call_value_runs_user_functions() {
        let mut env = Env::new();
        let program = Program {
            body: vec![function("double", &["n"], vec![bin(BinOp::Mul, name("n"), int(2))])],
        };
        eval_program(&program, &mut env).unwrap();
        let f = env.get("double").cloned().unwrap();
        assert_eq!(call_value(&mut env, &f, vec![Value::Int(4)]).unwrap(), Value::Int(8));
        assert_eq!(
            call_value(&mut env, &f, vec![]).unwrap_err().kind(),
            "ArityError"
        );
    }
}
