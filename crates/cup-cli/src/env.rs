use std::collections::HashMap;

use crate::error::RuntimeError;
use crate::natives::NativeRegistry;
use crate::value::Value;

/// One level of bindings.
pub type Scope = HashMap<String, Value>;

/// Environment with lexical scoping
///
/// A stack of scopes: each scope's parent is the one beneath it, so a call
/// pushes the callee's scope on top of the scope active at the call site.
#[derive(Debug, Clone)]
pub struct Env {
    scopes: Vec<Scope>,
}

impl Default for Env {
    fn default() -> Self {
        Self {
            scopes: vec![HashMap::new()],
        }
    }
}

impl Env {
    /// Create a new environment with a single empty scope
    pub fn new() -> Self {
        Self::default()
    }

    /// Root environment holding the standard natives.
    pub fn with_defaults() -> Self {
        let mut env = Self::new();
        NativeRegistry::with_defaults().install(&mut env);
        env
    }

    pub fn depth(&self) -> usize {
        self.scopes.len()
    }

    /// Push a new scope onto the stack
    pub fn push_scope(&mut self) {
        self.scopes.push(HashMap::new());
    }

    /// Pop the current scope and hand back its bindings.
    ///
    /// Returns an error if attempting to pop the root scope.
    pub fn pop_scope(&mut self) -> Result<Scope, RuntimeError> {
        if self.scopes.len() <= 1 {
            return Err(RuntimeError::Internal(
                "attempted to pop the root scope".into(),
            ));
        }
        self.scopes
            .pop()
            .ok_or_else(|| RuntimeError::Internal("scope stack is empty".into()))
    }

    /// Execute a closure with a new scope that is automatically popped on exit,
    /// even if the closure returns an error.
    pub fn with_scope<T>(
        &mut self,
        f: impl FnOnce(&mut Env) -> Result<T, RuntimeError>,
    ) -> Result<T, RuntimeError> {
        self.push_scope();
        let result = f(self);
        // we just pushed a scope, so this cannot hit the root
        let _ = self.pop_scope();
        result
    }

    /// Bind in the innermost scope, shadowing outer bindings.
    pub fn define(&mut self, name: impl Into<String>, value: Value) {
        if let Some(scope) = self.scopes.last_mut() {
            scope.insert(name.into(), value);
        }
    }

    /// Look up a variable by name, searching from innermost to outermost scope.
    ///
    /// `None` means unbound; a variable holding `null` is `Some(&Value::Null)`.
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.scopes.iter().rev().find_map(|scope| scope.get(name))
    }

    /// Bindings of the root scope, natives included.
    pub fn globals(&self) -> &Scope {
        &self.scopes[0]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn null_binding_is_found() {
        let mut env = Env::new();
        env.define("x", Value::Null);
        assert!(matches!(env.get("x"), Some(Value::Null)));
        assert!(env.get("y").is_none());
    }

    #[test]
    fn inner_scope_shadows_and_is_dropped() {
        let mut env = Env::new();
        env.define("x", Value::Int(1));
        env.with_scope(|env| {
            env.define("x", Value::Int(2));
            assert!(matches!(env.get("x"), Some(Value::Int(2))));
            Ok(())
        })
        .unwrap();
        assert!(matches!(env.get("x"), Some(Value::Int(1))));
    }

    #[test]
    fn scope_is_popped_on_error() {
        let mut env = Env::new();
        let res: Result<(), _> =
            env.with_scope(|_| Err(RuntimeError::Name("boom".into())));
        assert!(res.is_err());
        assert_eq!(env.depth(), 1);
    }

    #[test]
    fn root_scope_cannot_be_popped() {
        let mut env = Env::new();
        assert_eq!(env.pop_scope().unwrap_err().kind(), "InternalError");
    }

    #[test]
    fn pop_returns_bindings() {
        let mut env = Env::new();
        env.push_scope();
        env.define("a", Value::Int(7));
        let scope = env.pop_scope().unwrap();
        assert!(matches!(scope.get("a"), Some(Value::Int(7))));
    }
}
