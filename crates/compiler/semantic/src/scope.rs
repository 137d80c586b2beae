//! # Scopes
//!
//! A scope holds four independent namespaces: values (locals, constants,
//! functions), types (structs, enums, `String`), traits, and — for impl
//! scopes — the associated items registered in the impl table. Scopes form a
//! stack during name resolution; lookup walks outward, and function-scope
//! walls stop variable lookup (Rx has no capture).

use indexmap::IndexMap;

use crate::builtins::BuiltinFn;
use crate::hir::{ConstId, FuncId, LocalId, StructDefId, EnumDefId, TraitId};

/// What a value-namespace name denotes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueDef {
    Local(LocalId),
    Const(ConstId),
    Func(FuncId),
    Builtin(BuiltinFn),
}

/// What a type-namespace name denotes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TypeDef {
    Struct(StructDefId),
    Enum(EnumDefId),
    /// The builtin `String` type exported by the root scope
    String,
}

/// The kind of construct that introduced a scope.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScopeKind {
    Root,
    Block,
    /// A function body; a wall for variable lookup
    Function,
    Impl,
    Trait,
}

/// One lexical scope.
#[derive(Debug)]
pub struct Scope {
    pub kind: ScopeKind,
    values: IndexMap<String, ValueDef>,
    types: IndexMap<String, TypeDef>,
    traits: IndexMap<String, TraitId>,
}

impl Scope {
    pub fn new(kind: ScopeKind) -> Self {
        Self {
            kind,
            values: IndexMap::new(),
            types: IndexMap::new(),
            traits: IndexMap::new(),
        }
    }

    /// Introduce a value; returns `false` on a collision within this scope.
    /// Locals may shadow earlier locals in the same block.
    pub fn define_value(&mut self, name: &str, def: ValueDef) -> bool {
        if let ValueDef::Local(_) = def {
            self.values.insert(name.to_string(), def);
            return true;
        }
        if self.values.contains_key(name) {
            return false;
        }
        self.values.insert(name.to_string(), def);
        true
    }

    pub fn define_type(&mut self, name: &str, def: TypeDef) -> bool {
        if self.types.contains_key(name) {
            return false;
        }
        self.types.insert(name.to_string(), def);
        true
    }

    pub fn define_trait(&mut self, name: &str, id: TraitId) -> bool {
        if self.traits.contains_key(name) {
            return false;
        }
        self.traits.insert(name.to_string(), id);
        true
    }

    pub fn value(&self, name: &str) -> Option<ValueDef> {
        self.values.get(name).copied()
    }

    pub fn type_def(&self, name: &str) -> Option<TypeDef> {
        self.types.get(name).copied()
    }

    pub fn trait_def(&self, name: &str) -> Option<TraitId> {
        self.traits.get(name).copied()
    }
}

/// The live scope stack maintained by the resolution walk.
#[derive(Debug)]
pub struct ScopeStack {
    scopes: Vec<Scope>,
}

impl ScopeStack {
    /// A stack with the predefined root scope: builtin functions in the
    /// value namespace and `String` in the type namespace.
    pub fn with_root() -> Self {
        let mut root = Scope::new(ScopeKind::Root);
        for builtin in BuiltinFn::ROOT_EXPORTS {
            root.define_value(builtin.name(), ValueDef::Builtin(builtin));
        }
        root.define_type("String", TypeDef::String);
        Self { scopes: vec![root] }
    }

    pub fn push(&mut self, kind: ScopeKind) {
        self.scopes.push(Scope::new(kind));
    }

    pub fn pop(&mut self) {
        assert!(self.scopes.len() > 1, "cannot pop the root scope");
        self.scopes.pop();
    }

    pub fn current(&mut self) -> &mut Scope {
        self.scopes.last_mut().expect("scope stack is never empty")
    }

    /// Value-namespace lookup from the innermost scope outward. Locals
    /// defined beyond a function wall are invisible.
    pub fn lookup_value(&self, name: &str) -> Option<ValueDef> {
        let mut crossed_function = false;
        for scope in self.scopes.iter().rev() {
            if let Some(def) = scope.value(name) {
                let visible = !(crossed_function && matches!(def, ValueDef::Local(_)));
                if visible {
                    return Some(def);
                }
            }
            if scope.kind == ScopeKind::Function {
                crossed_function = true;
            }
        }
        None
    }

    pub fn lookup_type(&self, name: &str) -> Option<TypeDef> {
        self.scopes.iter().rev().find_map(|scope| scope.type_def(name))
    }

    pub fn lookup_trait(&self, name: &str) -> Option<TraitId> {
        self.scopes
            .iter()
            .rev()
            .find_map(|scope| scope.trait_def(name))
    }

    /// Whether the stack is currently inside an impl or trait scope, which
    /// is where `self`/`Self` are meaningful.
    pub fn in_impl_or_trait(&self) -> bool {
        self.scopes
            .iter()
            .any(|scope| matches!(scope.kind, ScopeKind::Impl | ScopeKind::Trait))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_root_scope_exports() {
        let scopes = ScopeStack::with_root();
        assert!(matches!(
            scopes.lookup_value("getInt"),
            Some(ValueDef::Builtin(BuiltinFn::GetInt))
        ));
        assert!(matches!(scopes.lookup_type("String"), Some(TypeDef::String)));
        assert!(scopes.lookup_value("no_such").is_none());
    }

    #[test]
    fn test_function_wall_stops_locals() {
        let mut scopes = ScopeStack::with_root();
        scopes.push(ScopeKind::Function);
        scopes
            .current()
            .define_value("x", ValueDef::Local(LocalId::new(0)));
        // Nested function: the outer local is invisible, builtins remain.
        scopes.push(ScopeKind::Function);
        assert!(scopes.lookup_value("x").is_none());
        assert!(scopes.lookup_value("print").is_some());
        scopes.pop();
        assert!(scopes.lookup_value("x").is_some());
    }

    #[test]
    fn test_local_shadowing_allowed() {
        let mut scope = Scope::new(ScopeKind::Block);
        assert!(scope.define_value("x", ValueDef::Local(LocalId::new(0))));
        assert!(scope.define_value("x", ValueDef::Local(LocalId::new(1))));
        assert_eq!(scope.value("x"), Some(ValueDef::Local(LocalId::new(1))));
    }

    #[test]
    fn test_item_collision_rejected() {
        let mut scope = Scope::new(ScopeKind::Block);
        assert!(scope.define_value("f", ValueDef::Func(FuncId::new(0))));
        assert!(!scope.define_value("f", ValueDef::Func(FuncId::new(1))));
    }
}
