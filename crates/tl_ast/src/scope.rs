//! Lexical scopes attached to a parsed module.
//!
//! Scopes live in a flat arena indexed by [`ScopeId`]; each scope-owning
//! node (module, function, arrow, block, loop, catch clause) is found
//! through its span. Value and type bindings are kept in separate
//! namespaces, as in TypeScript.

use indexmap::IndexMap;
use rustc_hash::FxHashMap;
use serde::Serialize;
use swc_common::Span;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ScopeId(u32);

impl ScopeId {
    pub const ROOT: ScopeId = ScopeId(0);

    pub fn index(self) -> usize {
        self.0 as usize
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScopeKind {
    Module,
    Function,
    Block,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VariableKind {
    Var,
    Let,
    Const,
    Function,
    Class,
    Import,
    Param,
    Enum,
    Interface,
    TypeAlias,
    TypeParam,
}

impl VariableKind {
    /// Bindings that can never be reassigned after initialisation.
    pub fn is_immutable(self) -> bool {
        matches!(self, VariableKind::Const | VariableKind::Import)
    }

    pub fn is_value(self) -> bool {
        !matches!(
            self,
            VariableKind::Interface | VariableKind::TypeAlias | VariableKind::TypeParam
        )
    }

    pub fn is_type(self) -> bool {
        matches!(
            self,
            VariableKind::Class
                | VariableKind::Enum
                | VariableKind::Interface
                | VariableKind::TypeAlias
                | VariableKind::TypeParam
        )
    }
}

/// Runtime address of a module-scoped binding.
///
/// Exported locals and imported bindings are numbered independently.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ModuleSlot {
    Export(u32),
    Import(u32),
}

#[derive(Debug, Clone)]
pub struct Variable {
    pub name: String,
    pub kind: VariableKind,
    /// Span of the binding identifier.
    pub decl_span: Span,
    pub slot: Option<ModuleSlot>,
}

#[derive(Debug, Clone)]
pub struct Scope {
    pub kind: ScopeKind,
    pub parent: Option<ScopeId>,
    pub span: Span,
    values: IndexMap<String, Variable>,
    types: IndexMap<String, Variable>,
}

impl Scope {
    pub fn values(&self) -> impl Iterator<Item = &Variable> {
        self.values.values()
    }

    pub fn types(&self) -> impl Iterator<Item = &Variable> {
        self.types.values()
    }
}

#[derive(Debug, Clone)]
pub struct ScopeTree {
    scopes: Vec<Scope>,
    by_span: FxHashMap<Span, ScopeId>,
}

impl ScopeTree {
    /// Create a tree holding only the module scope.
    pub fn new(module_span: Span) -> Self {
        let mut by_span = FxHashMap::default();
        if !module_span.is_dummy() {
            by_span.insert(module_span, ScopeId::ROOT);
        }
        Self {
            scopes: vec![Scope {
                kind: ScopeKind::Module,
                parent: None,
                span: module_span,
                values: IndexMap::new(),
                types: IndexMap::new(),
            }],
            by_span,
        }
    }

    pub fn root(&self) -> ScopeId {
        ScopeId::ROOT
    }

    pub fn len(&self) -> usize {
        self.scopes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.scopes.is_empty()
    }

    pub fn scope(&self, id: ScopeId) -> &Scope {
        &self.scopes[id.index()]
    }

    pub fn parent(&self, id: ScopeId) -> Option<ScopeId> {
        self.scope(id).parent
    }

    /// Scope owned by the node at `span`, if any.
    pub fn scope_of(&self, span: Span) -> Option<ScopeId> {
        self.by_span.get(&span).copied()
    }

    /// Open a scope for the node at `span`.
    ///
    /// Re-binding a node that already owns a scope returns that scope, so
    /// binding the same subtree twice leaves the tree unchanged. Nodes
    /// without a source range get a fresh, unkeyed scope.
    pub fn add_scope(&mut self, parent: ScopeId, kind: ScopeKind, span: Span) -> ScopeId {
        if !span.is_dummy() {
            if let Some(existing) = self.scope_of(span) {
                return existing;
            }
        }
        let id = ScopeId(self.scopes.len() as u32);
        self.scopes.push(Scope {
            kind,
            parent: Some(parent),
            span,
            values: IndexMap::new(),
            types: IndexMap::new(),
        });
        if !span.is_dummy() {
            self.by_span.insert(span, id);
        }
        id
    }

    /// Move the span key of a scope after its owning node was respanned.
    pub fn rekey(&mut self, old: Span, new: Span) {
        if old == new || new.is_dummy() {
            return;
        }
        if let Some(id) = self.by_span.remove(&old) {
            self.scopes[id.index()].span = new;
            self.by_span.insert(new, id);
        }
    }

    /// Nearest enclosing function or module scope; the target of `var`
    /// hoisting.
    pub fn function_scope(&self, mut id: ScopeId) -> ScopeId {
        loop {
            let scope = self.scope(id);
            match (scope.kind, scope.parent) {
                (ScopeKind::Block, Some(parent)) => id = parent,
                _ => return id,
            }
        }
    }

    /// Declare a binding. The first declaration of a name in a scope wins;
    /// returns `false` when the name was already bound there.
    pub fn declare(&mut self, scope: ScopeId, name: &str, kind: VariableKind, decl_span: Span) -> bool {
        let variable = Variable {
            name: name.to_string(),
            kind,
            decl_span,
            slot: None,
        };
        let scope = &mut self.scopes[scope.index()];
        let mut inserted = false;
        if kind.is_value() && !scope.values.contains_key(name) {
            scope.values.insert(name.to_string(), variable.clone());
            inserted = true;
        }
        if kind.is_type() && !scope.types.contains_key(name) {
            scope.types.insert(name.to_string(), variable);
            inserted = true;
        }
        inserted
    }

    pub fn remove_value(&mut self, scope: ScopeId, name: &str) -> Option<Variable> {
        self.scopes[scope.index()].values.shift_remove(name)
    }

    /// Value binding declared directly in `scope`.
    pub fn find_local(&self, scope: ScopeId, name: &str) -> Option<&Variable> {
        self.scope(scope).values.get(name)
    }

    pub fn find_local_mut(&mut self, scope: ScopeId, name: &str) -> Option<&mut Variable> {
        self.scopes[scope.index()].values.get_mut(name)
    }

    /// Resolve a value binding through the scope chain.
    pub fn lookup(&self, scope: ScopeId, name: &str) -> Option<(ScopeId, &Variable)> {
        let mut current = Some(scope);
        while let Some(id) = current {
            if let Some(variable) = self.find_local(id, name) {
                return Some((id, variable));
            }
            current = self.parent(id);
        }
        None
    }

    /// Resolve a type binding through the scope chain.
    pub fn lookup_type(&self, scope: ScopeId, name: &str) -> Option<&Variable> {
        let mut current = Some(scope);
        while let Some(id) = current {
            if let Some(variable) = self.scope(id).types.get(name) {
                return Some(variable);
            }
            current = self.parent(id);
        }
        None
    }

    /// Whether `name` is bound in either namespace anywhere on the chain.
    pub fn is_bound_in_chain(&self, scope: ScopeId, name: &str) -> bool {
        self.lookup(scope, name).is_some() || self.lookup_type(scope, name).is_some()
    }
}
