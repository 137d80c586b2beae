//! # Impl Table
//!
//! Associated items and trait implementations, keyed by the implementing
//! type. Built during name resolution; consulted by the trait check, the
//! method-call probe, and multi-segment path resolution.

use indexmap::IndexMap;
use rustc_hash::FxHashMap;

use crate::hir::{ConstId, FuncId, ImplId, TraitId};
use crate::types::{EnumId, StructId, Type, TypeContext, TypeId};

/// The nominal types an impl can target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TypeKey {
    Struct(StructId),
    Enum(EnumId),
}

impl TypeKey {
    /// The key for a receiver type, if it is a nominal type.
    pub fn of(ctx: &TypeContext, ty: TypeId) -> Option<Self> {
        match ctx.type_of(ty) {
            Type::Struct(id) => Some(Self::Struct(*id)),
            Type::Enum(id) => Some(Self::Enum(*id)),
            _ => None,
        }
    }

    pub fn display(self, ctx: &TypeContext) -> String {
        match self {
            Self::Struct(id) => ctx.struct_info(id).name.clone(),
            Self::Enum(id) => ctx.enum_info(id).name.clone(),
        }
    }
}

/// One associated item of a type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AssocItem {
    /// Function with a receiver
    Method(FuncId),
    /// Associated function, callable as `Type::name(..)`
    Function(FuncId),
    Const(ConstId),
}

#[derive(Debug, Default)]
pub struct ImplTable {
    assoc: FxHashMap<TypeKey, IndexMap<String, AssocItem>>,
    trait_impls: FxHashMap<(TypeKey, TraitId), ImplId>,
}

impl ImplTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an associated item; `false` on a name collision for the
    /// same type.
    pub fn register_assoc(&mut self, key: TypeKey, name: &str, item: AssocItem) -> bool {
        let entries = self.assoc.entry(key).or_default();
        if entries.contains_key(name) {
            return false;
        }
        entries.insert(name.to_string(), item);
        true
    }

    pub fn lookup_assoc(&self, key: TypeKey, name: &str) -> Option<AssocItem> {
        self.assoc.get(&key)?.get(name).copied()
    }

    /// Register a trait implementation; `false` if the pair already exists.
    pub fn register_trait_impl(&mut self, key: TypeKey, trait_id: TraitId, impl_id: ImplId) -> bool {
        match self.trait_impls.entry((key, trait_id)) {
            std::collections::hash_map::Entry::Occupied(_) => false,
            std::collections::hash_map::Entry::Vacant(entry) => {
                entry.insert(impl_id);
                true
            }
        }
    }

    pub fn trait_impl(&self, key: TypeKey, trait_id: TraitId) -> Option<ImplId> {
        self.trait_impls.get(&(key, trait_id)).copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_assoc_registration_and_collision() {
        let mut table = ImplTable::new();
        let key = TypeKey::Struct(StructId::new(0));
        assert!(table.register_assoc(key, "get", AssocItem::Method(FuncId::new(0))));
        assert!(!table.register_assoc(key, "get", AssocItem::Method(FuncId::new(1))));
        // Same name on a different type is fine.
        let other = TypeKey::Struct(StructId::new(1));
        assert!(table.register_assoc(other, "get", AssocItem::Method(FuncId::new(2))));
    }

    #[test]
    fn test_duplicate_trait_impl_rejected() {
        let mut table = ImplTable::new();
        let key = TypeKey::Enum(EnumId::new(0));
        let trait_id = TraitId::new(0);
        assert!(table.register_trait_impl(key, trait_id, ImplId::new(0)));
        assert!(!table.register_trait_impl(key, trait_id, ImplId::new(1)));
    }
}
