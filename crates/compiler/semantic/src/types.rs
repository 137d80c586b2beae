//! # Type System
//!
//! Canonical, ID-addressed types. Every type in the program is interned in a
//! [`TypeContext`]: two types are identical iff their `TypeId`s are equal.
//! Structs and enums live in dense side tables so that mutually recursive
//! definitions are representable before their field types are known.

use index_vec::IndexVec;
use rustc_hash::FxHashMap;

index_vec::define_index_type! {
    /// Dense index into the `TypeContext` struct table. Assigned during
    /// skeleton registration, before any field type is resolved.
    pub struct StructId = usize;
}

index_vec::define_index_type! {
    /// Dense index into the `TypeContext` enum table.
    pub struct EnumId = usize;
}

/// Opaque, cheap-to-copy handle for an interned type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TypeId(u32);

impl TypeId {
    /// Sentinel for a not-yet-assigned handle. Never stored in a resolved
    /// annotation; dereferencing it panics.
    pub const INVALID: Self = Self(u32::MAX);

    pub const fn index(self) -> usize {
        self.0 as usize
    }

    pub const fn is_valid(self) -> bool {
        self.0 != u32::MAX
    }
}

/// The primitive scalar types of Rx.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Primitive {
    I32,
    U32,
    Isize,
    Usize,
    Bool,
    Char,
    Str,
}

impl Primitive {
    pub const fn name(self) -> &'static str {
        match self {
            Self::I32 => "i32",
            Self::U32 => "u32",
            Self::Isize => "isize",
            Self::Usize => "usize",
            Self::Bool => "bool",
            Self::Char => "char",
            Self::Str => "str",
        }
    }

    /// Integer primitives, the operand types of arithmetic and bitwise ops.
    pub const fn is_integer(self) -> bool {
        matches!(self, Self::I32 | Self::U32 | Self::Isize | Self::Usize)
    }

    pub const fn is_signed(self) -> bool {
        matches!(self, Self::I32 | Self::Isize)
    }
}

/// A canonical type. Interned; always addressed through a [`TypeId`].
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Type {
    Primitive(Primitive),
    /// The unit type `()`
    Unit,
    /// The uninhabited type `!`, produced by divergence analysis only
    Never,
    /// Placeholder used before type finalization; never reaches the checker
    Underscore,
    Reference {
        target: TypeId,
        mutable: bool,
    },
    Array {
        element: TypeId,
        length: usize,
    },
    Struct(StructId),
    Enum(EnumId),
}

/// A registered struct: name first, fields linked in during finalization.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StructInfo {
    pub name: String,
    pub fields: Vec<(String, TypeId)>,
}

impl StructInfo {
    pub fn field_index(&self, name: &str) -> Option<usize> {
        self.fields.iter().position(|(field, _)| field == name)
    }
}

/// A registered enum: unit variants only.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnumInfo {
    pub name: String,
    pub variants: Vec<String>,
}

impl EnumInfo {
    pub fn variant_index(&self, name: &str) -> Option<usize> {
        self.variants.iter().position(|variant| variant == name)
    }
}

/// The interning context shared by every pass.
///
/// Lifecycle: created at pipeline start, populated by the registration and
/// finalization passes (`register_struct`/`register_enum`, `set_*`), then
/// read-only by convention for the rest of the pipeline. `get_id` may still
/// intern new composite types (references, arrays) on demand.
#[derive(Debug)]
pub struct TypeContext {
    interner: FxHashMap<Type, TypeId>,
    types: Vec<Type>,
    structs: IndexVec<StructId, StructInfo>,
    enums: IndexVec<EnumId, EnumInfo>,
    /// The builtin `String` type, registered at construction
    string_struct: StructId,
}

impl TypeContext {
    pub fn new() -> Self {
        let mut ctx = Self {
            interner: FxHashMap::default(),
            types: Vec::new(),
            structs: IndexVec::new(),
            enums: IndexVec::new(),
            string_struct: StructId::new(0),
        };
        ctx.string_struct = ctx.register_struct("String".to_string());
        ctx
    }

    /// Intern a type, returning its canonical handle.
    pub fn get_id(&mut self, ty: Type) -> TypeId {
        if let Some(&id) = self.interner.get(&ty) {
            return id;
        }
        let id = TypeId(u32::try_from(self.types.len()).expect("type table overflow"));
        self.types.push(ty.clone());
        self.interner.insert(ty, id);
        id
    }

    /// Look up the type behind a handle.
    pub fn type_of(&self, id: TypeId) -> &Type {
        assert!(id.is_valid(), "dereferenced invalid TypeId");
        &self.types[id.index()]
    }

    // Shorthands for the fixed types.

    pub fn unit(&mut self) -> TypeId {
        self.get_id(Type::Unit)
    }

    pub fn never(&mut self) -> TypeId {
        self.get_id(Type::Never)
    }

    pub fn primitive(&mut self, primitive: Primitive) -> TypeId {
        self.get_id(Type::Primitive(primitive))
    }

    pub fn i32(&mut self) -> TypeId {
        self.primitive(Primitive::I32)
    }

    pub fn u32(&mut self) -> TypeId {
        self.primitive(Primitive::U32)
    }

    pub fn isize(&mut self) -> TypeId {
        self.primitive(Primitive::Isize)
    }

    pub fn usize(&mut self) -> TypeId {
        self.primitive(Primitive::Usize)
    }

    pub fn bool(&mut self) -> TypeId {
        self.primitive(Primitive::Bool)
    }

    pub fn char(&mut self) -> TypeId {
        self.primitive(Primitive::Char)
    }

    pub fn str_slice(&mut self) -> TypeId {
        self.primitive(Primitive::Str)
    }

    pub fn string(&mut self) -> TypeId {
        let id = self.string_struct;
        self.get_id(Type::Struct(id))
    }

    pub const fn string_struct_id(&self) -> StructId {
        self.string_struct
    }

    pub fn reference(&mut self, target: TypeId, mutable: bool) -> TypeId {
        self.get_id(Type::Reference { target, mutable })
    }

    pub fn array(&mut self, element: TypeId, length: usize) -> TypeId {
        self.get_id(Type::Array { element, length })
    }

    pub fn struct_type(&mut self, id: StructId) -> TypeId {
        self.get_id(Type::Struct(id))
    }

    pub fn enum_type(&mut self, id: EnumId) -> TypeId {
        self.get_id(Type::Enum(id))
    }

    // Struct and enum tables.

    /// Register a struct skeleton with an empty field list, enabling forward
    /// references and mutual recursion before finalization.
    pub fn register_struct(&mut self, name: String) -> StructId {
        self.structs.push(StructInfo {
            name,
            fields: Vec::new(),
        })
    }

    /// Register an enum skeleton with an empty variant list.
    pub fn register_enum(&mut self, name: String) -> EnumId {
        self.enums.push(EnumInfo {
            name,
            variants: Vec::new(),
        })
    }

    pub fn set_struct_fields(&mut self, id: StructId, fields: Vec<(String, TypeId)>) {
        self.structs[id].fields = fields;
    }

    pub fn set_enum_variants(&mut self, id: EnumId, variants: Vec<String>) {
        self.enums[id].variants = variants;
    }

    pub fn struct_info(&self, id: StructId) -> &StructInfo {
        &self.structs[id]
    }

    pub fn enum_info(&self, id: EnumId) -> &EnumInfo {
        &self.enums[id]
    }

    pub fn struct_count(&self) -> usize {
        self.structs.len()
    }

    // Classification helpers.

    pub fn is_integer(&self, id: TypeId) -> bool {
        matches!(self.type_of(id), Type::Primitive(p) if p.is_integer())
    }

    pub fn is_bool(&self, id: TypeId) -> bool {
        matches!(self.type_of(id), Type::Primitive(Primitive::Bool))
    }

    pub fn is_never(&self, id: TypeId) -> bool {
        matches!(self.type_of(id), Type::Never)
    }

    pub fn is_unit(&self, id: TypeId) -> bool {
        matches!(self.type_of(id), Type::Unit)
    }

    pub fn is_reference(&self, id: TypeId) -> bool {
        matches!(self.type_of(id), Type::Reference { .. })
    }

    /// Structs and arrays; these live in memory and never ride in scalar
    /// temporaries. Enums are unit-variant only and travel as their
    /// discriminant.
    pub fn is_aggregate(&self, id: TypeId) -> bool {
        matches!(self.type_of(id), Type::Struct(_) | Type::Array { .. })
    }

    /// A human-readable rendering for diagnostics.
    pub fn display(&self, id: TypeId) -> String {
        if !id.is_valid() {
            return "<invalid>".to_string();
        }
        match self.type_of(id) {
            Type::Primitive(p) => p.name().to_string(),
            Type::Unit => "()".to_string(),
            Type::Never => "!".to_string(),
            Type::Underscore => "_".to_string(),
            Type::Reference { target, mutable } => {
                if *mutable {
                    format!("&mut {}", self.display(*target))
                } else {
                    format!("&{}", self.display(*target))
                }
            }
            Type::Array { element, length } => {
                format!("[{}; {}]", self.display(*element), length)
            }
            Type::Struct(id) => self.struct_info(*id).name.clone(),
            Type::Enum(id) => self.enum_info(*id).name.clone(),
        }
    }
}

impl Default for TypeContext {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_type_interning() {
        let mut ctx = TypeContext::new();
        let a = ctx.i32();
        let b = ctx.i32();
        assert_eq!(a, b);
        let c = ctx.bool();
        assert_ne!(a, c);
    }

    #[test]
    fn test_composite_interning() {
        let mut ctx = TypeContext::new();
        let i32_ty = ctx.i32();
        let r1 = ctx.reference(i32_ty, false);
        let r2 = ctx.reference(i32_ty, false);
        let r3 = ctx.reference(i32_ty, true);
        assert_eq!(r1, r2);
        assert_ne!(r1, r3);

        let a1 = ctx.array(i32_ty, 4);
        let a2 = ctx.array(i32_ty, 5);
        assert_ne!(a1, a2);
    }

    #[test]
    fn test_struct_registration_before_finalization() {
        let mut ctx = TypeContext::new();
        let s = ctx.register_struct("Node".to_string());
        // Forward reference through a reference type is representable
        // before the fields are linked in.
        let node_ty = ctx.struct_type(s);
        let next_ty = ctx.reference(node_ty, false);
        ctx.set_struct_fields(s, vec![("next".to_string(), next_ty)]);
        assert_eq!(ctx.struct_info(s).field_index("next"), Some(0));
        assert_eq!(ctx.display(next_ty), "&Node");
    }

    #[test]
    fn test_string_is_builtin() {
        let mut ctx = TypeContext::new();
        let string = ctx.string();
        assert_eq!(ctx.display(string), "String");
        assert!(ctx.is_aggregate(string));
    }

    #[test]
    fn test_invalid_sentinel() {
        let ctx = TypeContext::new();
        assert!(!TypeId::INVALID.is_valid());
        assert_eq!(ctx.display(TypeId::INVALID), "<invalid>");
    }
}
