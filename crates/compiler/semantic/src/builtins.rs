//! # Builtin Surface
//!
//! The fixed runtime surface the core assumes and the emitter provides:
//! free functions exported by the root scope, associated items of the
//! builtin `String` type, and probe-aware builtin methods (`len`,
//! `to_string`, the `String` methods).

use crate::hir::SelfKind;
use crate::types::{Primitive, Type, TypeContext, TypeId};

/// Builtin free functions and associated functions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BuiltinFn {
    Print,
    Println,
    PrintInt,
    PrintlnInt,
    GetInt,
    GetString,
    Exit,
    /// `String::from`, reached through the `String` type's associated items
    StringFrom,
}

impl BuiltinFn {
    pub const fn name(self) -> &'static str {
        match self {
            Self::Print => "print",
            Self::Println => "println",
            Self::PrintInt => "printInt",
            Self::PrintlnInt => "printlnInt",
            Self::GetInt => "getInt",
            Self::GetString => "getString",
            Self::Exit => "exit",
            Self::StringFrom => "String::from",
        }
    }

    /// Symbol the emitter links against.
    pub const fn runtime_name(self) -> &'static str {
        match self {
            Self::Print => "print",
            Self::Println => "println",
            Self::PrintInt => "printInt",
            Self::PrintlnInt => "printlnInt",
            Self::GetInt => "getInt",
            Self::GetString => "getString",
            Self::Exit => "exit",
            Self::StringFrom => "string_from",
        }
    }

    /// The functions the predefined root scope exports by name.
    pub const ROOT_EXPORTS: [Self; 7] = [
        Self::Print,
        Self::Println,
        Self::PrintInt,
        Self::PrintlnInt,
        Self::GetInt,
        Self::GetString,
        Self::Exit,
    ];
}

/// Signature of a builtin function.
#[derive(Debug, Clone)]
pub struct BuiltinFnSig {
    pub params: Vec<TypeId>,
    pub ret: TypeId,
}

/// Resolve a builtin function's signature against the type context.
pub fn builtin_fn_sig(ctx: &mut TypeContext, builtin: BuiltinFn) -> BuiltinFnSig {
    let unit = ctx.unit();
    let i32_ty = ctx.i32();
    let str_ty = ctx.str_slice();
    let str_ref = ctx.reference(str_ty, false);
    let string = ctx.string();
    match builtin {
        BuiltinFn::Print | BuiltinFn::Println => BuiltinFnSig {
            params: vec![str_ref],
            ret: unit,
        },
        BuiltinFn::PrintInt | BuiltinFn::PrintlnInt => BuiltinFnSig {
            params: vec![i32_ty],
            ret: unit,
        },
        BuiltinFn::GetInt => BuiltinFnSig {
            params: vec![],
            ret: i32_ty,
        },
        BuiltinFn::GetString => BuiltinFnSig {
            params: vec![],
            ret: string,
        },
        // Typed as returning unit; the runtime diverges.
        BuiltinFn::Exit => BuiltinFnSig {
            params: vec![i32_ty],
            ret: unit,
        },
        // Also accepts `&mut str`; the checker special-cases the argument.
        BuiltinFn::StringFrom => BuiltinFnSig {
            params: vec![str_ref],
            ret: string,
        },
    }
}

/// Builtin methods dispatched through the auto-ref/auto-deref probe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BuiltinMethod {
    /// `len` on `[T; N]`; lowers to the compile-time length
    ArrayLen,
    /// `len` on `str`
    StrLen,
    /// `len` on `String`
    StringLen,
    /// `String::append(&mut self, &str)`
    StringAppend,
    /// `String::as_str(&self) -> &str`
    StringAsStr,
    /// `String::as_mut_str(&mut self) -> &mut str`
    StringAsMutStr,
    /// `to_string` on `u32`/`usize`
    ToString,
}

impl BuiltinMethod {
    pub const fn name(self) -> &'static str {
        match self {
            Self::ArrayLen | Self::StrLen | Self::StringLen => "len",
            Self::StringAppend => "append",
            Self::StringAsStr => "as_str",
            Self::StringAsMutStr => "as_mut_str",
            Self::ToString => "to_string",
        }
    }

    /// Symbol the emitter links against; `ArrayLen` never reaches the
    /// runtime (the lowerer folds it to a constant).
    pub const fn runtime_name(self) -> &'static str {
        match self {
            Self::ArrayLen => "array_len",
            Self::StrLen => "str_len",
            Self::StringLen => "string_len",
            Self::StringAppend => "string_append",
            Self::StringAsStr => "string_as_str",
            Self::StringAsMutStr => "string_as_mut_str",
            Self::ToString => "to_string",
        }
    }
}

/// Signature of a builtin method, with the receiver shape the probe must
/// satisfy.
#[derive(Debug, Clone)]
pub struct BuiltinMethodSig {
    pub method: BuiltinMethod,
    pub self_kind: SelfKind,
    pub params: Vec<TypeId>,
    pub ret: TypeId,
}

/// Look up a builtin method on a receiver type that has been stripped of
/// references by the probe. Returns `None` if the type has no builtin
/// method of that name.
pub fn lookup_builtin_method(
    ctx: &mut TypeContext,
    receiver: TypeId,
    name: &str,
) -> Option<BuiltinMethodSig> {
    let usize_ty = ctx.usize();
    let receiver_ty = ctx.type_of(receiver).clone();
    match (&receiver_ty, name) {
        (Type::Array { .. }, "len") => Some(BuiltinMethodSig {
            method: BuiltinMethod::ArrayLen,
            self_kind: SelfKind::Ref { mutable: false },
            params: vec![],
            ret: usize_ty,
        }),
        (Type::Primitive(Primitive::Str), "len") => Some(BuiltinMethodSig {
            method: BuiltinMethod::StrLen,
            self_kind: SelfKind::Ref { mutable: false },
            params: vec![],
            ret: usize_ty,
        }),
        (Type::Struct(id), _) if *id == ctx.string_struct_id() => {
            let str_ty = ctx.str_slice();
            match name {
                "len" => Some(BuiltinMethodSig {
                    method: BuiltinMethod::StringLen,
                    self_kind: SelfKind::Ref { mutable: false },
                    params: vec![],
                    ret: usize_ty,
                }),
                "append" => {
                    let str_ref = ctx.reference(str_ty, false);
                    let unit = ctx.unit();
                    Some(BuiltinMethodSig {
                        method: BuiltinMethod::StringAppend,
                        self_kind: SelfKind::Ref { mutable: true },
                        params: vec![str_ref],
                        ret: unit,
                    })
                }
                "as_str" => {
                    let str_ref = ctx.reference(str_ty, false);
                    Some(BuiltinMethodSig {
                        method: BuiltinMethod::StringAsStr,
                        self_kind: SelfKind::Ref { mutable: false },
                        params: vec![],
                        ret: str_ref,
                    })
                }
                "as_mut_str" => {
                    let str_mut_ref = ctx.reference(str_ty, true);
                    Some(BuiltinMethodSig {
                        method: BuiltinMethod::StringAsMutStr,
                        self_kind: SelfKind::Ref { mutable: true },
                        params: vec![],
                        ret: str_mut_ref,
                    })
                }
                _ => None,
            }
        }
        (Type::Primitive(Primitive::U32 | Primitive::Usize), "to_string") => {
            let string = ctx.string();
            Some(BuiltinMethodSig {
                method: BuiltinMethod::ToString,
                self_kind: SelfKind::Ref { mutable: false },
                params: vec![],
                ret: string,
            })
        }
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_array_len_probe() {
        let mut ctx = TypeContext::new();
        let i32_ty = ctx.i32();
        let arr = ctx.array(i32_ty, 3);
        let sig = lookup_builtin_method(&mut ctx, arr, "len").unwrap();
        assert_eq!(sig.method, BuiltinMethod::ArrayLen);
        assert_eq!(sig.ret, ctx.usize());
    }

    #[test]
    fn test_string_methods() {
        let mut ctx = TypeContext::new();
        let string = ctx.string();
        assert!(lookup_builtin_method(&mut ctx, string, "append").is_some());
        assert!(lookup_builtin_method(&mut ctx, string, "as_str").is_some());
        assert!(lookup_builtin_method(&mut ctx, string, "push").is_none());
    }

    #[test]
    fn test_to_string_only_on_unsigned() {
        let mut ctx = TypeContext::new();
        let u32_ty = ctx.u32();
        let i32_ty = ctx.i32();
        assert!(lookup_builtin_method(&mut ctx, u32_ty, "to_string").is_some());
        assert!(lookup_builtin_method(&mut ctx, i32_ty, "to_string").is_none());
    }
}
