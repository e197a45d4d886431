//! Data model of the semantic analyzer: resolved types, symbols, function
//! signatures and aggregate descriptions.

use std::fmt;

use indexmap::IndexMap;
use smol_str::SmolStr;

use crate::syntax::Token;

/// A fully resolved type, as tracked through expression checking.
///
/// An empty name marks an invalid type; errors have already been reported
/// for it and downstream checks stay silent.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub(crate) struct TypeInfo {
    pub(crate) name: SmolStr,
    pub(crate) is_const: bool,
    pub(crate) is_reference: bool,
    pub(crate) is_array: bool,
    pub(crate) has_array_size: bool,
    pub(crate) array_size: Option<usize>,
}

impl TypeInfo {
    pub(crate) fn named(name: impl Into<SmolStr>) -> TypeInfo {
        TypeInfo {
            name: name.into(),
            ..TypeInfo::default()
        }
    }

    pub(crate) fn is_valid(&self) -> bool {
        !self.name.is_empty()
    }

    pub(crate) fn strip_reference(&self) -> TypeInfo {
        TypeInfo {
            is_reference: false,
            ..self.clone()
        }
    }

    pub(crate) fn is_void(&self) -> bool {
        self.name == "void" && !self.is_reference && !self.is_array
    }
}

impl fmt::Display for TypeInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_const {
            write!(f, "const ")?;
        }
        write!(f, "{}", self.name)?;
        if self.is_array {
            write!(f, "[")?;
            if let Some(size) = self.array_size {
                write!(f, "{size}")?;
            }
            write!(f, "]")?;
        }
        if self.is_reference {
            write!(f, "&")?;
        }
        Ok(())
    }
}

pub(crate) fn type_equals(lhs: &TypeInfo, rhs: &TypeInfo) -> bool {
    lhs == rhs
}

/// Assignability after dropping constness: equal types, or `int`-family to
/// `uint`-family (and back) of the same dimension.
pub(crate) fn type_assignable(dest: &TypeInfo, src: &TypeInfo) -> bool {
    use super::builtins::{is_int_like_type_name, is_uint_like_type_name, vector_dimension};

    let mut dest = dest.clone();
    let mut src = src.clone();
    dest.is_const = false;
    src.is_const = false;
    if dest == src {
        return true;
    }
    if dest.is_reference != src.is_reference
        || dest.is_array != src.is_array
        || dest.has_array_size != src.has_array_size
        || dest.array_size != src.array_size
    {
        return false;
    }

    let dest_int = is_int_like_type_name(&dest.name);
    let dest_uint = is_uint_like_type_name(&dest.name);
    let src_int = is_int_like_type_name(&src.name);
    let src_uint = is_uint_like_type_name(&src.name);
    if (dest_int && src_uint) || (dest_uint && src_int) {
        return vector_dimension(&dest.name) == vector_dimension(&src.name);
    }
    false
}

/// The result of checking one expression.
#[derive(Debug, Clone, Default)]
pub(crate) struct TypedValue {
    pub(crate) ty: TypeInfo,
    pub(crate) is_lvalue: bool,
}

impl TypedValue {
    pub(crate) fn invalid() -> TypedValue {
        TypedValue::default()
    }

    pub(crate) fn rvalue(ty: TypeInfo) -> TypedValue {
        TypedValue {
            ty,
            is_lvalue: false,
        }
    }

    pub(crate) fn lvalue(ty: TypeInfo) -> TypedValue {
        TypedValue { ty, is_lvalue: true }
    }
}

#[derive(Debug, Clone)]
pub(crate) struct Symbol {
    pub(crate) token: Token,
    pub(crate) ty: TypeInfo,
    pub(crate) is_assignable: bool,
}

#[derive(Debug, Clone)]
pub(crate) struct FunctionSignature {
    pub(crate) name_token: Token,
    pub(crate) return_type: TypeInfo,
    pub(crate) returns_reference: bool,
    pub(crate) is_method: bool,
    pub(crate) is_const_method: bool,
    pub(crate) parameters: Vec<TypeInfo>,
    /// `name(param, param)` as shown in overload diagnostics.
    pub(crate) display_name: String,
}

#[derive(Debug, Clone)]
pub(crate) struct AggregateField {
    pub(crate) name_token: Token,
    pub(crate) ty: TypeInfo,
}

/// Everything the analyzer knows about one aggregate. Member maps preserve
/// declaration order.
#[derive(Debug, Clone, Default)]
pub(crate) struct AggregateInfo {
    pub(crate) qualified_name: String,
    pub(crate) fields: IndexMap<String, AggregateField>,
    pub(crate) methods: IndexMap<String, Vec<FunctionSignature>>,
    pub(crate) operators: IndexMap<String, Vec<FunctionSignature>>,
    pub(crate) constructors: Vec<FunctionSignature>,
    pub(crate) has_user_default_constructor: bool,
    pub(crate) has_explicit_constructor: bool,
    pub(crate) allow_unsized_arrays: bool,
}
