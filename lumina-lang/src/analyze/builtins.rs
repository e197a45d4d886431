//! Builtin type classification, the swizzle table and the builtin binary
//! operator promotion rules.

use indexmap::IndexMap;

use super::types::TypeInfo;
use crate::syntax::ast::BinaryOp;

pub(crate) const BUILTIN_TYPES: &[&str] = &[
    "void",
    "bool",
    "int",
    "uint",
    "float",
    "Color",
    "Texture",
    "Vector2",
    "Vector2Int",
    "Vector2UInt",
    "Vector3",
    "Vector3Int",
    "Vector3UInt",
    "Vector4",
    "Vector4Int",
    "Vector4UInt",
    "Matrix2x2",
    "Matrix3x3",
    "Matrix4x4",
];

pub(crate) const NUMERIC_TYPES: &[&str] = &[
    "int",
    "uint",
    "float",
    "Vector2",
    "Vector2Int",
    "Vector2UInt",
    "Vector3",
    "Vector3Int",
    "Vector3UInt",
    "Vector4",
    "Vector4Int",
    "Vector4UInt",
];

pub(crate) const PIPELINE_ALLOWED_TYPES: &[&str] = &[
    "bool",
    "int",
    "uint",
    "float",
    "Color",
    "Vector2",
    "Vector2Int",
    "Vector2UInt",
    "Vector3",
    "Vector3Int",
    "Vector3UInt",
    "Vector4",
    "Vector4Int",
    "Vector4UInt",
    "Matrix2x2",
    "Matrix3x3",
    "Matrix4x4",
];

pub(crate) fn is_builtin_type(name: &str) -> bool {
    BUILTIN_TYPES.contains(&name)
}

pub(crate) fn is_numeric_type(name: &str) -> bool {
    NUMERIC_TYPES.contains(&name)
}

pub(crate) fn is_allowed_pipeline_type(name: &str) -> bool {
    PIPELINE_ALLOWED_TYPES.contains(&name)
}

pub(crate) fn is_boolean_type(name: &str) -> bool {
    name == "bool"
}

pub(crate) fn is_scalar_type_name(name: &str) -> bool {
    matches!(name, "float" | "int" | "uint")
}

/// `Color` counts as a 4-component vector; non-vectors report dimension 0.
pub(crate) fn vector_dimension(name: &str) -> u32 {
    if name == "Color" {
        return 4;
    }
    let Some(rest) = name.strip_prefix("Vector") else {
        return 0;
    };
    match rest.chars().next().and_then(|c| c.to_digit(10)) {
        Some(dim) => dim,
        None => 0,
    }
}

pub(crate) fn parse_matrix_type_name(name: &str) -> Option<(u32, u32)> {
    let rest = name.strip_prefix("Matrix")?;
    let (columns, rows) = rest.split_once('x')?;
    let columns: u32 = columns.parse().ok()?;
    let rows: u32 = rows.parse().ok()?;
    (columns > 0 && rows > 0).then_some((columns, rows))
}

pub(crate) fn is_matrix_type_name(name: &str) -> bool {
    parse_matrix_type_name(name).is_some()
}

pub(crate) fn is_float_type_name(name: &str) -> bool {
    name == "float"
}

pub(crate) fn is_float_vector_type_name(name: &str) -> bool {
    matches!(name, "Vector2" | "Vector3" | "Vector4")
}

pub(crate) fn is_color_type_name(name: &str) -> bool {
    name == "Color"
}

pub(crate) fn is_float_vector_or_color_type_name(name: &str) -> bool {
    is_float_vector_type_name(name) || is_color_type_name(name)
}

pub(crate) fn is_int_vector_type_name(name: &str) -> bool {
    matches!(name, "Vector2Int" | "Vector3Int" | "Vector4Int")
}

pub(crate) fn is_uint_vector_type_name(name: &str) -> bool {
    matches!(name, "Vector2UInt" | "Vector3UInt" | "Vector4UInt")
}

pub(crate) fn is_float_like_type_name(name: &str) -> bool {
    is_float_type_name(name) || is_float_vector_or_color_type_name(name)
}

pub(crate) fn is_int_like_type_name(name: &str) -> bool {
    name == "int" || is_int_vector_type_name(name)
}

pub(crate) fn is_uint_like_type_name(name: &str) -> bool {
    name == "uint" || is_uint_vector_type_name(name)
}

pub(crate) fn is_arithmetic_type_name(name: &str) -> bool {
    is_scalar_type_name(name)
        || vector_dimension(name) != 0
        || is_matrix_type_name(name)
        || name == "Color"
}

/// Promotion rules for heterogeneous builtin operands: scalar×vector,
/// matrix×matrix/vector products, integer modulo, scalar comparisons.
/// `None` means "no builtin rule fires".
pub(crate) fn resolve_builtin_binary_type(
    left: &TypeInfo,
    right: &TypeInfo,
    op: BinaryOp,
) -> Option<TypeInfo> {
    let make_result = |prototype: &TypeInfo| {
        let mut result = prototype.clone();
        result.is_reference = false;
        result.is_const = false;
        result
    };

    let left_scalar = is_scalar_type_name(&left.name);
    let right_scalar = is_scalar_type_name(&right.name);
    let left_vector = vector_dimension(&left.name);
    let right_vector = vector_dimension(&right.name);
    let left_matrix = parse_matrix_type_name(&left.name);
    let right_matrix = parse_matrix_type_name(&right.name);

    match op {
        BinaryOp::Add | BinaryOp::Subtract => {
            if left_vector > 0 && left_vector == right_vector {
                return Some(make_result(left));
            }
            if let (Some(l), Some(r)) = (left_matrix, right_matrix) {
                if l == r {
                    return Some(make_result(left));
                }
            }
            if left_scalar && right_scalar {
                return Some(make_result(left));
            }
            None
        }
        BinaryOp::Multiply => {
            if left_scalar && (right_vector > 0 || right_matrix.is_some() || right_scalar) {
                return Some(make_result(right));
            }
            if right_scalar && (left_vector > 0 || left_matrix.is_some() || left_scalar) {
                return Some(make_result(left));
            }
            if left_vector > 0 && left_vector == right_vector {
                return Some(make_result(left));
            }
            if let Some((columns, _)) = left_matrix {
                if right_vector > 0 && columns == right_vector {
                    return Some(make_result(right));
                }
            }
            if let Some((_, rows)) = right_matrix {
                if left_vector > 0 && rows == left_vector {
                    return Some(make_result(left));
                }
            }
            if let (Some((left_columns, _)), Some((_, right_rows))) = (left_matrix, right_matrix) {
                if left_columns == right_rows {
                    return Some(make_result(left));
                }
            }
            None
        }
        BinaryOp::Divide => {
            if left_vector > 0 && right_scalar {
                return Some(make_result(left));
            }
            if left_scalar && right_scalar {
                return Some(make_result(left));
            }
            if left_scalar && right_vector > 0 {
                return Some(make_result(right));
            }
            None
        }
        BinaryOp::Modulo => {
            let left_integer = matches!(left.name.as_str(), "int" | "uint");
            let right_integer = matches!(right.name.as_str(), "int" | "uint");
            if left_scalar && right_scalar && left_integer && right_integer {
                if left.name == "uint" || right.name == "uint" {
                    return Some(TypeInfo::named("uint"));
                }
                return Some(make_result(left));
            }
            None
        }
        BinaryOp::Less
        | BinaryOp::LessEqual
        | BinaryOp::Greater
        | BinaryOp::GreaterEqual
        | BinaryOp::Equal
        | BinaryOp::NotEqual => {
            if left_scalar && right_scalar {
                return Some(make_result(left));
            }
            None
        }
        _ => None,
    }
}

/// Per-type component metadata for swizzle checking.
pub(crate) struct SwizzleDescriptor {
    pub(crate) scalar_type: &'static str,
    pub(crate) dimension: usize,
    vector_prefix: &'static str,
    vector_suffix: &'static str,
    /// Swizzle lengths with a dedicated result type (`Color.rgba` stays
    /// `Color`).
    custom_result_types: &'static [(usize, &'static str)],
}

pub(crate) fn swizzle_descriptor(type_name: &str) -> Option<&'static SwizzleDescriptor> {
    const DESCRIPTORS: &[(&str, SwizzleDescriptor)] = &[
        ("Vector2", SwizzleDescriptor { scalar_type: "float", dimension: 2, vector_prefix: "Vector", vector_suffix: "", custom_result_types: &[] }),
        ("Vector3", SwizzleDescriptor { scalar_type: "float", dimension: 3, vector_prefix: "Vector", vector_suffix: "", custom_result_types: &[] }),
        ("Vector4", SwizzleDescriptor { scalar_type: "float", dimension: 4, vector_prefix: "Vector", vector_suffix: "", custom_result_types: &[] }),
        ("Vector2Int", SwizzleDescriptor { scalar_type: "int", dimension: 2, vector_prefix: "Vector", vector_suffix: "Int", custom_result_types: &[] }),
        ("Vector3Int", SwizzleDescriptor { scalar_type: "int", dimension: 3, vector_prefix: "Vector", vector_suffix: "Int", custom_result_types: &[] }),
        ("Vector4Int", SwizzleDescriptor { scalar_type: "int", dimension: 4, vector_prefix: "Vector", vector_suffix: "Int", custom_result_types: &[] }),
        ("Vector2UInt", SwizzleDescriptor { scalar_type: "uint", dimension: 2, vector_prefix: "Vector", vector_suffix: "UInt", custom_result_types: &[] }),
        ("Vector3UInt", SwizzleDescriptor { scalar_type: "uint", dimension: 3, vector_prefix: "Vector", vector_suffix: "UInt", custom_result_types: &[] }),
        ("Vector4UInt", SwizzleDescriptor { scalar_type: "uint", dimension: 4, vector_prefix: "Vector", vector_suffix: "UInt", custom_result_types: &[] }),
        ("Color", SwizzleDescriptor { scalar_type: "float", dimension: 4, vector_prefix: "Vector", vector_suffix: "", custom_result_types: &[(4, "Color")] }),
    ];
    DESCRIPTORS
        .iter()
        .find(|(name, _)| *name == type_name)
        .map(|(_, descriptor)| descriptor)
}

fn component_index(component: char) -> Option<usize> {
    match component {
        'x' | 'r' => Some(0),
        'y' | 'g' => Some(1),
        'z' | 'b' => Some(2),
        'w' | 'a' => Some(3),
        _ => None,
    }
}

/// Resolves `.x` / `.rgb` style accesses on builtin vector types. Single
/// components yield the scalar type; swizzles of length 2-4 yield the
/// matching vector type.
pub(crate) fn resolve_builtin_field_type(type_name: &str, field_name: &str) -> Option<TypeInfo> {
    let descriptor = swizzle_descriptor(type_name)?;
    if field_name.is_empty() || field_name.len() > 4 {
        return None;
    }
    for component in field_name.chars() {
        let index = component_index(component)?;
        if index >= descriptor.dimension {
            return None;
        }
    }

    if field_name.len() == 1 {
        return Some(TypeInfo::named(descriptor.scalar_type));
    }

    if let Some(&(_, custom)) = descriptor
        .custom_result_types
        .iter()
        .find(|(len, _)| *len == field_name.len())
    {
        return Some(TypeInfo::named(custom));
    }

    Some(TypeInfo::named(format!(
        "{}{}{}",
        descriptor.vector_prefix,
        field_name.len(),
        descriptor.vector_suffix
    )))
}

/// The builtin `Texture` aggregate: a `getPixel(Vector2) -> Color` const
/// method and nothing else.
pub(crate) fn texture_aggregate() -> super::types::AggregateInfo {
    use super::types::{AggregateInfo, FunctionSignature};
    use crate::syntax::Token;

    let get_pixel = FunctionSignature {
        name_token: Token::synthetic("<builtin>", "getPixel"),
        return_type: TypeInfo::named("Color"),
        returns_reference: false,
        is_method: true,
        is_const_method: true,
        parameters: vec![TypeInfo::named("Vector2")],
        display_name: "Texture::getPixel".to_string(),
    };

    let mut methods = IndexMap::new();
    methods.insert("getPixel".to_string(), vec![get_pixel]);

    AggregateInfo {
        qualified_name: "Texture".to_string(),
        methods,
        ..AggregateInfo::default()
    }
}
