//! std140 / std430 memory layout of DataBlocks.
//!
//! Offsets are computed by rounding the running offset up to each field's
//! alignment before placement; the block's size is the running offset
//! rounded up to the block alignment (max field alignment, itself rounded up
//! to 16 under std140).

use rustc_hash::FxHashMap;

use super::manifest::{BlockDefinition, BlockMember, DynamicArrayLayout};
use crate::constexpr;
use crate::syntax::ast::{Aggregate, Member, Module, TypeName, VariableDeclarator};

#[derive(Clone, Copy, PartialEq, Eq)]
pub(crate) enum MemoryLayout {
    Std140,
    Std430,
}

fn round_up(value: u32, alignment: u32) -> u32 {
    if alignment == 0 {
        return value;
    }
    value.div_ceil(alignment) * alignment
}

fn is_scalar_type(name: &str) -> bool {
    matches!(name, "bool" | "int" | "uint" | "float")
}

fn try_parse_vector(name: &str) -> Option<u32> {
    let rest = name.strip_prefix("Vector")?;
    let components = rest.chars().next()?.to_digit(10)?;
    (2..=4).contains(&components).then_some(components)
}

fn try_parse_matrix(name: &str) -> Option<(u32, u32)> {
    let rest = name.strip_prefix("Matrix")?;
    let (columns, rows) = rest.split_once('x')?;
    let columns: u32 = columns.parse().ok()?;
    let rows: u32 = rows.parse().ok()?;
    (columns > 0 && rows > 0).then_some((columns, rows))
}

pub(crate) fn aggregate_has_unsized_array(aggregate: &Aggregate) -> bool {
    aggregate.members.iter().any(|member| match member {
        Member::Field(field) => field
            .declarators
            .iter()
            .any(VariableDeclarator::is_unsized_array),
        _ => false,
    })
}

struct TypeLayout {
    size: u32,
    alignment: u32,
    members: Vec<BlockMember>,
}

pub(crate) struct BlockLayouter<'a> {
    pub(crate) module: &'a Module,
    /// Qualified struct name -> definition, for nested struct fields.
    pub(crate) structs: &'a FxHashMap<String, &'a Aggregate>,
}

impl BlockLayouter<'_> {
    pub(crate) fn block_definition(&self, aggregate: &Aggregate, name: String) -> BlockDefinition {
        let mut block = BlockDefinition {
            name: name.clone(),
            ty: if aggregate_has_unsized_array(aggregate) {
                "SSBO".to_string()
            } else {
                "UBO".to_string()
            },
            size: 0,
            members: Vec::new(),
            dynamic_array: None,
        };

        let layout = if block.ty == "SSBO" {
            MemoryLayout::Std430
        } else {
            MemoryLayout::Std140
        };

        let mut recursion = vec![name];
        let mut current_offset = 0u32;
        let mut max_alignment = 1u32;

        'fields: for member in &aggregate.members {
            let Member::Field(field) = member else {
                continue;
            };
            for declarator in &field.declarators {
                if declarator.is_unsized_array() {
                    if block.dynamic_array.is_none() {
                        self.assign_dynamic_array(
                            &mut block,
                            &field.ty,
                            declarator,
                            layout,
                            &mut recursion,
                            &mut current_offset,
                            &mut max_alignment,
                        );
                    }
                    // anything after the unsized array is rejected by the
                    // analyzer; layout stops here
                    break 'fields;
                }

                let (mut member, size, alignment) =
                    self.layout_field(&field.ty, declarator, layout, &mut recursion);
                let aligned_offset = round_up(current_offset, alignment);
                member.offset = aligned_offset;
                current_offset = aligned_offset + size;
                max_alignment = max_alignment.max(alignment);
                block.members.push(member);
            }
        }

        let mut block_alignment = max_alignment;
        if layout == MemoryLayout::Std140 {
            block_alignment = round_up(block_alignment, 16);
        }

        block.size = match &block.dynamic_array {
            Some(dynamic) => round_up(dynamic.offset, block_alignment),
            None => round_up(current_offset, block_alignment),
        };
        block
    }

    fn assign_dynamic_array(
        &self,
        block: &mut BlockDefinition,
        element_type: &TypeName,
        declarator: &VariableDeclarator,
        layout: MemoryLayout,
        recursion: &mut Vec<String>,
        current_offset: &mut u32,
        max_alignment: &mut u32,
    ) {
        let element_layout = self.layout_type(&element_type.name.join(), layout, recursion);
        block.ty = "SSBO".to_string();

        let mut array_alignment = element_layout.alignment;
        if layout == MemoryLayout::Std140 {
            array_alignment = round_up(array_alignment, 16);
        }

        let aligned_offset = round_up(*current_offset, array_alignment);
        // dynamic tails are always strided in 16-byte steps so the host can
        // append elements without re-deriving the scalar layout
        let element_stride = if layout == MemoryLayout::Std140 {
            round_up(element_layout.size, 16)
        } else {
            round_up(round_up(element_layout.size, element_layout.alignment), 16)
        };

        block.dynamic_array = Some(DynamicArrayLayout {
            name: declarator.name.display_text().to_string(),
            offset: aligned_offset,
            element_stride,
            element_padding: 0,
            members: element_layout.members,
        });

        *current_offset = aligned_offset;
        *max_alignment = (*max_alignment).max(array_alignment);
    }

    fn layout_field(
        &self,
        ty: &TypeName,
        declarator: &VariableDeclarator,
        layout: MemoryLayout,
        recursion: &mut Vec<String>,
    ) -> (BlockMember, u32, u32) {
        let mut member = BlockMember::element(declarator.name.display_text().to_string());

        let type_layout = self.layout_type(&ty.name.join(), layout, recursion);
        member.members = type_layout.members;
        let mut size = type_layout.size;
        let mut alignment = type_layout.alignment;

        if declarator.has_array_suffix {
            member.kind = "Array".to_string();
            let mut array_alignment = type_layout.alignment;
            let stride = if layout == MemoryLayout::Std140 {
                array_alignment = round_up(array_alignment, 16);
                round_up(type_layout.size, 16)
            } else {
                round_up(type_layout.size, type_layout.alignment)
            };

            let count = declarator
                .array_size
                .and_then(|size_expr| constexpr::evaluate_integral(self.module, size_expr))
                .filter(|&count| count >= 0)
                .unwrap_or(0) as u32;

            member.element_size = Some(stride);
            member.nb_elements = Some(count);
            alignment = array_alignment;
            size = stride * count;
        }

        member.size = size;
        (member, size, alignment)
    }

    fn layout_type(
        &self,
        type_name: &str,
        layout: MemoryLayout,
        recursion: &mut Vec<String>,
    ) -> TypeLayout {
        if type_name.is_empty() {
            return TypeLayout {
                size: 0,
                alignment: 4,
                members: Vec::new(),
            };
        }

        if is_scalar_type(type_name) {
            return TypeLayout {
                size: 4,
                alignment: 4,
                members: Vec::new(),
            };
        }

        if type_name == "Color" {
            return TypeLayout {
                size: 16,
                alignment: 16,
                members: Vec::new(),
            };
        }

        if let Some(components) = try_parse_vector(type_name) {
            return TypeLayout {
                size: components * 4,
                alignment: if components == 2 { 8 } else { 16 },
                members: Vec::new(),
            };
        }

        if let Some((columns, rows)) = try_parse_matrix(type_name) {
            let mut column_alignment = if rows == 2 { 8 } else { 16 };
            if layout == MemoryLayout::Std140 {
                column_alignment = round_up(column_alignment, 16);
            }
            let stride = round_up(
                rows * 4,
                if layout == MemoryLayout::Std140 {
                    16
                } else {
                    column_alignment
                },
            );
            return TypeLayout {
                size: stride * columns,
                alignment: column_alignment,
                members: Vec::new(),
            };
        }

        let Some(aggregate) = self.structs.get(type_name) else {
            return TypeLayout {
                size: 0,
                alignment: 16,
                members: Vec::new(),
            };
        };

        if recursion.iter().any(|name| name == type_name) {
            return TypeLayout {
                size: 0,
                alignment: 16,
                members: Vec::new(),
            };
        }

        recursion.push(type_name.to_string());
        let result = self.layout_aggregate(aggregate, layout, recursion);
        recursion.pop();
        result
    }

    /// Nested structs are laid out recursively under the same memory layout;
    /// the struct size is rounded up to its own alignment.
    fn layout_aggregate(
        &self,
        aggregate: &Aggregate,
        layout: MemoryLayout,
        recursion: &mut Vec<String>,
    ) -> TypeLayout {
        let mut members = Vec::new();
        let mut current_offset = 0u32;
        let mut max_alignment = 1u32;

        for member in &aggregate.members {
            let Member::Field(field) = member else {
                continue;
            };
            for declarator in &field.declarators {
                let (mut block_member, size, alignment) =
                    self.layout_field(&field.ty, declarator, layout, recursion);
                let aligned_offset = round_up(current_offset, alignment);
                block_member.offset = aligned_offset;
                current_offset = aligned_offset + size;
                max_alignment = max_alignment.max(alignment);
                members.push(block_member);
            }
        }

        let mut struct_alignment = max_alignment;
        if layout == MemoryLayout::Std140 {
            struct_alignment = round_up(struct_alignment, 16);
        }

        TypeLayout {
            size: round_up(current_offset, struct_alignment),
            alignment: struct_alignment,
            members,
        }
    }
}
