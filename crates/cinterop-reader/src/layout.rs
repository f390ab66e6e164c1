//! Record layout per platform ABI.
//!
//! Fields are placed sequentially at their natural alignment; unions place
//! every field at offset zero. Bitfields pack into storage units of their
//! declared type: the System V rule lets a bitfield continue in the current
//! unit whenever it does not straddle a unit boundary, the MSVC rule opens a
//! new unit whenever the declared type changes or the unit is full.

use cinterop_targets::OperatingSystem;

use crate::graph::UnitGraphBuilder;
use crate::unit::{Cursor, CursorKind, TypeHandle, TypeKind};

fn round_up(value: u64, multiple: u64) -> u64 {
    if multiple <= 1 {
        value
    } else {
        value.div_ceil(multiple) * multiple
    }
}

impl UnitGraphBuilder {
    /// Size and alignment of a type in bytes, laying out records on demand.
    pub fn layout_of(&mut self, ty: TypeHandle) -> Option<(u64, u64)> {
        let data = self.type_data(ty);
        if let (Some(size), Some(align)) = (data.size, data.align) {
            return Some((size, align));
        }
        let kind = data.kind;
        let declaration = data.declaration;
        let inner = data.inner;
        let element = data.element;
        let length = data.length;

        let layout = match kind {
            TypeKind::Void | TypeKind::FunctionProto | TypeKind::Unexposed => None,
            TypeKind::Primitive | TypeKind::Pointer => None,
            TypeKind::ConstantArray => {
                let (size, align) = self.layout_of(element?)?;
                Some((size * length.unwrap_or(0), align))
            }
            // Flexible array members take no space.
            TypeKind::IncompleteArray => {
                let (_, align) = self.layout_of(element?)?;
                Some((0, align))
            }
            TypeKind::Record => {
                let decl = declaration?;
                if !self.cursor_data(decl).is_definition {
                    return None;
                }
                self.layout_record(decl);
                let data = self.type_data(ty);
                return data.size.zip(data.align);
            }
            TypeKind::Enum => {
                let integer = declaration.and_then(|d| self.cursor_data(d).integer_type)?;
                self.layout_of(integer)
            }
            TypeKind::Typedef => {
                let underlying = declaration.and_then(|d| self.cursor_data(d).underlying)?;
                self.layout_of(underlying)
            }
            TypeKind::Elaborated | TypeKind::Qualified => self.layout_of(inner?),
        };

        if let Some((size, align)) = layout {
            let data = self.type_mut(ty);
            data.size = Some(size);
            data.align = Some(align);
        }
        layout
    }

    fn layout_record(&mut self, record: Cursor) {
        let data = self.cursor_data(record);
        if data.laid_out || data.fixed_layout || self.in_progress.contains(&record) {
            return;
        }
        let is_union = data.kind == CursorKind::UnionDecl;
        let record_ty = data.ty;
        let fields: Vec<Cursor> = data
            .children
            .iter()
            .copied()
            .filter(|c| self.cursor_data(*c).kind == CursorKind::FieldDecl)
            .collect();
        self.in_progress.insert(record);

        let msvc = self.platform().os() == OperatingSystem::Windows;
        let mut offset: u64 = 0;
        let mut max_align: u64 = 1;
        // (start, size) of the open MSVC bitfield storage unit, in bits.
        let mut open_unit: Option<(u64, u64)> = None;

        for field in fields {
            let field_data = self.cursor_data(field);
            let bit_width = field_data.bit_width;
            let field_ty = field_data.ty;
            let (size, align) = field_ty.and_then(|t| self.layout_of(t)).unwrap_or((0, 1));
            let align = align.max(1);
            let unit_bits = size * 8;

            if is_union {
                let width = bit_width.map(u64::from).unwrap_or(unit_bits);
                offset = offset.max(width);
                max_align = max_align.max(align);
                self.cursor_mut(field).bit_offset = Some(0);
                continue;
            }

            let placed = match bit_width {
                Some(0) => {
                    if let Some((start, unit)) = open_unit.take() {
                        offset = offset.max(start + unit);
                    }
                    offset = round_up(offset, align * 8);
                    offset
                }
                Some(width) => {
                    let width = u64::from(width);
                    if msvc {
                        match open_unit {
                            Some((start, unit)) if unit == unit_bits && offset + width <= start + unit => {}
                            Some((start, unit)) => {
                                offset = round_up(offset.max(start + unit), align * 8);
                                open_unit = Some((offset, unit_bits));
                            }
                            None => {
                                offset = round_up(offset, align * 8);
                                open_unit = Some((offset, unit_bits));
                            }
                        }
                    } else if unit_bits > 0 && offset / unit_bits != (offset + width - 1) / unit_bits {
                        offset = round_up(offset, align * 8);
                    }
                    let placed = offset;
                    offset += width;
                    max_align = max_align.max(align);
                    placed
                }
                None => {
                    if let Some((start, unit)) = open_unit.take() {
                        offset = offset.max(start + unit);
                    }
                    offset = round_up(offset, align * 8);
                    let placed = offset;
                    offset += unit_bits;
                    max_align = max_align.max(align);
                    placed
                }
            };
            self.cursor_mut(field).bit_offset = Some(placed);
        }
        if let Some((start, unit)) = open_unit {
            offset = offset.max(start + unit);
        }

        let size = round_up(offset.div_ceil(8), max_align);
        if let Some(ty) = record_ty {
            let ty_data = self.type_mut(ty);
            ty_data.size = Some(size);
            ty_data.align = Some(max_align);
        }
        self.in_progress.remove(&record);
        self.cursor_mut(record).laid_out = true;
    }

    /// Lay out every defined record and size every type that has a size.
    pub fn compute_layouts(&mut self) {
        let records: Vec<Cursor> = (0..self.graph.cursors.len() as u32)
            .map(Cursor)
            .filter(|c| {
                let data = self.cursor_data(*c);
                matches!(data.kind, CursorKind::StructDecl | CursorKind::UnionDecl) && data.is_definition
            })
            .collect();
        for record in records {
            self.layout_record(record);
        }
        for index in 0..self.graph.types.len() as u32 {
            self.layout_of(TypeHandle(index));
        }
    }
}

#[cfg(test)]
mod tests {
    use cinterop_ast::CLocation;
    use cinterop_targets::TargetPlatform;

    use crate::graph::UnitGraphBuilder;
    use crate::unit::TranslationUnit;

    fn loc(line: u32) -> CLocation {
        CLocation::source("layout.h", line, 1)
    }

    #[test]
    fn sequential_fields_with_alignment() {
        let mut b = UnitGraphBuilder::new(TargetPlatform::linux_x64(), "layout.h");
        let record = b.record(Some("S"), false, loc(1));
        b.begin_definition(record, loc(1));
        let char_ty = b.primitive("char");
        let double = b.primitive("double");
        let short = b.primitive("short");
        let a = b.add_field(record, "a", char_ty, None, loc(2));
        let d = b.add_field(record, "d", double, None, loc(3));
        let s = b.add_field(record, "s", short, None, loc(4));
        let graph = b.finish();
        assert_eq!(graph.field_bit_offset(a), Some(0));
        assert_eq!(graph.field_bit_offset(d), Some(64));
        assert_eq!(graph.field_bit_offset(s), Some(128));
        let ty = graph.cursor_type(record).unwrap();
        assert_eq!(graph.size_of(ty), Some(24));
        assert_eq!(graph.align_of(ty), Some(8));
    }

    #[test]
    fn i386_sysv_aligns_double_to_four() {
        let mut b = UnitGraphBuilder::new(TargetPlatform::linux_x86(), "layout.h");
        let record = b.record(Some("S"), false, loc(1));
        b.begin_definition(record, loc(1));
        let int = b.primitive("int");
        let double = b.primitive("double");
        b.add_field(record, "i", int, None, loc(2));
        let d = b.add_field(record, "d", double, None, loc(3));
        let graph = b.finish();
        assert_eq!(graph.field_bit_offset(d), Some(32));
        assert_eq!(graph.size_of(graph.cursor_type(record).unwrap()), Some(12));
    }

    #[test]
    fn unions_take_the_largest_member() {
        let mut b = UnitGraphBuilder::new(TargetPlatform::linux_x64(), "layout.h");
        let record = b.record(Some("U"), true, loc(1));
        b.begin_definition(record, loc(1));
        let int = b.primitive("int");
        let char_ty = b.primitive("char");
        let arr = b.array(char_ty, Some(6));
        b.add_field(record, "i", int, None, loc(2));
        let c = b.add_field(record, "c", arr, None, loc(3));
        let graph = b.finish();
        assert_eq!(graph.field_bit_offset(c), Some(0));
        assert_eq!(graph.size_of(graph.cursor_type(record).unwrap()), Some(8));
    }

    #[test]
    fn sysv_bitfields_share_a_unit() {
        let mut b = UnitGraphBuilder::new(TargetPlatform::linux_x64(), "layout.h");
        let record = b.record(Some("Flags"), false, loc(1));
        b.begin_definition(record, loc(1));
        let uint = b.primitive("unsigned int");
        let a = b.add_field(record, "a", uint, Some(3), loc(2));
        let c = b.add_field(record, "c", uint, Some(5), loc(3));
        let d = b.add_field(record, "d", uint, Some(30), loc(4));
        let graph = b.finish();
        assert_eq!(graph.field_bit_offset(a), Some(0));
        assert_eq!(graph.field_bit_offset(c), Some(3));
        // 8 + 30 straddles the first unit.
        assert_eq!(graph.field_bit_offset(d), Some(32));
        assert_eq!(graph.size_of(graph.cursor_type(record).unwrap()), Some(8));
    }

    #[test]
    fn msvc_bitfields_split_on_type_change() {
        let mut b = UnitGraphBuilder::new(TargetPlatform::windows_x64(), "layout.h");
        let record = b.record(Some("Flags"), false, loc(1));
        b.begin_definition(record, loc(1));
        let uchar = b.primitive("unsigned char");
        let uint = b.primitive("unsigned int");
        b.add_field(record, "a", uchar, Some(3), loc(2));
        let c = b.add_field(record, "c", uint, Some(5), loc(3));
        let graph = b.finish();
        assert_eq!(graph.field_bit_offset(c), Some(32));
        assert_eq!(graph.size_of(graph.cursor_type(record).unwrap()), Some(8));
    }

    #[test]
    fn explicit_layout_is_kept() {
        let mut b = UnitGraphBuilder::new(TargetPlatform::linux_x64(), "layout.h");
        let record = b.record(Some("P"), false, loc(1));
        let int = b.primitive("int");
        let x = b.add_field(record, "x", int, None, loc(2));
        let y = b.add_field(record, "y", int, None, loc(3));
        b.set_record_layout(record, 16, 8);
        b.set_field_offset(x, 0);
        b.set_field_offset(y, 96);
        let graph = b.finish();
        assert_eq!(graph.field_bit_offset(y), Some(96));
        assert_eq!(graph.size_of(graph.cursor_type(record).unwrap()), Some(16));
    }

    #[test]
    fn forward_declared_record_has_no_size() {
        let mut b = UnitGraphBuilder::new(TargetPlatform::linux_x64(), "layout.h");
        let record = b.record(Some("Hidden"), false, loc(1));
        let graph = b.finish();
        assert_eq!(graph.size_of(graph.cursor_type(record).unwrap()), None);
    }
}
