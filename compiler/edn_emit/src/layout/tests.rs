use edn_ir::read;
use pretty_assertions::assert_eq;

use super::*;

fn collect(src: &str) -> (TypeTable, Layouts, Vec<EmitProblem>) {
    let forms = read(src).unwrap();
    let mut types = TypeTable::new();
    let mut problems = Vec::new();
    let layouts = Layouts::collect(&forms, &mut types, &mut problems);
    (types, layouts, problems)
}

#[test]
fn struct_fields_in_declaration_order() {
    let (types, layouts, problems) = collect(
        "(struct :name Point :fields [(field :name x :type i32) (field :name y :type i64)])",
    );
    assert!(problems.is_empty());
    let point = layouts.struct_layout("Point").unwrap();
    let (index, ty) = point.field("y").unwrap();
    assert_eq!(index, 1);
    assert_eq!(types.display(ty).to_string(), "i64");
    assert_eq!(types.size_of(point.ty), 16);
}

#[test]
fn sum_payload_fits_largest_variant() {
    let (types, layouts, problems) = collect(
        "(sum :name Shape :variants [(variant :name Dot :fields [])
                                     (variant :name Rect :fields [i32 i64])
                                     (variant :name Circle :fields [f64])])",
    );
    assert!(problems.is_empty());
    let shape = layouts.sum("Shape").unwrap();
    assert_eq!(shape.variant_names().collect::<Vec<_>>(), ["Dot", "Rect", "Circle"]);
    assert_eq!(shape.variant("Circle").unwrap().tag, 2);
    let body = types.struct_fields(shape.ty).unwrap();
    assert_eq!(types.display(body[1]).to_string(), "[12 x i8]");

    let rect = shape.variant("Rect").unwrap();
    let (offset, ty) = rect.field_offset(1, &types).unwrap();
    assert_eq!(offset, 4);
    assert_eq!(types.display(ty).to_string(), "i64");
    assert!(rect.field_offset(2, &types).is_none());
}

#[test]
fn empty_sum_still_has_a_payload_byte() {
    let (types, layouts, _) = collect("(sum :name Unit :variants [(variant :name U :fields [])])");
    let body = types.struct_fields(layouts.sum("Unit").unwrap().ty).unwrap();
    assert_eq!(types.display(body[1]).to_string(), "[1 x i8]");
}

#[test]
fn sum_may_reference_a_later_struct() {
    let (types, layouts, problems) = collect(
        "(sum :name Opt :variants [(variant :name Some :fields [Pair])])
         (struct :name Pair :fields [(field :name a :type i64) (field :name b :type i64)])",
    );
    assert!(problems.is_empty());
    let body = types.struct_fields(layouts.sum("Opt").unwrap().ty).unwrap();
    assert_eq!(types.display(body[1]).to_string(), "[16 x i8]");
}

#[test]
fn union_is_sized_for_largest_field() {
    let (types, layouts, _) = collect(
        "(union :name Bits :fields [(ufield :name f :type f32) (ufield :name d :type f64)])",
    );
    let bits = layouts.union_layout("Bits").unwrap();
    assert_eq!(types.size_of(bits.ty), 8);
    assert!(bits.field("d").is_some());
    assert!(bits.field("q").is_none());
}

#[test]
fn malformed_declarations_are_reported() {
    let (_, layouts, problems) = collect(
        "(struct :fields [])
         (struct :name Bad :fields [(oops)])",
    );
    assert_eq!(problems.len(), 2);
    assert!(layouts.struct_layout("Bad").is_none());
    assert!(problems.iter().all(|p| p.op == "struct"));
}
