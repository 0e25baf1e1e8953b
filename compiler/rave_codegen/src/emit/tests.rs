use pretty_assertions::assert_eq;

use super::*;

fn void_fn() -> IrFuncType {
    IrFuncType {
        ret: IrType::Void,
        params: vec![IrType::Int(32)],
        is_vararg: false,
    }
}

#[test]
fn functions_get_params_and_a_self_value() {
    let mut m = Module::new("t");
    let f = m.push_function("f", void_fn(), CallConv::C);
    let data = m.function(f).cloned().unwrap_or_else(|| panic!("missing function"));
    assert_eq!(data.params.len(), 1);
    assert!(data.is_declaration());
    assert_eq!(m.function_by_name("f"), Some(f));
    assert_eq!(
        m.value(data.value).map(|v| &v.kind),
        Some(&ValueKind::Function(f))
    );
    assert_eq!(m.value_type(data.params[0]), Some(&IrType::Int(32)));
}

#[test]
fn blocks_attach_to_their_function() {
    let mut m = Module::new("t");
    let f = m.push_function("f", void_fn(), CallConv::C);
    let entry = m.push_block(f, "entry");
    let next = m.push_block(f, "next");
    let func = m.function(f).cloned().unwrap_or_else(|| panic!("missing function"));
    assert_eq!(func.blocks, vec![entry, next]);
    assert_eq!(func.entry_block(), Some(entry));
    assert!(!m.is_terminated(entry));
}

#[test]
fn terminator_detection() {
    assert!(Instr::Ret { value: None }.is_terminator());
    assert!(Instr::Br { dest: BlockId::NONE }.is_terminator());
    assert!(!Instr::Store {
        value: ValueId::NONE,
        ptr: ValueId::NONE
    }
    .is_terminator());
}

#[test]
fn fast_flag_is_the_union_of_all_relaxations() {
    let all = FastMathFlags::NO_INFS
        | FastMathFlags::NO_NANS
        | FastMathFlags::ALLOW_RECIPROCAL
        | FastMathFlags::NO_SIGNED_ZEROS;
    assert_eq!(FastMathFlags::FAST, all);
    assert_eq!(FastMathFlags::FAST.to_string(), " fast");
    assert_eq!(
        (FastMathFlags::NO_NANS | FastMathFlags::NO_SIGNED_ZEROS).to_string(),
        " nnan nsz"
    );
    assert_eq!(FastMathFlags::empty().to_string(), "");
}

#[test]
fn type_display() {
    let arr = IrType::Array {
        len: 4,
        elem: Box::new(IrType::Int(8)),
    };
    assert_eq!(IrType::ptr_to(arr).to_string(), "[4 x i8]*");
    assert_eq!(IrType::Float(64).to_string(), "double");
    let sig = IrFuncType {
        ret: IrType::Int(32),
        params: vec![IrType::ptr_to(IrType::Int(8))],
        is_vararg: true,
    };
    assert_eq!(sig.to_string(), "i32 (i8*, ...)");
}

#[test]
fn struct_bodies_are_defined_once() {
    let mut m = Module::new("t");
    let name = Name::from_raw(3);
    m.define_struct(name, vec![IrType::Int(32)]);
    m.define_struct(name, vec![IrType::Int(32)]);
    assert_eq!(m.struct_body(name), Some(&[IrType::Int(32)][..]));
    assert_eq!(m.to_string().matches("%struct.3 = type").count(), 1);
}
