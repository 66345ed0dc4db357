//! `IrFunction`: one compiled C function, as handed to the optimizer by the front-end.

use crate::ir::container::OptCodeContainer;
use crate::ir::debuginfo::DebugInfo;
use crate::ir::BlockRef;

/// A parameter type slot. The optimizer core does not interpret the type beyond its width and
/// signedness; richer type information lives in the front-end's own AST/type tables.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ParamType {
    /// Width in bits.
    pub bits: u16,
    /// Whether the parameter is a floating-point value.
    pub is_float: bool,
}

/// A function's declaration: everything needed to call it, independent of its body.
#[derive(Debug, Clone)]
pub struct FunctionDeclaration {
    /// The function's linkage name.
    pub name: String,
    /// Parameter types, in order.
    pub params: Vec<ParamType>,
    /// Return type, or `None` for `void`.
    pub return_type: Option<ParamType>,
    /// Whether the function accepts additional variadic arguments beyond `params`.
    pub is_vararg: bool,
}

/// One C function definition: its declaration and its opt-IR body. The body carries its own
/// debug-info side tables (see [`OptCodeContainer::debug_info`]); `replace_references` keeps them
/// rewritten in lockstep with the instructions they describe.
pub struct IrFunction {
    /// The function's declaration.
    pub declaration: FunctionDeclaration,
    /// The function's opt-IR body.
    pub body: OptCodeContainer,
}

impl IrFunction {
    /// Create a new function with the given declaration and an empty body.
    pub fn new(declaration: FunctionDeclaration) -> Self {
        Self {
            declaration,
            body: OptCodeContainer::new(),
        }
    }

    /// The function's entry block, if its body has been built far enough to have one.
    pub fn entry_point(&self) -> Option<BlockRef> {
        self.body.entry_point()
    }

    /// This function's debug-info side tables.
    pub fn debug_info(&self) -> &DebugInfo {
        self.body.debug_info()
    }

    /// This function's debug-info side tables, mutably.
    pub fn debug_info_mut(&mut self) -> &mut DebugInfo {
        self.body.debug_info_mut()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::Opcode;

    #[test]
    fn new_function_has_empty_body() {
        let decl = FunctionDeclaration {
            name: "f".to_string(),
            params: vec![],
            return_type: None,
            is_vararg: false,
        };
        let mut f = IrFunction::new(decl);
        assert!(f.entry_point().is_none());
        let block = f.body.new_block();
        f.body.set_entry_point(block).unwrap();
        f.body.append_instruction(block, Opcode::Return, &[]).unwrap();
        assert_eq!(f.entry_point(), Some(block));
    }

    #[test]
    fn debug_info_accessors_delegate_to_body() {
        use crate::ir::debuginfo::SourceRange;

        let decl = FunctionDeclaration {
            name: "f".to_string(),
            params: vec![],
            return_type: None,
            is_vararg: false,
        };
        let mut f = IrFunction::new(decl);
        let block = f.body.new_block();
        let v = f.body.append_instruction(block, Opcode::IntConst(1), &[]).unwrap();
        f.debug_info_mut().set_source_range(v, SourceRange::new(0, 4));
        assert_eq!(f.debug_info().source_range(v), Some(SourceRange::new(0, 4)));
    }
}
