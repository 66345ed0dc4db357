//! The opt-IR container: blocks, instructions, phi nodes, use-lists, static data, identifiers,
//! and debug-info side tables.

pub mod container;
pub mod data;
pub mod debuginfo;
mod dfg;
pub mod function;
pub mod identifiers;
mod instruction;
mod layout;
mod opcode;

mod entities;

pub use container::OptCodeContainer;
pub use data::{AggregateBoundary, BitfieldChunk, IrData, IrDataSlot, IrDataValue};
pub use debuginfo::{DebugInfo, LocalVariableId, SourceRange};
pub use entities::{BlockRef, InstrRef, PhiRef};
pub use function::{FunctionDeclaration, IrFunction, ParamType};
pub use identifiers::{Identifier, IdentifierScope, IdentifierTable, IdentifierType};
pub use instruction::PhiLink;
pub use layout::{ControlOrderIter, DefOrderIter};
pub use opcode::{LifetimeMarkKind, Opcode};
