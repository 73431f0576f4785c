//! Opcode and operator enum definitions.

use strum::{Display as StrumDisplay, FromRepr};

/// One VM instruction. Operands are encoded inline after the opcode byte,
/// little-endian for multi-byte operands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, FromRepr, StrumDisplay)]
#[repr(u8)]
pub enum Opcode {
    Nop,

    // singletons
    Nil,
    True,
    False,

    /// Push constant pool entry `k` (u16).
    LoadConst,

    // locals
    LoadFast,
    StoreFast,
    /// Read/write a promoted local slot through its cell.
    LoadCell,
    StoreCell,
    /// Push the cell object held in a promoted local slot.
    MakeCell,

    // free variables (captured cells)
    LoadFree,
    StoreFree,
    /// Push free cell `i` itself, for re-capture by a nested closure.
    LoadFreeCell,

    // module globals
    LoadGlobal,
    StoreGlobal,

    // attribute access; operand is a constant-pool index of the name
    LoadAttr,

    // operators
    BinaryOp,
    UnaryOp,
    Compare,

    // containers
    BuildList,
    BuildMap,
    BuildSet,
    /// Concatenate n string parts (template strings).
    BuildString,
    GetItem,
    SetItem,
    Slice,
    /// Unpack a list of exactly n items onto the stack, last item first.
    Unpack,

    // iteration
    GetIter,
    /// Advance the iterator at TOS; operands: jump offset (i16) taken on
    /// exhaustion, then the number of values to push (u8: 1 = key,
    /// 2 = key and value).
    IterNext,

    // jumps; relative signed i16 offsets from the following instruction
    Jump,
    JumpIfFalse,
    JumpIfTrue,

    // calls
    Call,
    Return,
    /// Build a closure; operands: function prototype constant (u16) and the
    /// number of captured cells popped from the stack (u8).
    MakeFunction,

    // stack shuffling
    /// Push a copy of the value `n` slots below TOS (u8; 0 duplicates TOS).
    Copy,
    Swap,
    /// Move the value `n` slots below TOS to the top (u8).
    Rotate,
    PopTop,

    /// Import a module; operand is a constant-pool index of the name.
    Import,

    // concurrency
    /// Pop a call (callee + n args) into the current frame's defer list.
    Defer,
    /// Launch a thread running the popped callee with n snapshotted args.
    Spawn,
    Send,
    Receive,
}

impl Opcode {
    /// Number of inline operand bytes following this opcode.
    #[must_use]
    pub fn operand_bytes(self) -> usize {
        match self {
            Self::Nop
            | Self::Nil
            | Self::True
            | Self::False
            | Self::GetItem
            | Self::SetItem
            | Self::Slice
            | Self::GetIter
            | Self::Return
            | Self::Swap
            | Self::PopTop
            | Self::Send
            | Self::Receive => 0,
            Self::LoadFast
            | Self::StoreFast
            | Self::LoadCell
            | Self::StoreCell
            | Self::MakeCell
            | Self::LoadFree
            | Self::StoreFree
            | Self::LoadFreeCell
            | Self::BinaryOp
            | Self::UnaryOp
            | Self::Compare
            | Self::Unpack
            | Self::Call
            | Self::Copy
            | Self::Rotate
            | Self::Defer
            | Self::Spawn => 1,
            Self::LoadConst
            | Self::LoadGlobal
            | Self::StoreGlobal
            | Self::LoadAttr
            | Self::BuildList
            | Self::BuildMap
            | Self::BuildSet
            | Self::BuildString
            | Self::Jump
            | Self::JumpIfFalse
            | Self::JumpIfTrue
            | Self::Import => 2,
            Self::IterNext | Self::MakeFunction => 3,
        }
    }
}

/// Binary operator kinds dispatched by the `BinaryOp` opcode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, FromRepr, StrumDisplay)]
#[repr(u8)]
pub enum BinaryOp {
    #[strum(serialize = "+")]
    Add,
    #[strum(serialize = "-")]
    Sub,
    #[strum(serialize = "*")]
    Mul,
    #[strum(serialize = "/")]
    Div,
    #[strum(serialize = "%")]
    Mod,
    #[strum(serialize = "**")]
    Pow,
    #[strum(serialize = "<<")]
    LShift,
    #[strum(serialize = ">>")]
    RShift,
    #[strum(serialize = "in")]
    Contains,
}

/// Comparison kinds dispatched by the `Compare` opcode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, FromRepr, StrumDisplay)]
#[repr(u8)]
pub enum CompareOp {
    #[strum(serialize = "==")]
    Eq,
    #[strum(serialize = "!=")]
    NotEq,
    #[strum(serialize = "<")]
    Lt,
    #[strum(serialize = "<=")]
    LtEq,
    #[strum(serialize = ">")]
    Gt,
    #[strum(serialize = ">=")]
    GtEq,
}

/// Unary operator kinds dispatched by the `UnaryOp` opcode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, FromRepr, StrumDisplay)]
#[repr(u8)]
pub enum UnaryOp {
    #[strum(serialize = "-")]
    Neg,
    #[strum(serialize = "!")]
    Not,
}
