//! Cell symbols and cell-type records.
//!
//! A [`CellSymbol`] is a tag from a closed set of Boolean primitives and
//! sequential elements. A [`CellType`] pairs a symbol with a name, port
//! arities, a kind, optional physical attributes, and (for soft operators)
//! an implementation subnet. Builtin gate types are pre-registered by the
//! [`Context`](crate::context::Context) so that a symbol converts to its
//! type ID without a registry lookup.

use crate::ids::{CellTypeId, SubnetId};
use serde::{Deserialize, Serialize};

/// Input/output arity wildcard: the port count is not fixed by the type.
pub const ANY_ARITY: u16 = 0xFFFF;

/// Tags of the closed symbol set.
///
/// Negative symbols (`Not`, `Nand`, `Nor`, `Xnor`) are never stored in the
/// canonical netlist form; inverters live in edge polarity instead. The
/// symbols still exist so libraries and front-ends can name them.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, Serialize, Deserialize)]
pub enum CellSymbol {
    /// Primary input.
    In,
    /// Primary output.
    Out,
    /// Constant 0.
    Zero,
    /// Constant 1.
    One,
    /// Identity: OUT = X.
    Buf,
    /// Negation: OUT = ~X.
    Not,
    /// Conjunction: OUT = X & Y (& ...).
    And,
    /// Disjunction: OUT = X | Y (| ...).
    Or,
    /// Exclusive OR: OUT = X ^ Y (^ ...).
    Xor,
    /// Sheffer's stroke: OUT = ~(X & Y (& ...)).
    Nand,
    /// Peirce's arrow: OUT = ~(X | Y (| ...)).
    Nor,
    /// Exclusive NOR: OUT = ~(X ^ Y (^ ...)).
    Xnor,
    /// Majority function over an odd number of inputs.
    Maj,
    /// D flip-flop (D, CLK).
    Dff,
    /// D flip-flop with asynchronous reset and set (D, CLK, RST, SET).
    DffRs,
    /// D latch (D, ENA).
    Latch,
    /// RS latch (RST, SET).
    LatchRs,
    /// Multi-bit addition (soft operator).
    Add,
    /// Multi-bit subtraction (soft operator).
    Sub,
    /// Multi-bit multiplication (soft operator).
    Mul,
    /// Multi-bit shift left (soft operator).
    Shl,
    /// Multi-bit shift right (soft operator).
    Shr,
    /// Multi-bit equality comparison (soft operator).
    Eq,
    /// Multi-bit less-than comparison (soft operator).
    Lt,
    /// Undefined/opaque cell.
    Undef,
}

/// All builtin symbols in registration order.
pub const BUILTIN_SYMBOLS: [CellSymbol; 25] = [
    CellSymbol::In,
    CellSymbol::Out,
    CellSymbol::Zero,
    CellSymbol::One,
    CellSymbol::Buf,
    CellSymbol::Not,
    CellSymbol::And,
    CellSymbol::Or,
    CellSymbol::Xor,
    CellSymbol::Nand,
    CellSymbol::Nor,
    CellSymbol::Xnor,
    CellSymbol::Maj,
    CellSymbol::Dff,
    CellSymbol::DffRs,
    CellSymbol::Latch,
    CellSymbol::LatchRs,
    CellSymbol::Add,
    CellSymbol::Sub,
    CellSymbol::Mul,
    CellSymbol::Shl,
    CellSymbol::Shr,
    CellSymbol::Eq,
    CellSymbol::Lt,
    CellSymbol::Undef,
];

impl CellSymbol {
    /// Stable display name.
    pub fn name(self) -> &'static str {
        match self {
            CellSymbol::In => "IN",
            CellSymbol::Out => "OUT",
            CellSymbol::Zero => "ZERO",
            CellSymbol::One => "ONE",
            CellSymbol::Buf => "BUF",
            CellSymbol::Not => "NOT",
            CellSymbol::And => "AND",
            CellSymbol::Or => "OR",
            CellSymbol::Xor => "XOR",
            CellSymbol::Nand => "NAND",
            CellSymbol::Nor => "NOR",
            CellSymbol::Xnor => "XNOR",
            CellSymbol::Maj => "MAJ",
            CellSymbol::Dff => "DFF",
            CellSymbol::DffRs => "DFFrs",
            CellSymbol::Latch => "LATCH",
            CellSymbol::LatchRs => "LATCHrs",
            CellSymbol::Add => "ADD",
            CellSymbol::Sub => "SUB",
            CellSymbol::Mul => "MUL",
            CellSymbol::Shl => "SHL",
            CellSymbol::Shr => "SHR",
            CellSymbol::Eq => "EQ",
            CellSymbol::Lt => "LT",
            CellSymbol::Undef => "UNDEF",
        }
    }

    /// True for symbols whose canonical form is an inverted positive gate.
    pub fn is_negative(self) -> bool {
        matches!(
            self,
            CellSymbol::Not | CellSymbol::Nand | CellSymbol::Nor | CellSymbol::Xnor
        )
    }

    /// True if input order does not matter.
    pub fn is_commutative(self) -> bool {
        matches!(
            self,
            CellSymbol::And
                | CellSymbol::Or
                | CellSymbol::Xor
                | CellSymbol::Nand
                | CellSymbol::Nor
                | CellSymbol::Xnor
                | CellSymbol::Maj
                | CellSymbol::Add
                | CellSymbol::Mul
                | CellSymbol::Eq
        )
    }

    /// True if a wide instance can be regrouped into a tree of the same symbol.
    pub fn is_regroupable(self) -> bool {
        matches!(self, CellSymbol::And | CellSymbol::Or | CellSymbol::Xor)
    }

    /// True for the constant symbols.
    pub fn is_constant(self) -> bool {
        matches!(self, CellSymbol::Zero | CellSymbol::One)
    }

    /// True for the identity symbol.
    pub fn is_identity(self) -> bool {
        self == CellSymbol::Buf
    }

    /// True for flip-flops and latches.
    pub fn is_sequential(self) -> bool {
        matches!(
            self,
            CellSymbol::Dff | CellSymbol::DffRs | CellSymbol::Latch | CellSymbol::LatchRs
        )
    }

    /// True for the multi-bit soft operators without builtin gate semantics.
    pub fn is_soft_op(self) -> bool {
        matches!(
            self,
            CellSymbol::Add
                | CellSymbol::Sub
                | CellSymbol::Mul
                | CellSymbol::Shl
                | CellSymbol::Shr
                | CellSymbol::Eq
                | CellSymbol::Lt
        )
    }

    /// True for single-bit combinational gate symbols (constants included).
    pub fn is_gate(self) -> bool {
        matches!(
            self,
            CellSymbol::Zero
                | CellSymbol::One
                | CellSymbol::Buf
                | CellSymbol::Not
                | CellSymbol::And
                | CellSymbol::Or
                | CellSymbol::Xor
                | CellSymbol::Nand
                | CellSymbol::Nor
                | CellSymbol::Xnor
                | CellSymbol::Maj
        )
    }

    /// The fixed input arity of the symbol, if it has one.
    pub fn fixed_arity(self) -> Option<u16> {
        match self {
            CellSymbol::In | CellSymbol::Zero | CellSymbol::One => Some(0),
            CellSymbol::Out | CellSymbol::Buf | CellSymbol::Not => Some(1),
            CellSymbol::Dff | CellSymbol::Latch | CellSymbol::LatchRs => Some(2),
            CellSymbol::DffRs => Some(4),
            _ => None,
        }
    }

    fn index(self) -> u32 {
        BUILTIN_SYMBOLS
            .iter()
            .position(|&s| s == self)
            .expect("symbol missing from builtin table") as u32
    }

    /// Decodes a builtin symbol from its registry index.
    pub fn from_index(index: u32) -> Option<Self> {
        BUILTIN_SYMBOLS.get(index as usize).copied()
    }
}

impl From<CellSymbol> for CellTypeId {
    fn from(symbol: CellSymbol) -> Self {
        CellTypeId::from_raw(symbol.index())
    }
}

impl CellTypeId {
    /// The builtin symbol this ID denotes, if it is in the builtin range.
    pub fn builtin_symbol(self) -> Option<CellSymbol> {
        CellSymbol::from_index(self.as_raw())
    }
}

/// Classification of a cell type.
#[derive(Clone, Copy, PartialEq, Eq, Debug, Serialize, Deserialize)]
pub enum CellKind {
    /// Builtin single-bit Boolean primitive.
    Gate,
    /// Technology cell from a library.
    Cell,
    /// Operator implemented by an inner subnet.
    Soft,
    /// Opaque block with no implementation.
    Hard,
}

/// Per-pin rise/fall power figures.
#[derive(Clone, Copy, PartialEq, Debug, Default, Serialize, Deserialize)]
pub struct PinPower {
    /// Average rise power of the pin.
    pub rise: f32,
    /// Average fall power of the pin.
    pub fall: f32,
}

/// Physical attributes attached to a cell type.
#[derive(Clone, PartialEq, Debug, Default, Serialize, Deserialize)]
pub struct CellAttr {
    /// Cell area.
    pub area: f32,
    /// Pin-to-pin delay.
    pub delay: f32,
    /// Per-input-pin power figures.
    pub pin_power: Vec<PinPower>,
    /// Port widths for multi-bit types (empty for single-bit cells).
    pub port_widths: Vec<u16>,
}

/// An immutable cell-type record.
#[derive(Clone, Debug)]
pub struct CellType {
    /// The symbol family of the type.
    pub symbol: CellSymbol,
    /// Human-readable name (library cell name for technology cells).
    pub name: String,
    /// Input arity, or [`ANY_ARITY`] if variadic.
    pub n_in: u16,
    /// Output arity, or [`ANY_ARITY`].
    pub n_out: u16,
    /// Classification.
    pub kind: CellKind,
    /// Optional physical attributes.
    pub attr: Option<CellAttr>,
    /// Implementation subnet for soft operators and library cells.
    pub subnet: Option<SubnetId>,
}

impl CellType {
    /// Creates the builtin type record for a gate symbol.
    pub fn gate(symbol: CellSymbol) -> Self {
        Self {
            symbol,
            name: symbol.name().to_string(),
            n_in: symbol.fixed_arity().unwrap_or(ANY_ARITY),
            n_out: if symbol == CellSymbol::Out { 0 } else { 1 },
            kind: CellKind::Gate,
            attr: None,
            subnet: None,
        }
    }

    /// Creates a library technology cell backed by an implementation subnet.
    pub fn library_cell(
        name: impl Into<String>,
        symbol: CellSymbol,
        n_in: u16,
        subnet: Option<SubnetId>,
        attr: CellAttr,
    ) -> Self {
        Self {
            symbol,
            name: name.into(),
            n_in,
            n_out: 1,
            kind: CellKind::Cell,
            attr: Some(attr),
            subnet,
        }
    }

    /// Creates a soft multi-bit operator implemented by `subnet`.
    pub fn soft(
        name: impl Into<String>,
        symbol: CellSymbol,
        n_in: u16,
        n_out: u16,
        subnet: SubnetId,
    ) -> Self {
        Self {
            symbol,
            name: name.into(),
            n_in,
            n_out,
            kind: CellKind::Soft,
            attr: None,
            subnet: Some(subnet),
        }
    }

    /// Area of the type, 0 when no attributes are attached.
    pub fn area(&self) -> f32 {
        self.attr.as_ref().map_or(0.0, |a| a.area)
    }

    /// Delay of the type, 0 when no attributes are attached.
    pub fn delay(&self) -> f32 {
        self.attr.as_ref().map_or(0.0, |a| a.delay)
    }
}
