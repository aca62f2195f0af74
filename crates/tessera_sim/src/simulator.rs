//! The compiled simulator.

use tessera_common::{CoreError, CoreResult};
use tessera_model::{CellSymbol, Context, Link, Subnet};

/// Width of one simulation chunk in bits.
pub const DATA_CHUNK_BITS: usize = u64::BITS as usize;

/// Gate kernel selected by `(symbol, arity)` at compile time.
enum Kernel {
    Zero,
    One,
    Buf,
    Not,
    And2,
    And3,
    AndN,
    Or2,
    Or3,
    OrN,
    Xor2,
    Xor3,
    XorN,
    Nand2,
    Nand3,
    NandN,
    Nor2,
    Nor3,
    NorN,
    Xnor2,
    Xnor3,
    XnorN,
    Maj3,
    MajN,
    /// Soft cell: a nested simulator over the implementation subnet.
    Nested(Box<Simulator>),
}

struct Command {
    kernel: Kernel,
    out: usize,
    ins: Vec<Link>,
}

/// A compiled, bit-parallel subnet simulator.
///
/// State is one 64-bit chunk per entry; bit `k` of every chunk carries the
/// `k`-th simulated input vector.
pub struct Simulator {
    program: Vec<Command>,
    state: Vec<u64>,
    n_in: usize,
    out_entries: Vec<usize>,
}

impl Simulator {
    /// Compiles `subnet` into a simulation program.
    ///
    /// Fails on sequential and opaque cells; soft cells recurse into their
    /// implementation subnets.
    pub fn new(subnet: &Subnet, ctx: &Context) -> CoreResult<Self> {
        let mut program = Vec::new();
        let mut out_entries = Vec::with_capacity(subnet.out_num());

        for (i, cell) in subnet.iter_cells() {
            let ins = subnet.links(i);
            let arity = ins.len();
            let kernel = match cell.symbol() {
                Some(CellSymbol::In) => continue,
                Some(CellSymbol::Out) => {
                    out_entries.push(i);
                    Kernel::Buf
                }
                Some(CellSymbol::Zero) => Kernel::Zero,
                Some(CellSymbol::One) => Kernel::One,
                Some(CellSymbol::Buf) => Kernel::Buf,
                Some(CellSymbol::Not) => Kernel::Not,
                Some(CellSymbol::And) => match arity {
                    1 => Kernel::Buf,
                    2 => Kernel::And2,
                    3 => Kernel::And3,
                    _ => Kernel::AndN,
                },
                Some(CellSymbol::Or) => match arity {
                    1 => Kernel::Buf,
                    2 => Kernel::Or2,
                    3 => Kernel::Or3,
                    _ => Kernel::OrN,
                },
                Some(CellSymbol::Xor) => match arity {
                    1 => Kernel::Buf,
                    2 => Kernel::Xor2,
                    3 => Kernel::Xor3,
                    _ => Kernel::XorN,
                },
                Some(CellSymbol::Nand) => match arity {
                    1 => Kernel::Not,
                    2 => Kernel::Nand2,
                    3 => Kernel::Nand3,
                    _ => Kernel::NandN,
                },
                Some(CellSymbol::Nor) => match arity {
                    1 => Kernel::Not,
                    2 => Kernel::Nor2,
                    3 => Kernel::Nor3,
                    _ => Kernel::NorN,
                },
                Some(CellSymbol::Xnor) => match arity {
                    1 => Kernel::Not,
                    2 => Kernel::Xnor2,
                    3 => Kernel::Xnor3,
                    _ => Kernel::XnorN,
                },
                Some(CellSymbol::Maj) => match arity {
                    1 => Kernel::Buf,
                    3 => Kernel::Maj3,
                    _ => Kernel::MajN,
                },
                Some(sym) => {
                    return Err(CoreError::InvalidCell(format!(
                        "cannot simulate {} cells",
                        sym.name()
                    )));
                }
                None => {
                    let cell_type = ctx
                        .try_cell_type(cell.type_id)
                        .ok_or_else(|| CoreError::InvalidCell("unregistered type".to_string()))?;
                    let inner_id = cell_type
                        .subnet
                        .ok_or_else(|| CoreError::InvalidCell(cell_type.name.clone()))?;
                    let inner = ctx.subnet(inner_id);
                    if inner.out_num() != 1 {
                        return Err(CoreError::InvalidCell(format!(
                            "multi-output cell {} is not simulatable",
                            cell_type.name
                        )));
                    }
                    Kernel::Nested(Box::new(Simulator::new(&inner, ctx)?))
                }
            };
            program.push(Command {
                kernel,
                out: i,
                ins,
            });
        }

        Ok(Self {
            program,
            state: vec![0; subnet.size()],
            n_in: subnet.in_num(),
            out_entries,
        })
    }

    /// Number of primary inputs.
    pub fn in_num(&self) -> usize {
        self.n_in
    }

    /// Sets the input chunks and runs the compiled program.
    pub fn simulate(&mut self, values: &[u64]) {
        assert_eq!(values.len(), self.n_in, "one chunk per primary input");
        self.state[..self.n_in].copy_from_slice(values);
        self.run();
    }

    /// Simulates a single input pattern given as packed bits.
    ///
    /// Bit `i` of `pattern` drives input `i`; results are read from bit 0
    /// of the state chunks.
    pub fn simulate_pattern(&mut self, pattern: u64) {
        for i in 0..self.n_in {
            self.state[i] = (pattern >> i) & 1;
        }
        self.run();
    }

    fn run(&mut self) {
        let state = &mut self.state;
        for cmd in self.program.iter_mut() {
            let out = cmd.out;
            let ins = &cmd.ins;
            state[out] = match &mut cmd.kernel {
                Kernel::Zero => 0,
                Kernel::One => u64::MAX,
                Kernel::Buf => value(state, ins[0]),
                Kernel::Not => !value(state, ins[0]),
                Kernel::And2 => value(state, ins[0]) & value(state, ins[1]),
                Kernel::And3 => value(state, ins[0]) & value(state, ins[1]) & value(state, ins[2]),
                Kernel::AndN => ins.iter().fold(u64::MAX, |acc, &l| acc & value(state, l)),
                Kernel::Or2 => value(state, ins[0]) | value(state, ins[1]),
                Kernel::Or3 => value(state, ins[0]) | value(state, ins[1]) | value(state, ins[2]),
                Kernel::OrN => ins.iter().fold(0, |acc, &l| acc | value(state, l)),
                Kernel::Xor2 => value(state, ins[0]) ^ value(state, ins[1]),
                Kernel::Xor3 => value(state, ins[0]) ^ value(state, ins[1]) ^ value(state, ins[2]),
                Kernel::XorN => ins.iter().fold(0, |acc, &l| acc ^ value(state, l)),
                Kernel::Nand2 => !(value(state, ins[0]) & value(state, ins[1])),
                Kernel::Nand3 => {
                    !(value(state, ins[0]) & value(state, ins[1]) & value(state, ins[2]))
                }
                Kernel::NandN => !ins.iter().fold(u64::MAX, |acc, &l| acc & value(state, l)),
                Kernel::Nor2 => !(value(state, ins[0]) | value(state, ins[1])),
                Kernel::Nor3 => {
                    !(value(state, ins[0]) | value(state, ins[1]) | value(state, ins[2]))
                }
                Kernel::NorN => !ins.iter().fold(0, |acc, &l| acc | value(state, l)),
                Kernel::Xnor2 => !(value(state, ins[0]) ^ value(state, ins[1])),
                Kernel::Xnor3 => {
                    !(value(state, ins[0]) ^ value(state, ins[1]) ^ value(state, ins[2]))
                }
                Kernel::XnorN => !ins.iter().fold(0, |acc, &l| acc ^ value(state, l)),
                Kernel::Maj3 => {
                    let x = value(state, ins[0]);
                    let y = value(state, ins[1]);
                    let z = value(state, ins[2]);
                    (x & y) | (x & z) | (y & z)
                }
                Kernel::MajN => majority_n(state, ins),
                Kernel::Nested(inner) => {
                    let inputs: Vec<u64> = ins.iter().map(|&l| value(state, l)).collect();
                    inner.simulate(&inputs);
                    inner.output(0)
                }
            };
        }
    }

    /// The state chunk of entry `i`.
    pub fn value(&self, i: usize) -> u64 {
        self.state[i]
    }

    /// The state chunk of the `k`-th primary output.
    pub fn output(&self, k: usize) -> u64 {
        self.state[self.out_entries[k]]
    }

    /// The full simulation state.
    pub fn state(&self) -> &[u64] {
        &self.state
    }
}

fn value(state: &[u64], link: Link) -> u64 {
    let chunk = state[link.index()];
    if link.inv {
        !chunk
    } else {
        chunk
    }
}

fn majority_n(state: &[u64], ins: &[Link]) -> u64 {
    let threshold = ins.len() / 2;
    let mut result = 0u64;
    for bit in 0..DATA_CHUNK_BITS {
        let weight: usize = ins
            .iter()
            .map(|&l| ((value(state, l) >> bit) & 1) as usize)
            .sum();
        if weight > threshold {
            result |= 1 << bit;
        }
    }
    result
}
