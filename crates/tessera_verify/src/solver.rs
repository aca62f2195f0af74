//! The SAT-solver boundary.
//!
//! A thin wrapper around batsat that owns a copy of every clause, so the
//! encoded formula can be exported as DIMACS. Gate-encoding helpers emit
//! the standard Tseitin clause patterns used by the subnet encoder.

use batsat::{lbool, SolverInterface};
use std::io::Write;
use tessera_common::{CoreError, CoreResult};

/// SAT variable.
pub type Var = batsat::Var;

/// SAT literal.
pub type Lit = batsat::Lit;

/// An incremental SAT solver with an owned clause store.
pub struct Solver {
    inner: batsat::BasicSolver,
    clauses: Vec<Vec<Lit>>,
    n_vars: usize,
    conf_budget: Option<u64>,
    prop_budget: Option<u64>,
}

impl Default for Solver {
    fn default() -> Self {
        Self::new()
    }
}

impl Solver {
    /// Creates an empty solver.
    pub fn new() -> Self {
        Self {
            inner: batsat::BasicSolver::default(),
            clauses: Vec::new(),
            n_vars: 0,
            conf_budget: None,
            prop_budget: None,
        }
    }

    /// Allocates a fresh variable.
    pub fn new_var(&mut self) -> Var {
        self.n_vars += 1;
        self.inner.new_var_default()
    }

    /// Allocates a fresh positive literal.
    pub fn new_lit(&mut self) -> Lit {
        Lit::new(self.new_var(), true)
    }

    /// Number of allocated variables.
    pub fn num_vars(&self) -> usize {
        self.n_vars
    }

    /// Number of stored clauses.
    pub fn num_clauses(&self) -> usize {
        self.clauses.len()
    }

    /// Adds a clause.
    pub fn add_clause(&mut self, lits: &[Lit]) {
        self.clauses.push(lits.to_vec());
        let mut scratch = lits.to_vec();
        self.inner.add_clause_reuse(&mut scratch);
    }

    /// Encodes `rhs <-> lhs`.
    pub fn encode_buf(&mut self, rhs: Lit, lhs: Lit) {
        self.add_clause(&[!rhs, lhs]);
        self.add_clause(&[rhs, !lhs]);
    }

    /// Encodes `rhs <-> lhs1 & lhs2`.
    pub fn encode_and(&mut self, rhs: Lit, lhs1: Lit, lhs2: Lit) {
        self.add_clause(&[rhs, !lhs1, !lhs2]);
        self.add_clause(&[!rhs, lhs1]);
        self.add_clause(&[!rhs, lhs2]);
    }

    /// Encodes `rhs <-> lhs1 | lhs2`.
    pub fn encode_or(&mut self, rhs: Lit, lhs1: Lit, lhs2: Lit) {
        self.add_clause(&[!rhs, lhs1, lhs2]);
        self.add_clause(&[rhs, !lhs1]);
        self.add_clause(&[rhs, !lhs2]);
    }

    /// Encodes `rhs <-> lhs1 ^ lhs2`.
    pub fn encode_xor(&mut self, rhs: Lit, lhs1: Lit, lhs2: Lit) {
        self.add_clause(&[!rhs, !lhs1, !lhs2]);
        self.add_clause(&[!rhs, lhs1, lhs2]);
        self.add_clause(&[rhs, !lhs1, lhs2]);
        self.add_clause(&[rhs, lhs1, !lhs2]);
    }

    /// Encodes `rhs <-> maj(lhs1, lhs2, lhs3)` via three pair-AND
    /// auxiliaries feeding an OR.
    pub fn encode_maj(&mut self, rhs: Lit, lhs1: Lit, lhs2: Lit, lhs3: Lit) {
        let t1 = self.new_lit();
        let t2 = self.new_lit();
        let t3 = self.new_lit();

        self.add_clause(&[t1, lhs1, lhs2]);
        self.add_clause(&[t2, lhs1, lhs3]);
        self.add_clause(&[t3, lhs2, lhs3]);

        self.add_clause(&[!rhs, t1, t2, t3]);
        self.add_clause(&[rhs, !t1]);
        self.add_clause(&[rhs, !t2]);
        self.add_clause(&[rhs, !t3]);
    }

    /// Sets the conflict/propagation budget for subsequent limited solves.
    pub fn set_budget(&mut self, conflicts: u64, propagations: u64) {
        self.conf_budget = Some(conflicts);
        self.prop_budget = Some(propagations);
    }

    /// Decides satisfiability.
    pub fn solve(&mut self) -> bool {
        self.inner.solve_limited(&[]) == lbool::TRUE
    }

    /// Decides satisfiability under assumptions.
    ///
    /// When a budget is set and the solve spends more conflicts or
    /// propagations than allowed, the answer is discarded and surfaces as
    /// [`CoreError::SolverTimeout`]; the solver state stays intact. An
    /// indeterminate backend answer maps to the same error.
    pub fn solve_with(&mut self, assumptions: &[Lit]) -> CoreResult<bool> {
        let conflicts_before = self.inner.num_conflicts();
        let props_before = self.inner.num_propagations();
        let result = self.inner.solve_limited(assumptions);
        let spent_conflicts = self.inner.num_conflicts() - conflicts_before;
        let spent_props = self.inner.num_propagations() - props_before;
        let blown = self.conf_budget.is_some_and(|b| spent_conflicts > b)
            || self.prop_budget.is_some_and(|b| spent_props > b);
        if blown {
            return Err(CoreError::SolverTimeout);
        }
        if result == lbool::TRUE {
            Ok(true)
        } else if result == lbool::FALSE {
            Ok(false)
        } else {
            Err(CoreError::SolverTimeout)
        }
    }

    /// Clears the solve budget.
    pub fn clear_budget(&mut self) {
        self.conf_budget = None;
        self.prop_budget = None;
    }

    /// The model value of `var` after a satisfiable solve.
    pub fn value(&self, var: Var) -> bool {
        let model = self.inner.get_model();
        model
            .get(var.idx() as usize)
            .copied()
            .map(|v| v == lbool::TRUE)
            .unwrap_or(false)
    }

    /// Writes the stored formula in DIMACS CNF format.
    pub fn dump_dimacs(&self, out: &mut impl Write) -> std::io::Result<()> {
        writeln!(out, "p cnf {} {}", self.n_vars, self.clauses.len())?;
        for clause in &self.clauses {
            for &lit in clause {
                let var = lit.var().idx() as i64 + 1;
                let signed = if lit.sign() { var } else { -var };
                write!(out, "{signed} ")?;
            }
            writeln!(out, "0")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn trivial_sat_and_unsat() {
        let mut solver = Solver::new();
        let a = solver.new_lit();
        solver.add_clause(&[a]);
        assert!(solver.solve());
        assert!(solver.value(a.var()));

        solver.add_clause(&[!a]);
        assert!(!solver.solve());
    }

    #[test]
    fn and_encoding_forces_inputs() {
        let mut solver = Solver::new();
        let y = solver.new_lit();
        let a = solver.new_lit();
        let b = solver.new_lit();
        solver.encode_and(y, a, b);
        solver.add_clause(&[y]);
        assert!(solver.solve());
        assert!(solver.value(a.var()));
        assert!(solver.value(b.var()));
    }

    #[test]
    fn xor_encoding() {
        let mut solver = Solver::new();
        let y = solver.new_lit();
        let a = solver.new_lit();
        let b = solver.new_lit();
        solver.encode_xor(y, a, b);
        // y & a -> b must be false.
        assert!(solver.solve_with(&[y, a]).unwrap());
        assert!(!solver.value(b.var()));
        // y & a & b is contradictory.
        assert!(!solver.solve_with(&[y, a, b]).unwrap());
    }

    #[test]
    fn maj_encoding() {
        let mut solver = Solver::new();
        let y = solver.new_lit();
        let a = solver.new_lit();
        let b = solver.new_lit();
        let c = solver.new_lit();
        solver.encode_maj(y, a, b, c);
        assert!(solver.solve_with(&[a, b, !c]).unwrap());
        assert!(solver.value(y.var()));
        assert!(solver.solve_with(&[a, !b, !c]).unwrap());
        assert!(!solver.value(y.var()));
    }

    #[test]
    fn assumptions_do_not_persist() {
        let mut solver = Solver::new();
        let a = solver.new_lit();
        assert!(solver.solve_with(&[!a]).unwrap());
        assert!(solver.solve_with(&[a]).unwrap());
    }

    #[test]
    fn zero_budget_times_out_hard_instances() {
        let mut solver = Solver::new();
        // A small pigeonhole-flavored instance that needs conflicts.
        let lits: Vec<Lit> = (0..6).map(|_| solver.new_lit()).collect();
        for chunk in lits.chunks(2) {
            solver.add_clause(chunk);
        }
        for i in 0..6 {
            for j in (i + 1)..6 {
                solver.add_clause(&[!lits[i], !lits[j]]);
            }
        }
        solver.set_budget(0, 0);
        // Either the backend answers without spending budget or the check
        // reports a timeout; both leave the solver reusable.
        let constrained = solver.solve_with(&[]);
        solver.clear_budget();
        let unconstrained = solver.solve_with(&[]);
        assert!(unconstrained.is_ok());
        let _ = constrained;
    }

    #[test]
    fn dimacs_dump_format() {
        let mut solver = Solver::new();
        let a = solver.new_lit();
        let b = solver.new_lit();
        solver.add_clause(&[a, !b]);
        let mut buf = Vec::new();
        solver.dump_dimacs(&mut buf).unwrap();
        let text = String::from_utf8(buf).unwrap();
        assert!(text.starts_with("p cnf 2 1"));
        assert!(text.contains("1 -2 0"));
    }
}
