//! Common result and error types for the Tessera toolkit.

/// The standard result type for fallible netlist operations.
///
/// Errors are surfaced as values; an operation that fails leaves the data
/// structure it was called on unchanged.
pub type CoreResult<T> = Result<T, CoreError>;

/// The exhaustive set of error kinds raised by the netlist core.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CoreError {
    /// The cell type is negative, reserved, or unsupported in canonical form.
    #[error("invalid cell type: {0}")]
    InvalidCell(String),

    /// A link refers to an entry index or output port that does not exist.
    #[error("bad link: index {idx} out of range for arena of size {size}")]
    BadLink {
        /// Offending entry index.
        idx: usize,
        /// Arena size at the time of the failure.
        size: usize,
    },

    /// A rewrite mapping would introduce a combinational cycle.
    #[error("replacement would introduce a cycle")]
    CycleDetected,

    /// `add_cell_tree` was called on a symbol that cannot be regrouped.
    #[error("cell symbol {0} is not regroupable")]
    NotRegroupable(String),

    /// `make` was called on a builder with an empty output zone.
    #[error("subnet has no outputs")]
    NoOutput,

    /// Two subnets cannot be mitered because their port counts differ.
    #[error("nets are not miterable: {0}")]
    NotMiterable(String),

    /// The CNF encoder met a symbol it cannot encode.
    #[error("CNF encoder does not support cell type {0}")]
    EncoderUnsupported(String),

    /// A budgeted SAT solve exceeded its conflict/propagation limits.
    #[error("SAT solve exceeded its budget")]
    SolverTimeout,

    /// The technology library has no candidate cell for a cut.
    #[error("no library candidate for cut at entry {0}")]
    LibraryMiss(usize),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_formats() {
        let err = CoreError::BadLink { idx: 7, size: 3 };
        assert_eq!(
            format!("{err}"),
            "bad link: index 7 out of range for arena of size 3"
        );
        assert_eq!(
            format!("{}", CoreError::InvalidCell("NOT".into())),
            "invalid cell type: NOT"
        );
    }

    #[test]
    fn ok_and_err_paths() {
        let ok: CoreResult<u32> = Ok(5);
        assert_eq!(ok.ok(), Some(5));
        let err: CoreResult<u32> = Err(CoreError::CycleDetected);
        assert_eq!(err.err(), Some(CoreError::CycleDetected));
    }
}
