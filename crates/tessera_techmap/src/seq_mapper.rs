//! Sequential cell mapping.
//!
//! Flip-flops and latches do not go through cut covering; they are matched
//! against the library's sequential subsets by symbol family and chosen by
//! strategy.

use crate::library::{CellLibrary, PatternAttr};
use tessera_model::{CellSymbol, CellTypeId};

/// Selection strategy for sequential cells.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Strategy {
    /// Choose the smallest cell.
    Area,
    /// Choose the fastest cell.
    Delay,
}

/// Maps sequential cells onto library cells of the same symbol family.
pub struct SequentialMapper<'l> {
    library: &'l CellLibrary,
    strategy: Strategy,
}

impl<'l> SequentialMapper<'l> {
    /// Creates a sequential mapper over `library`.
    pub fn new(library: &'l CellLibrary, strategy: Strategy) -> Self {
        Self { library, strategy }
    }

    /// Chooses a library cell for the given sequential symbol.
    ///
    /// Returns `None` when the library has no cell of that family; the
    /// caller keeps the generic cell in that case.
    pub fn map_cell(&self, symbol: CellSymbol) -> Option<(CellTypeId, PatternAttr)> {
        let family: &[(CellTypeId, PatternAttr)] = match symbol {
            CellSymbol::Dff => self.library.dff(),
            CellSymbol::DffRs => self.library.dffrs(),
            CellSymbol::Latch | CellSymbol::LatchRs => self.library.latch(),
            _ => return None,
        };
        family
            .iter()
            .min_by(|(_, a), (_, b)| {
                let (ka, kb) = match self.strategy {
                    Strategy::Area => (a.area, b.area),
                    Strategy::Delay => (a.delay, b.delay),
                };
                ka.partial_cmp(&kb).unwrap_or(std::cmp::Ordering::Equal)
            })
            .map(|(id, attr)| (*id, attr.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tessera_model::{CellAttr, CellType, Context};

    fn seq_library(ctx: &Context) -> CellLibrary {
        let dff_small = ctx.register_type(CellType::library_cell(
            "DFF_X1",
            CellSymbol::Dff,
            2,
            None,
            CellAttr {
                area: 4.0,
                delay: 0.9,
                ..CellAttr::default()
            },
        ));
        let dff_fast = ctx.register_type(CellType::library_cell(
            "DFF_X4",
            CellSymbol::Dff,
            2,
            None,
            CellAttr {
                area: 7.0,
                delay: 0.4,
                ..CellAttr::default()
            },
        ));
        CellLibrary::new(ctx, &[], &[dff_small, dff_fast], &[], &[]).unwrap()
    }

    #[test]
    fn area_strategy_picks_smallest() {
        let ctx = Context::new();
        let library = seq_library(&ctx);
        let mapper = SequentialMapper::new(&library, Strategy::Area);
        let (_, attr) = mapper.map_cell(CellSymbol::Dff).unwrap();
        assert_eq!(attr.name, "DFF_X1");
    }

    #[test]
    fn delay_strategy_picks_fastest() {
        let ctx = Context::new();
        let library = seq_library(&ctx);
        let mapper = SequentialMapper::new(&library, Strategy::Delay);
        let (_, attr) = mapper.map_cell(CellSymbol::Dff).unwrap();
        assert_eq!(attr.name, "DFF_X4");
    }

    #[test]
    fn missing_family_returns_none() {
        let ctx = Context::new();
        let library = seq_library(&ctx);
        let mapper = SequentialMapper::new(&library, Strategy::Area);
        assert!(mapper.map_cell(CellSymbol::Latch).is_none());
        assert!(mapper.map_cell(CellSymbol::And).is_none());
    }
}
