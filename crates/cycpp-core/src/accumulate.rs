//! Pass 2: build the class table from preprocessed source.

use tracing::info;

use crate::chain::Machine;
use crate::error::Result;
use crate::filters::accumulator_chain;
use crate::segment::Segmenter;
use crate::table::ClassTable;

/// Run every statement of `canon` through the pass 2 chain.
pub fn accumulate_state(canon: &str) -> Result<ClassTable> {
    let mut chain = accumulator_chain();
    let mut machine = Machine::accumulator();
    let mut statements = 0usize;
    for stmt in Segmenter::new(canon) {
        chain.feed(&stmt, &mut machine)?;
        statements += 1;
    }
    info!(
        statements,
        classes = machine.table.class_count(),
        annotated = machine.table.len(),
        "accumulated class table"
    );
    Ok(machine.table)
}
