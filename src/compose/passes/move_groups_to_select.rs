//! Pass 3: every agg-layer group also appears in the uppermost layer's
//! select list so grouped columns survive into the final output.

use crate::smq::{LayerId, QueryIr};

pub fn run(ir: &mut QueryIr) {
    let uppermost = ir.uppermost();
    let groups = ir
        .body(&LayerId::Agg)
        .map(|body| body.groups.clone())
        .unwrap_or_default();

    let body = ir.body_mut(&uppermost);
    for group in groups {
        body.append_metric(group);
    }
}
