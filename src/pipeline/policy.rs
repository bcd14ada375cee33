//! Insertion policy
//!
//! Segments always sit in the layout's declared order. Enabling a segment
//! splices it right after the closest upstream segment that is actually in
//! the pipeline, or at the head when there is none. Whether a neighbour is
//! "in the pipeline" is decided by the caller's `is_spliced` predicate, so
//! segments that are enabled but not installed never act as anchors.

use crate::effects::{ChainLayout, SegmentKind};
use crate::error::{PulseFxError, Result};

/// Where a segment goes when it is spliced in
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SplicePlan {
    /// At the head of the effects chain
    Prepend,
    /// Right after the given, already spliced segment
    InsertAfter(SegmentKind),
}

/// Closest upstream segment of `kind` that is spliced
pub fn upstream_anchor<F>(layout: ChainLayout, kind: SegmentKind, is_spliced: F) -> Option<SegmentKind>
where
    F: Fn(SegmentKind) -> bool,
{
    let position = layout.position(kind)?;
    layout.order()[..position]
        .iter()
        .rev()
        .copied()
        .find(|k| is_spliced(*k))
}

/// Decide where `kind` is spliced in `layout`
pub fn plan_insertion<F>(layout: ChainLayout, kind: SegmentKind, is_spliced: F) -> Result<SplicePlan>
where
    F: Fn(SegmentKind) -> bool,
{
    if !layout.contains(kind) {
        return Err(PulseFxError::SegmentNotInLayout {
            segment: kind.to_string(),
            layout: layout.to_string(),
        });
    }

    Ok(match upstream_anchor(layout, kind, is_spliced) {
        Some(anchor) => SplicePlan::InsertAfter(anchor),
        None => SplicePlan::Prepend,
    })
}
