//! Merging same-target sheets into one logical table.

use crate::error::{ExportError, Result};
use crate::sheet::SheetResult;

/// Merge `src` into `dst`. The first sheet assigned to a target fixes the
/// container kind; keyed tables union by key with the later sheet winning
/// collisions, sequences concatenate in processing order. Mixing kinds is
/// fatal for the export run.
pub fn merge_results(dst: &mut SheetResult, src: SheetResult, target: &str) -> Result<()> {
    match (dst, src) {
        (
            SheetResult::Keyed {
                kind: dst_kind,
                rows: dst_rows,
            },
            SheetResult::Keyed {
                kind: src_kind,
                rows: src_rows,
            },
        ) => {
            if *dst_kind != src_kind {
                return Err(ExportError::MergeKind {
                    target: target.to_string(),
                });
            }
            for (key, value) in src_rows {
                dst_rows.insert(key, value);
            }
            Ok(())
        }
        (SheetResult::Ordered(dst_rows), SheetResult::Ordered(src_rows)) => {
            dst_rows.extend(src_rows);
            Ok(())
        }
        _ => Err(ExportError::MergeKind {
            target: target.to_string(),
        }),
    }
}
