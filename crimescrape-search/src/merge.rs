//! Folding a module's sub-search fragments into its single result.
//!
//! A module may query several lists on the same site (red and UN notices,
//! most-wanted and fugitives) and is allowed to return only one
//! [`SourceResult`]. [`merge`] combines the fragments with plain
//! dictionary-update semantics; [`merge_escalating`] keeps the most severe
//! risk and unions charges instead.

use crate::types::SourceResult;

/// Merge fragments in order, later fragments winning on collision.
///
/// Notice maps are unioned by key; a notice key present in several
/// fragments takes the value from the last one. The risk is the last
/// fragment's risk. Returns `None` for an empty sequence.
pub fn merge<I>(fragments: I) -> Option<SourceResult>
where
    I: IntoIterator<Item = SourceResult>,
{
    fragments.into_iter().reduce(|mut acc, next| {
        acc.risk = next.risk;
        acc.notices.extend(next.notices);
        acc
    })
}

/// Merge fragments keeping the highest risk and combining colliding notices.
///
/// For a notice key present in several fragments, charges are concatenated
/// with order-preserving de-duplication and a later non-empty `id` replaces
/// an earlier one.
pub fn merge_escalating<I>(fragments: I) -> Option<SourceResult>
where
    I: IntoIterator<Item = SourceResult>,
{
    fragments.into_iter().reduce(|mut acc, next| {
        acc.risk = acc.risk.max(next.risk);
        for (key, notice) in next.notices {
            match acc.notices.get_mut(&key) {
                Some(existing) => {
                    if !notice.id.is_empty() {
                        existing.id = notice.id;
                    }
                    for charge in notice.charges {
                        if !existing.charges.contains(&charge) {
                            existing.charges.push(charge);
                        }
                    }
                }
                None => {
                    acc.notices.insert(key, notice);
                }
            }
        }
        acc
    })
}
