//! Builds the final attribute list of a record.
//!
//! The handler chain is walked newest to oldest while attributes are only
//! ever prepended. One linear pass therefore yields siblings in call order
//! (oldest first) and nests everything added after a `with_group` inside
//! that group.

use crate::attr::Attr;
use crate::chain::{Chain, Scope};
use std::collections::BTreeMap;

/// Context attributes waiting for their group, consumed at most once.
struct Pending {
    attrs: Vec<Attr>,
    used: bool,
}

/// Merge chain scopes, context attributes and record attributes.
///
/// - `group_attrs`: context attributes keyed by the group they belong to.
///   Each entry goes into the innermost matching group of the chain. Entries
///   whose group is never opened end up at the root, in ascending group name
///   order.
/// - `prepended`: top-level extractor outputs in registration order; the
///   first one ends up at the very front.
/// - `record_attrs`: the record's own attributes, oldest first.
pub fn compose(
    chain: &Chain,
    group_attrs: BTreeMap<String, Vec<Attr>>,
    prepended: Vec<Vec<Attr>>,
    record_attrs: Vec<Attr>,
) -> Vec<Attr> {
    let mut pending: BTreeMap<String, Pending> = group_attrs
        .into_iter()
        .map(|(group, attrs)| (group, Pending { attrs, used: false }))
        .collect();

    // Built back to front: prepending is a push of the reversed slice, and
    // the buffer is flipped once per group boundary and once at the end.
    let mut rev = record_attrs;
    rev.reverse();

    for scope in chain.iter() {
        match scope {
            Scope::Attrs(scoped) => {
                rev.extend(scoped.iter().rev().cloned());
            }
            Scope::Group(name) => {
                if let Some(entry) = pending.get_mut(name) {
                    if !entry.used {
                        entry.used = true;
                        rev.extend(std::mem::take(&mut entry.attrs).into_iter().rev());
                    }
                }
                rev.reverse();
                rev = vec![Attr::group(name.clone(), rev)];
            }
        }
    }

    // Reverse so the smallest group name ends up first.
    for entry in pending.into_values().rev() {
        if !entry.used {
            rev.extend(entry.attrs.into_iter().rev());
        }
    }

    for front in prepended.into_iter().rev() {
        rev.extend(front.into_iter().rev());
    }

    rev.reverse();
    rev
}

/// Apply only the chain's scoping to `record_attrs`.
pub fn resolve(chain: &Chain, record_attrs: Vec<Attr>) -> Vec<Attr> {
    compose(chain, BTreeMap::new(), Vec::new(), record_attrs)
}
