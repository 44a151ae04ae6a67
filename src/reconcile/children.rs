//! Keyed child-list reconciliation.
//!
//! Matches the previous and next child lists of one parent and drives the
//! per-child reconciler with correct insertion anchors:
//!
//! - Keyed children match the previous child with the same key, wherever it
//!   sits. Keys are compared by value and never across nesting levels.
//! - Unkeyed children fall back to the unconsumed unkeyed previous child at
//!   the same index, if any.
//! - A duplicated key among next siblings is a diagnostic; later occurrences
//!   are demoted to unkeyed.
//! - Matched children that survive in place are never detached. Reorders use
//!   one `move_child` per displaced node, walking an insertion cursor from
//!   the left.
//!
//! The retained child list mirrors host sibling order at all times, so the
//! anchor for any insert or move is the first live handle at or after the
//! cursor.

use rustc_hash::{FxHashMap, FxHashSet};
use smallvec::SmallVec;

use super::{Ctx, MountId, SyncReport, Synchronizer};
use crate::adapter::HostAdapter;
use crate::diagnostics::Phase;
use crate::error::SyncError;
use crate::types::Key;
use crate::vnode::VNode;

impl<A: HostAdapter> Synchronizer<A> {
    /// Insert a fresh child list in order, checking key uniqueness the same
    /// way an update pass does. Duplicates are a diagnostic; insertion order
    /// is unaffected (everything is new, so demotion changes nothing here).
    pub(crate) fn insert_children<'a>(
        &mut self,
        children: &'a [VNode],
        parent: &A::Handle,
        ctx: Ctx<'a>,
        report: &mut SyncReport,
    ) -> Result<SmallVec<[MountId; 8]>, SyncError<A::Error>> {
        let mut seen: FxHashSet<&Key> = FxHashSet::default();
        let mut mounts: SmallVec<[MountId; 8]> = SmallVec::with_capacity(children.len());
        for (i, child) in children.iter().enumerate() {
            if let Some(key) = &child.key {
                if !seen.insert(key) {
                    self.diag(
                        Phase::Children,
                        child,
                        i,
                        format!("duplicate key {key} among siblings, treating as unkeyed"),
                    );
                }
            }
            let id = self.insert_node(child, parent, None, ctx, i, false, report)?;
            mounts.push(id);
        }
        Ok(mounts)
    }

    pub(crate) fn reconcile_children<'a>(
        &mut self,
        prev_children: &[VNode],
        next_children: &'a [VNode],
        parent_id: MountId,
        parent: &A::Handle,
        ctx: Ctx<'a>,
        report: &mut SyncReport,
    ) -> Result<(), SyncError<A::Error>> {
        let prev_mounts: Vec<MountId> = self
            .mounts
            .get(parent_id)
            .map(|m| m.children.to_vec())
            .unwrap_or_default();

        // First occurrence wins when previous siblings share a key.
        let mut keyed: FxHashMap<&Key, usize> = FxHashMap::default();
        for (j, child) in prev_children.iter().enumerate() {
            if let Some(key) = &child.key {
                keyed.entry(key).or_insert(j);
            }
        }

        let mut consumed = vec![false; prev_children.len()];
        let mut seen: FxHashSet<&Key> = FxHashSet::default();

        // Mirror of host sibling order; entries at `cursor..` are not yet
        // placed for this pass.
        let mut working: Vec<MountId> = prev_mounts.clone();
        let mut cursor = 0usize;

        for (pos, next_child) in next_children.iter().enumerate() {
            let mut effective_key = next_child.key.as_ref();
            if let Some(key) = effective_key {
                if !seen.insert(key) {
                    self.diag(
                        Phase::Children,
                        next_child,
                        pos,
                        format!("duplicate key {key} among siblings, treating as unkeyed"),
                    );
                    effective_key = None;
                }
            }

            let matched = match effective_key {
                Some(key) => keyed.get(key).copied().filter(|&j| !consumed[j]),
                // Positional fallback applies to unkeyed children only, and
                // never steals a keyed previous child.
                None => (pos < prev_children.len()
                    && !consumed[pos]
                    && prev_children[pos].key.is_none())
                .then_some(pos),
            };

            let marked = ctx.exclude_marked && next_child.is_skipped();

            let Some(j) = matched else {
                // Fresh position: insert before the first unplaced live
                // sibling. Overlay subtrees get a dead placeholder so sibling
                // bookkeeping stays aligned for the overlay pass.
                let anchor = self.first_live_handle(&working[cursor.min(working.len())..]);
                let id =
                    self.insert_node(next_child, parent, anchor.as_ref(), ctx, pos, false, report)?;
                let at = cursor.min(working.len());
                working.insert(at, id);
                cursor += 1;
                continue;
            };

            consumed[j] = true;
            let Some(&id) = prev_mounts.get(j) else {
                // Previous child with no retained mount: insert fresh.
                let anchor = self.first_live_handle(&working[cursor.min(working.len())..]);
                let new_id =
                    self.insert_node(next_child, parent, anchor.as_ref(), ctx, pos, false, report)?;
                let at = cursor.min(working.len());
                working.insert(at, new_id);
                cursor += 1;
                continue;
            };

            if marked {
                // Matched overlay subtree in an excluding pass: leave it
                // exactly where it is, in the host and in the bookkeeping.
                if working.get(cursor) == Some(&id) {
                    cursor += 1;
                }
                continue;
            }

            let cur_pos = working.iter().position(|&x| x == id);
            // Anchor for a move or replacement, excluding the node itself.
            let anchor = working[cursor.min(working.len())..]
                .iter()
                .copied()
                .filter(|&x| x != id)
                .find_map(|x| self.handle_of(x));

            let outcome = self.reconcile_node(
                Some(&prev_children[j]),
                Some(id),
                Some(next_child),
                parent,
                anchor.as_ref(),
                ctx,
                pos,
                false,
                report,
            )?;
            let Some(new_id) = outcome else {
                if let Some(p) = cur_pos {
                    working.remove(p);
                }
                continue;
            };

            match cur_pos {
                Some(p) => {
                    working.remove(p);
                    let at = cursor.min(working.len());
                    working.insert(at, new_id);
                    // A replacement was already inserted at the anchor; only
                    // a surviving node needs a host move.
                    if p != cursor && new_id == id {
                        if let Some(handle) = self.handle_of(new_id) {
                            match self.adapter.move_child(parent, &handle, anchor.as_ref()) {
                                Ok(()) => report.nodes_moved += 1,
                                Err(e) => self.diag(
                                    Phase::Children,
                                    next_child,
                                    pos,
                                    format!("failed to move node: {e}"),
                                ),
                            }
                        }
                    }
                }
                None => {
                    let at = cursor.min(working.len());
                    working.insert(at, new_id);
                }
            }
            cursor += 1;
        }

        // Previous children nothing matched are removed, except overlay
        // subtrees in an excluding pass, which stay for the overlay pass.
        for (j, prev_child) in prev_children.iter().enumerate() {
            if consumed[j] {
                continue;
            }
            let Some(&id) = prev_mounts.get(j) else {
                continue;
            };
            if ctx.exclude_marked && prev_child.is_skipped() {
                continue;
            }
            if let Some(p) = working.iter().position(|&x| x == id) {
                working.remove(p);
            }
            self.remove_mount(id, Some(prev_child), j, report);
        }

        // Retained mounts beyond the previous snapshot have unknown content.
        // Dropped outside excluding passes; an excluding pass leaves them in
        // case they belong to the overlay pass.
        if !ctx.exclude_marked {
            for &id in prev_mounts.iter().skip(prev_children.len()) {
                if let Some(p) = working.iter().position(|&x| x == id) {
                    working.remove(p);
                    self.remove_mount(id, None, prev_children.len(), report);
                }
            }
        }

        if let Some(entry) = self.mounts.get_mut(parent_id) {
            entry.children = working.into();
        }
        Ok(())
    }
}
