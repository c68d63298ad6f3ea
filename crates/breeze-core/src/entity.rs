//! # Entities and Parent/Child Attachment
//!
//! The identity contract every repository entity fulfils, and the pure part
//! of eager relation loading: indexing a batch of parents by id and routing
//! fetched children to the right parent.
//!
//! ## Attachment Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    One-Hop Batch Attachment                             │
//! │                                                                         │
//! │  parents: [P{id:1}, P{id:2}, P{id:7}]                                  │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  ParentIndex::build  →  ids [1, 2, 7]   positions {1→0, 2→1, 7→2}      │
//! │       │                                                                 │
//! │       │  (breeze-db runs ONE query: fk IN (1, 2, 7))                   │
//! │       ▼                                                                 │
//! │  children: [C{fk:2}, C{fk:1}, C{fk:9}, C{fk:2}]                        │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  attach_children                                                       │
//! │    C{fk:2} → parents[1]                                                │
//! │    C{fk:1} → parents[0]                                                │
//! │    C{fk:9} → dropped (no parent 9 in batch)                            │
//! │    C{fk:2} → parents[1]                                                │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use std::collections::HashMap;

/// A record type with an integer primary key.
///
/// ## Example
/// ```rust
/// use breeze_core::Entity;
///
/// struct Parent {
///     id: i64,
///     name: String,
/// }
///
/// impl Entity for Parent {
///     fn id(&self) -> i64 {
///         self.id
///     }
/// }
/// ```
pub trait Entity {
    /// The primary-key value of this record.
    fn id(&self) -> i64;
}

// =============================================================================
// Parent Index
// =============================================================================

/// Maps parent ids to their position in a batch.
#[derive(Debug, Clone, Default)]
pub struct ParentIndex {
    /// Distinct ids, in first-seen order.
    ids: Vec<i64>,
    positions: HashMap<i64, usize>,
    /// Ids that appeared more than once in the batch, each listed once.
    duplicates: Vec<i64>,
}

impl ParentIndex {
    /// Indexes a batch of parents.
    ///
    /// Ids are expected to be unique within a batch. When they are not, the
    /// first parent with that id receives the children and the id is
    /// reported by [`duplicates`](Self::duplicates).
    pub fn build<P: Entity>(parents: &[P]) -> Self {
        let mut index = ParentIndex {
            ids: Vec::with_capacity(parents.len()),
            positions: HashMap::with_capacity(parents.len()),
            duplicates: Vec::new(),
        };

        for (position, parent) in parents.iter().enumerate() {
            let id = parent.id();
            if index.positions.contains_key(&id) {
                if !index.duplicates.contains(&id) {
                    index.duplicates.push(id);
                }
                continue;
            }
            index.positions.insert(id, position);
            index.ids.push(id);
        }

        index
    }

    /// Distinct parent ids, in batch order.
    pub fn ids(&self) -> &[i64] {
        &self.ids
    }

    pub fn position(&self, id: i64) -> Option<usize> {
        self.positions.get(&id).copied()
    }

    pub fn duplicates(&self) -> &[i64] {
        &self.duplicates
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }
}

// =============================================================================
// Attachment
// =============================================================================

/// Outcome of one [`attach_children`] pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct AttachStats {
    /// Children pushed onto a parent.
    pub attached: usize,
    /// Children whose parent id is not in the batch.
    pub orphaned: usize,
}

/// Routes each child to the parent whose id matches `parent_id_of(child)`.
///
/// Children are attached in the order given; unmatched children are dropped.
pub fn attach_children<P, C>(
    parents: &mut [P],
    index: &ParentIndex,
    children: Vec<C>,
    parent_id_of: impl Fn(&C) -> i64,
    attach: impl Fn(&mut P, C),
) -> AttachStats {
    let mut stats = AttachStats::default();

    for child in children {
        match index.position(parent_id_of(&child)) {
            Some(position) => {
                attach(&mut parents[position], child);
                stats.attached += 1;
            }
            None => stats.orphaned += 1,
        }
    }

    stats
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug)]
    struct Parent {
        id: i64,
        children: Vec<Child>,
    }

    impl Entity for Parent {
        fn id(&self) -> i64 {
            self.id
        }
    }

    #[derive(Debug, Clone, PartialEq)]
    struct Child {
        id: i64,
        parent_id: i64,
    }

    fn parents(ids: &[i64]) -> Vec<Parent> {
        ids.iter()
            .map(|&id| Parent {
                id,
                children: Vec::new(),
            })
            .collect()
    }

    fn child(id: i64, parent_id: i64) -> Child {
        Child { id, parent_id }
    }

    #[test]
    fn test_index_keeps_batch_order() {
        let batch = parents(&[7, 1, 3]);
        let index = ParentIndex::build(&batch);

        assert_eq!(index.ids(), &[7, 1, 3]);
        assert_eq!(index.position(7), Some(0));
        assert_eq!(index.position(3), Some(2));
        assert_eq!(index.position(4), None);
        assert_eq!(index.len(), 3);
        assert!(index.duplicates().is_empty());
    }

    #[test]
    fn test_empty_batch() {
        let batch: Vec<Parent> = Vec::new();
        let index = ParentIndex::build(&batch);
        assert!(index.is_empty());
        assert!(index.ids().is_empty());
    }

    #[test]
    fn test_duplicate_ids_first_wins() {
        let batch = parents(&[5, 6, 5]);
        let index = ParentIndex::build(&batch);

        assert_eq!(index.ids(), &[5, 6]);
        assert_eq!(index.position(5), Some(0));
        assert_eq!(index.duplicates(), &[5]);
    }

    #[test]
    fn test_duplicate_reported_once() {
        let batch = parents(&[5, 6, 5, 5, 6, 7]);
        let index = ParentIndex::build(&batch);

        assert_eq!(index.ids(), &[5, 6, 7]);
        assert_eq!(index.duplicates(), &[5, 6]);
    }

    #[test]
    fn test_attach_routes_by_parent_id() {
        let mut batch = parents(&[1, 2]);
        let index = ParentIndex::build(&batch);

        let stats = attach_children(
            &mut batch,
            &index,
            vec![child(10, 2), child(11, 1), child(12, 2)],
            |c| c.parent_id,
            |p, c| p.children.push(c),
        );

        assert_eq!(stats, AttachStats { attached: 3, orphaned: 0 });
        assert_eq!(batch[0].children, vec![child(11, 1)]);
        // Query order is preserved
        assert_eq!(batch[1].children, vec![child(10, 2), child(12, 2)]);
    }

    #[test]
    fn test_attach_drops_orphans() {
        let mut batch = parents(&[1]);
        let index = ParentIndex::build(&batch);

        let stats = attach_children(
            &mut batch,
            &index,
            vec![child(10, 99), child(11, 1)],
            |c| c.parent_id,
            |p, c| p.children.push(c),
        );

        assert_eq!(stats, AttachStats { attached: 1, orphaned: 1 });
        assert_eq!(batch[0].children.len(), 1);
    }
}
