//! # One-to-Many Relations
//!
//! A [`Relation`] describes one edge from a parent entity to a child table.
//! When a repository holding relations returns parents, each relation issues
//! exactly one query for the whole batch:
//!
//! ```text
//! parents [1, 2, 3]
//!     │
//!     ├── child1 relation:  SELECT ... FROM child1 WHERE parent_id IN (1, 2, 3)
//!     └── child2 relation:  SELECT ... FROM child2 WHERE parent_id IN (1, 2, 3)
//! ```
//!
//! Children are not loaded recursively: the child repository's own
//! relations are never consulted.

use async_trait::async_trait;
use breeze_core::{attach_children, validate_identifier, AttachStats, CoreError, Entity, ParentIndex};

use crate::context::DbContext;
use crate::error::DbResult;
use crate::repository::Repository;

/// An eager one-to-many edge from `P` to `C`.
///
/// ## Example
/// ```rust,ignore
/// let children = Relation::new(
///     "parent_id",
///     child_repo,
///     |child: &Child| child.parent_id,
///     |parent: &mut Parent, child| parent.children.push(child),
/// )?;
/// let parent_repo = parent_repo.with_relation(children);
/// ```
pub struct Relation<P, C> {
    foreign_key: String,
    repository: Repository<C>,
    parent_id_of: fn(&C) -> i64,
    attach: fn(&mut P, C),
}

impl<P, C> Relation<P, C>
where
    C: Entity + Send + Sync + 'static,
{
    pub fn new(
        foreign_key: &str,
        repository: Repository<C>,
        parent_id_of: fn(&C) -> i64,
        attach: fn(&mut P, C),
    ) -> DbResult<Self> {
        validate_identifier("foreign_key", foreign_key).map_err(CoreError::from)?;

        Ok(Relation {
            foreign_key: foreign_key.to_string(),
            repository,
            parent_id_of,
            attach,
        })
    }
}

/// Type-erased relation, so one parent repository can hold relations to
/// different child types.
#[async_trait]
pub trait LoadRelation<P>: Send + Sync {
    fn foreign_key(&self) -> &str;

    /// Fetches the children of every indexed parent and attaches them.
    async fn load(
        &self,
        ctx: &DbContext,
        parents: &mut [P],
        index: &ParentIndex,
    ) -> DbResult<AttachStats>;
}

#[async_trait]
impl<P, C> LoadRelation<P> for Relation<P, C>
where
    P: Send + Sync,
    C: Entity + Send + Sync + 'static,
{
    fn foreign_key(&self) -> &str {
        &self.foreign_key
    }

    async fn load(
        &self,
        ctx: &DbContext,
        parents: &mut [P],
        index: &ParentIndex,
    ) -> DbResult<AttachStats> {
        let condition = self
            .repository
            .templates()
            .column(&self.foreign_key)
            .is_in(index.ids().iter().copied());

        let children = self.repository.fetch_by(ctx, condition).await?;
        Ok(attach_children(
            parents,
            index,
            children,
            self.parent_id_of,
            self.attach,
        ))
    }
}
