//!
//! # Dependency Ordering
//!

// Std-lib
use std::collections::HashSet;

///
/// # Dependency-Ordering Trait
///
/// Hierarchical layouts form a graph in which cells depend on the cells they instantiate.
/// Writers and other processors commonly need these cells ordered leaves-first.
///
/// Implementers provide `process`, which pushes each (direct) dependency of `item` onto the orderer,
/// and `fail`, which produces an error naming an item found on a cycle.
/// `Item`s are commonly keys or handles into an arena owned by the implementer.
///
/// ```text
/// impl DepOrder for MyLibrary {
///     type Item = CellId;
///     type Error = MyError;
///     fn process(&self, item: &CellId, orderer: &mut DepOrderer<Self>) -> Result<(), MyError> {
///         for dep in self.cell(*item).dependencies() {
///             orderer.push(self, &dep)?;
///         }
///         Ok(())
///     }
///     fn fail(&self, item: &CellId) -> MyError {
///         MyError::Cycle(*item)
///     }
/// }
/// ```
///
pub trait DepOrder: Sized {
    /// Item Type. Typically keys or handles to the nodes in the dependency graph.
    type Item: Clone + Eq + std::hash::Hash;
    /// Error Type
    type Error;

    /// Dependency-order all entries in slice `items`, and everything they depend upon
    fn order(&self, items: &[Self::Item]) -> Result<Vec<Self::Item>, Self::Error> {
        DepOrderer::order(self, items)
    }

    /// Push each direct dependency of `item` onto `orderer`
    fn process(&self, item: &Self::Item, orderer: &mut DepOrderer<Self>) -> Result<(), Self::Error>;
    /// Create the error for a cycle through `item`
    fn fail(&self, item: &Self::Item) -> Self::Error;
}

/// # Dependency Order Helper
/// Public solely for use in the call-signature of [DepOrder::process].
pub struct DepOrderer<P: DepOrder> {
    /// Ordered, completed items
    stack: Vec<P::Item>,
    /// Completed items, for quick membership tests
    seen: HashSet<P::Item>,
    /// Items with an open frame on the traversal stack
    pending: HashSet<P::Item>,
}
impl<P: DepOrder> DepOrderer<P> {
    /// Dependency-order all entries in slice `items`
    pub fn order(graph: &P, items: &[P::Item]) -> Result<Vec<P::Item>, P::Error> {
        let len = items.len();
        let mut this = Self {
            stack: Vec::with_capacity(len),
            seen: HashSet::with_capacity(len),
            pending: HashSet::new(),
        };
        for item in items.iter() {
            this.push(graph, item)?;
        }
        Ok(this.stack)
    }
    /// Push `item`'s dependencies, and then itself, onto the stack
    pub fn push(&mut self, graph: &P, item: &P::Item) -> Result<(), P::Error> {
        if self.seen.contains(item) {
            return Ok(());
        }
        if !self.pending.insert(item.clone()) {
            return Err(graph.fail(item));
        }
        graph.process(item, self)?;
        self.pending.remove(item);
        self.seen.insert(item.clone());
        self.stack.push(item.clone());
        Ok(())
    }
}
