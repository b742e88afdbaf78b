//!
//! # Cell-Reference Links
//!
//! Resolution of struct-references by name into [GdsStructId] handles,
//! and the reverse "referenced-by" edges of the resulting graph.
//!

// Std-Lib Imports
use std::collections::HashMap;

// Crates.io
use log::{debug, info, warn};

// Workspace Imports
use gdstreeutils::{DepOrder, DepOrderer};

// Local Imports
use crate::data::*;

/// # Link-Resolution Summary
/// Counts of references by outcome, from [GdsLibrary::build_cell_links].
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct GdsLinkReport {
    /// References bound to a struct
    pub resolved: usize,
    /// References naming no struct in the library, and kept
    pub unresolved: usize,
    /// References naming no struct in the library, and removed
    pub removed: usize,
}

impl GdsLibrary {
    /// Resolve every [GdsStructRef] and [GdsArrayRef] to the first struct of its name,
    /// and record each referencing struct in its target's `referenced_by` set.
    ///
    /// All prior links are cleared first, so repeated calls produce the same result.
    /// References to absent structs are left unresolved,
    /// or if `delete_dirty_links` is set, removed from their parent struct.
    pub fn build_cell_links(&mut self, delete_dirty_links: bool) -> GdsLinkReport {
        self.clear_links();

        // Map names to handles, keeping the first of any duplicates
        let mut ids: HashMap<String, GdsStructId> = HashMap::with_capacity(self.structs.len());
        for (idx, strukt) in self.structs.iter().enumerate() {
            ids.entry(strukt.name.clone()).or_insert(GdsStructId(idx));
        }

        let mut report = GdsLinkReport::default();
        let mut edges: Vec<(GdsStructId, GdsStructId)> = Vec::new();
        for (idx, strukt) in self.structs.iter_mut().enumerate() {
            let parent = GdsStructId(idx);
            let strukt_name = &strukt.name;
            strukt.elems.retain_mut(|elem| {
                let (name, target) = match elem {
                    GdsElement::GdsStructRef(r) => (&r.name, &mut r.target),
                    GdsElement::GdsArrayRef(r) => (&r.name, &mut r.target),
                    _ => return true,
                };
                match ids.get(name.as_str()) {
                    Some(id) => {
                        *target = Some(*id);
                        edges.push((*id, parent));
                        report.resolved += 1;
                        true
                    }
                    None if delete_dirty_links => {
                        warn!(
                            "Removing reference to missing struct `{}` from `{}`",
                            name, strukt_name
                        );
                        report.removed += 1;
                        false
                    }
                    None => {
                        warn!(
                            "Unresolved reference to struct `{}` in `{}`",
                            name, strukt_name
                        );
                        report.unresolved += 1;
                        true
                    }
                }
            });
        }
        for (target, parent) in edges {
            self[target].referenced_by.insert(parent);
        }
        info!(
            "Linked library `{}`: {} resolved, {} unresolved, {} removed",
            self.name, report.resolved, report.unresolved, report.removed
        );
        report
    }
    /// Clear all resolved reference targets and `referenced_by` sets
    pub fn clear_links(&mut self) {
        for strukt in self.structs.iter_mut() {
            strukt.referenced_by.clear();
            for elem in strukt.elems.iter_mut() {
                match elem {
                    GdsElement::GdsStructRef(r) => r.target = None,
                    GdsElement::GdsArrayRef(r) => r.target = None,
                    _ => (),
                }
            }
        }
    }
    /// Handles of all structs which no other struct references.
    /// Only meaningful after [GdsLibrary::build_cell_links].
    pub fn top_structs(&self) -> Vec<GdsStructId> {
        self.structs
            .iter()
            .enumerate()
            .filter(|(_, s)| s.referenced_by.is_empty())
            .map(|(idx, _)| GdsStructId(idx))
            .collect()
    }
    /// Order all structs such that each follows every struct it references.
    ///
    /// Follows resolved links, as set by [GdsLibrary::build_cell_links].
    /// Fails with [GdsError::Cycle] if the reference graph is cyclic.
    pub fn dep_order(&self) -> GdsResult<Vec<GdsStructId>> {
        let all: Vec<GdsStructId> = (0..self.structs.len()).map(GdsStructId).collect();
        let order = DepOrderer::order(self, &all)?;
        debug!("Ordered {} structs of library `{}`", order.len(), self.name);
        Ok(order)
    }
}

impl DepOrder for GdsLibrary {
    type Item = GdsStructId;
    type Error = GdsError;

    fn process(&self, item: &GdsStructId, orderer: &mut DepOrderer<Self>) -> GdsResult<()> {
        let strukt = match self.strukt(*item) {
            Some(s) => s,
            None => return Ok(()),
        };
        for elem in strukt.elems.iter() {
            if let Some(target) = elem.target() {
                orderer.push(self, &target)?;
            }
        }
        Ok(())
    }
    fn fail(&self, item: &GdsStructId) -> GdsError {
        let name = match self.strukt(*item) {
            Some(s) => s.name.clone(),
            None => format!("#{}", item.0),
        };
        GdsError::Cycle(name)
    }
}
