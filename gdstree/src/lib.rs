//!
//! # gdstree: GDSII Reader, Writer & Cell Hierarchy
//!
//! GDSII is the IC industry's de facto standard for storing and sharing layout data.
//! gdstree reads and writes GDSII's binary stream format, and resolves the cell hierarchy it describes:
//! which cells instantiate which others, and the bounding boxes that result.
//! Layout data is stored on GDSII's terms, using GDSII's idioms and naming conventions.
//!
//! Layout data is represented in three primary forms:
//!
//! * A short tree with three layers:
//!   * The root is a [GdsLibrary], which primarily consists of a set of cells ([GdsStruct]s), and secondarily a set of metadata.
//!     Each [GdsLibrary] is a universe unto itself, in that it has no mechanisms for comprehending layout cells or data defined outside itself.
//!   * Libraries consist of cell definitions AKA [GdsStruct]s, held in an arena and addressed by [GdsStructId].
//!   * Cells consist of [GdsElement]s, an enumeration which includes individual polygons ([GdsBoundary]),
//!     instances and arrays of other layout cells ([GdsStructRef], [GdsArrayRef]), text ([GdsTextElem]), and a few other geometric elements.
//! * For storage on disk, the [GdsLibrary] tree is flattened to a series of [GdsRecord]s.
//!   These records indicate the beginning, end, and content of each tree-node.
//! * Records are stored on-disk in binary form, each with a size, record-type and datatype header.
//!   These raw bytes are never stored, only generated and consumed on their way into and out of [std::io::Read] and [std::io::Write] objects.
//!
//! References name their target cells. [GdsLibrary::build_cell_links] resolves these names into handles,
//! after which bounding boxes ([GdsBboxer]) and dependency orders ([GdsLibrary::dep_order]) follow the hierarchy.
//!
//! ## Alternate Serialization
//!
//! Each element in the [GdsLibrary] tree is [serde]-serializable,
//! and can be saved to JSON, YAML, or TOML through [gdstreeutils::SerdeFile].
//!
//! ## Usage
//!
//! Creating a new [GdsLibrary] with a cell, and encoding it:
//!
//! ```
//! use gdstree::{GdsBoundary, GdsLibrary, GdsPoint};
//!
//! let mut lib = GdsLibrary::new("mylib");
//! let cell = lib.add("mycell");
//! lib[cell].elems.push(
//!     GdsBoundary {
//!         layer: 1,
//!         datatype: 0,
//!         xy: GdsPoint::vec(&[(0, 0), (10, 0), (10, 10), (0, 10), (0, 0)]),
//!         ..Default::default()
//!     }
//!     .into(),
//! );
//! let bytes = lib.to_bytes().unwrap();
//! let lib2 = GdsLibrary::from_bytes(&bytes).unwrap();
//! assert_eq!(lib2.structs[0].name, "mycell");
//! ```
//!
//! Loading from and saving to disk:
//!
//! ```skip
//! let mut lib = GdsLibrary::load("sample.gds")?;
//! lib.build_cell_links(false);
//! let bbox = lib.bbox("top")?;
//! lib.save("copy.gds")?;
//! ```
//!

pub mod bbox;
pub mod data;
pub mod links;
pub mod read;
pub mod transform;
pub mod write;

pub use bbox::{BoundBox, GdsBboxer};
pub use data::*;
pub use links::GdsLinkReport;
pub use read::{GdsParser, GdsReader};
pub use transform::Transform;
pub use write::{GdsWriter, ToRecords};

#[cfg(test)]
mod tests;
