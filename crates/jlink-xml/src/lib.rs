#![cfg_attr(docsrs, feature(doc_cfg))]
//! Load, merge and write SEGGER device-definition XML (`JLinkDevices.xml`)
//! using quick-xml.
//!
//! ```rust
//! use jlink_xml::{device_name, merge_registry, Document, UpdatePlacement};
//!
//! let mut target = Document::parse(r#"<DataBase><Device Name="STM32F1"/></DataBase>"#)?;
//! let source = Document::parse(
//!     r#"<DataBase><Device Name="STM32F1"/><Device Name="STM32F4"/></DataBase>"#,
//! )?;
//! let report = merge_registry(&mut target.root, source.root, UpdatePlacement::Append);
//! assert_eq!((report.added(), report.updated()), (1, 1));
//! let names: Vec<_> = target.root.elements().filter_map(device_name).collect();
//! assert_eq!(names, ["STM32F1", "STM32F4"]);
//! # Ok::<(), jlink_xml::XmlError>(())
//! ```

mod device;
mod encoding;
mod merge;
mod tree;

use thiserror::Error;

pub use device::{device_name, registry_names};
pub use merge::{merge_registry, MergeAction, MergeReport, UpdatePlacement};
pub use tree::{Document, Element, XmlNode};

#[derive(Debug, Error)]
pub enum XmlError {
    /// The underlying reader or writer rejected the input.
    #[error("xml: {0}")]
    Xml(String),
    /// Well-formed on the token level but not a usable document.
    #[error("invalid document: {0}")]
    Invalid(String),
}
