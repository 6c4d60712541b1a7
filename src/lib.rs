//! Read access to Gentoo `metadata.xml` files.
//!
//! ```no_run
//! use pkgmetadata_rs::MetaDataXML;
//!
//! let md = MetaDataXML::new("/var/db/repos/gentoo/app-accessibility/espeak-ng/metadata.xml")?;
//! for maint in md.maintainers() {
//!     println!("{}", maint);
//! }
//! for flag in md.use_flags() {
//!     println!("{}", flag);
//! }
//! # Ok::<(), pkgmetadata_rs::MetadataError>(())
//! ```

pub mod exception;
pub mod xml;

pub use exception::MetadataError;
pub use xml::metadata::{Description, Maintainer, MetaDataXML, RemoteId, Upstream, UpstreamDoc, Useflag};
pub use xml::tree::ParseLimits;
