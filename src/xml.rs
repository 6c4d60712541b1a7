// xml.rs -- XML document handling

pub mod metadata;
pub mod tree;
