pub mod child_views;
pub mod element_filter;
pub mod format;
pub mod query_translator;

pub use child_views::{ChildViewEdit, DOCUMENT_STEREOTYPE, VIEW_STEREOTYPE};
pub use element_filter::filter_elements;
pub use query_translator::{classify, translate, QueryShape};
