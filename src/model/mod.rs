//! Request and result model

mod request;
mod result;

pub use request::{
    Direction, DocSort, Field, SearchRequest, DEEP_PAGE_PARAM, DEFAULT_LIMIT, LAST_KEY_PARAM,
};
pub use result::SearchResult;
