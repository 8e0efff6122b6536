//! Request and response types shared across handlers.

mod pagination;
mod response;

pub use pagination::{
    Paginated, PaginatedTransactions, PaginatedUsers, PaginationMeta, PaginationParams,
};
pub use response::{Created, MessageResponse, NoContent};
