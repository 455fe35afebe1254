//! Ticket workflows on top of a [`Backend`](crate::backend::Backend):
//! fetch the collection, mutate it, and hold the board's list state.

pub mod board;
pub mod dispatcher;
pub mod fetcher;

pub use board::TicketBoard;
pub use dispatcher::TicketDispatcher;
pub use fetcher::{CollectionState, Fetcher};
