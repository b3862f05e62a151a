//! Core types for the Prediction Market Terminal sync engine
//!
//! This crate defines the shared data structures used across the terminal,
//! including book keys and price levels, orders and fills, positions, the
//! normalized feed protocol, and the error taxonomy.

pub mod error;
pub mod market;
pub mod message;
pub mod order;
pub mod position;

pub use error::{TerminalError, TerminalResult};
pub use market::{
    BookDepth, BookKey, BookSide, DepthLevel, OrderBookSnapshot, Outcome, PriceLevel, TopOfBook,
};
pub use message::{ClientFrame, ConnectionState, FeedMessage, OrderRequest};
pub use order::{
    Fill, FillKey, FillReport, LocalOrderId, Order, OrderSide, OrderSpec, OrderStatus, OrderType,
};
pub use position::{MarkedPosition, Portfolio, Position};
