//! Reference model for reply ordering.
//!
//! The model is deliberately naive: it tracks request ids only and states the
//! release rules directly, without the handler's queue or actions. Tests feed
//! the same [`ModelOp`] sequence to the model and to the real
//! `RequestHandler` and compare the release order.

mod operation;
mod ordering;

pub use operation::ModelOp;
pub use ordering::OrderingModel;
