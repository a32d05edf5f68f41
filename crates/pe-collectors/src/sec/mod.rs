//! The three SEC EDGAR collectors (§4.3).

mod adv;
mod form_d;
mod shared;
mod thirteen_f;

pub use adv::SecAdvCollector;
pub use form_d::SecFormDCollector;
pub use thirteen_f::Sec13fCollector;
