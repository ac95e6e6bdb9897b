//! API Routes

pub mod control;
pub mod voice;
pub mod ws;
