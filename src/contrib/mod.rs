//! Behaviour specific to the duty roster and the cafeteria menu.

pub mod duty;
pub mod food;
