//! User interaction: the dialog capability and the manager menu.

pub mod dialog;
pub mod menu;
