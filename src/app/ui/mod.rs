mod controls;
mod details;
mod panels;

pub(super) use controls::{ControlRequests, CredentialPanel, draw_controls};
pub(super) use panels::draw_top_bar;
