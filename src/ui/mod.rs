/// UI module exports
pub mod bridge;
pub mod components;
pub mod sidebar;
