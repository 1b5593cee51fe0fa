//! sea-orm models for the menu-guard schema.

pub mod credentials;
pub mod menu_objects;
pub mod menu_permissions;
pub mod menus;
pub mod profiles;
pub mod sessions;
