//! Router Module Index
//!
//! One module per resource. Access control is not applied at this level: every
//! mutating handler runs the identity and ownership guards itself, in order,
//! after the validation gate.

/// Campground listing, detail, create, edit and delete.
pub mod campgrounds;

/// Reviews nested under a campground.
pub mod reviews;

/// Registration, login and logout.
pub mod users;
